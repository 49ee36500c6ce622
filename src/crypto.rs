//! Web Push payload encryption (`aesgcm128` content encoding).
//!
//! Every message gets a fresh ephemeral P-256 key pair and a fresh 16-byte
//! salt. The pipeline is:
//!
//! ```text
//! ephemeral_secret x recipient_public  --ECDH-->  shared secret (x-coordinate)
//! HKDF-SHA256(salt, shared, "Content-Encoding: aesgcm128", 16)  -> key
//! HKDF-SHA256(salt, shared, "Content-Encoding: nonce", 12)      -> nonce
//! AES-128-GCM(key, nonce, 0x00 || payload)                       -> ciphertext || tag
//! ```
//!
//! The recipient needs the ephemeral public key and the salt to re-derive
//! the key; both travel in HTTP headers (see [`crate::dispatch`]).
//!
//! # Draft Version
//!
//! This is the early draft of the Web Push encryption scheme: a single zero
//! padding-length byte, fixed 16-byte key and 12-byte nonce, content-encoding
//! `aesgcm128`. Later revisions (`aesgcm`, `aes128gcm` / RFC 8291) changed the
//! key derivation and padding, so push services that only accept those will
//! reject these messages.
//!
//! # Key Material
//!
//! Ephemeral secrets, shared secrets, derived keys and padded plaintext live
//! in types that zeroize on drop, so every exit path (success or `?`) wipes
//! them.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes128Gcm, Nonce,
};
use hkdf::Hkdf;
use p256::elliptic_curve::rand_core::{CryptoRng, OsRng, RngCore};
use p256::{PublicKey, SecretKey};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{PushError, Result};
use crate::keys;

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

/// AES-128 key length in bytes.
pub const KEY_LEN: usize = 16;

/// GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Leading padding-length byte prepended to every payload.
pub const PADDING_HEADER_LEN: usize = 1;

/// Record size of the content encoding; one record carries the whole message.
pub const RECORD_SIZE: usize = 4096;

/// Largest payload that fits in a single record.
///
/// Push services accept at most 4096 bytes of message body, so
/// `0x00 || payload || tag` must fit in one [`RECORD_SIZE`] record. The cap
/// comes from that body limit, not from the draft's `rs` parameter: a
/// 4080-byte payload would produce a 4097-byte body and is rejected with
/// `PayloadTooLarge`.
pub const MAX_PAYLOAD_LEN: usize = RECORD_SIZE - PADDING_HEADER_LEN - TAG_LEN;

/// Largest HKDF-SHA256 output (255 blocks of 32 bytes).
pub const HKDF_MAX_OUTPUT: usize = 255 * 32;

/// HKDF info for the content encryption key.
pub const KEY_INFO: &[u8] = b"Content-Encoding: aesgcm128";

/// HKDF info for the nonce.
pub const NONCE_INFO: &[u8] = b"Content-Encoding: nonce";

// A uniformly random 32-byte string is a valid scalar with overwhelming
// probability; repeated rejections mean the source is broken.
const MAX_SCALAR_ATTEMPTS: usize = 8;

/// Raw ECDH output: the x-coordinate of the shared point.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; 32]);

impl SharedSecret {
    /// The 32 secret bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret([REDACTED])")
    }
}

/// Content encryption key and nonce derived from a shared secret and salt.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKeys {
    encryption_key: [u8; KEY_LEN],
    nonce: [u8; NONCE_LEN],
}

impl DerivedKeys {
    /// AES-128 key.
    pub fn encryption_key(&self) -> &[u8; KEY_LEN] {
        &self.encryption_key
    }

    /// GCM nonce.
    pub fn nonce(&self) -> &[u8; NONCE_LEN] {
        &self.nonce
    }
}

impl std::fmt::Debug for DerivedKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKeys").finish_non_exhaustive()
    }
}

/// Output of [`encrypt`]: everything the recipient needs to decrypt.
///
/// Only the engine constructs these.
#[derive(Debug, Clone)]
pub struct Encrypted {
    public_key: PublicKey,
    salt: [u8; SALT_LEN],
    ciphertext: Vec<u8>,
}

impl Encrypted {
    /// The sender's ephemeral public key (not the recipient's).
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Uncompressed SEC1 encoding of the ephemeral public key.
    pub fn public_key_bytes(&self) -> Vec<u8> {
        keys::encode_public_key(&self.public_key)
    }

    /// The per-message salt.
    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }

    /// Ciphertext with the 16-byte GCM tag appended.
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Consume into the ciphertext bytes.
    pub fn into_ciphertext(self) -> Vec<u8> {
        self.ciphertext
    }
}

/// Encrypt `payload` for `recipient` using the OS random source.
pub fn encrypt(recipient: &PublicKey, payload: &[u8]) -> Result<Encrypted> {
    encrypt_with_rng(&mut OsRng, recipient, payload)
}

/// Encrypt `payload` for `recipient`, drawing the ephemeral key and salt
/// from `rng`.
///
/// A failing `rng` yields `RandomnessUnavailable`; no partial output is
/// returned.
pub fn encrypt_with_rng<R>(rng: &mut R, recipient: &PublicKey, payload: &[u8]) -> Result<Encrypted>
where
    R: RngCore + CryptoRng + ?Sized,
{
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(PushError::PayloadTooLarge {
            len: payload.len(),
            max: MAX_PAYLOAD_LEN,
        });
    }

    let ephemeral = generate_ephemeral_secret(rng)?;
    let public_key = ephemeral.public_key();
    let shared_secret = derive_shared_secret(&ephemeral, recipient);
    drop(ephemeral);

    let mut salt = [0u8; SALT_LEN];
    fill_random(rng, &mut salt)?;

    let keys = derive_keys(&shared_secret, &salt)?;
    drop(shared_secret);

    let ciphertext = seal(&keys, payload)?;
    log::debug!(
        "[WebPush] Encrypted {} byte payload into {} byte record",
        payload.len(),
        ciphertext.len()
    );

    Ok(Encrypted {
        public_key,
        salt,
        ciphertext,
    })
}

/// ECDH over P-256, returning the x-coordinate of `private_key * public_key`.
pub fn derive_shared_secret(private_key: &SecretKey, public_key: &PublicKey) -> SharedSecret {
    let shared = p256::ecdh::diffie_hellman(private_key.to_nonzero_scalar(), public_key.as_affine());
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(shared.raw_secret_bytes());
    SharedSecret(bytes)
}

/// HKDF-SHA256 extract-then-expand.
///
/// `length` may be at most [`HKDF_MAX_OUTPUT`] bytes.
pub fn hkdf_expand(ikm: &[u8], salt: &[u8], info: &[u8], length: usize) -> Result<Zeroizing<Vec<u8>>> {
    if length > HKDF_MAX_OUTPUT {
        return Err(PushError::InvalidLength {
            requested: length,
            max: HKDF_MAX_OUTPUT,
        });
    }

    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = Zeroizing::new(vec![0u8; length]);
    hk.expand(info, okm.as_mut_slice())
        .map_err(|_| PushError::CipherFailure("HKDF expansion rejected output length"))?;
    Ok(okm)
}

/// Derive the content encryption key and nonce for one message.
///
/// Each value runs its own extract-then-expand over the same
/// (shared secret, salt) with a different info string.
pub fn derive_keys(shared_secret: &SharedSecret, salt: &[u8; SALT_LEN]) -> Result<DerivedKeys> {
    let key = hkdf_expand(shared_secret.as_bytes(), salt, KEY_INFO, KEY_LEN)?;
    let nonce = hkdf_expand(shared_secret.as_bytes(), salt, NONCE_INFO, NONCE_LEN)?;

    let mut keys = DerivedKeys {
        encryption_key: [0u8; KEY_LEN],
        nonce: [0u8; NONCE_LEN],
    };
    keys.encryption_key.copy_from_slice(&key);
    keys.nonce.copy_from_slice(&nonce);
    Ok(keys)
}

/// Decrypt a message on the recipient side.
///
/// Re-derives the key from the recipient's private key and the sender's
/// ephemeral public key, authenticates and opens the record, then strips the
/// padding. Any authentication or padding failure is `DecryptionFailed` and
/// returns no plaintext.
pub fn decrypt(
    recipient: &SecretKey,
    sender_public_key: &PublicKey,
    salt: &[u8; SALT_LEN],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let shared_secret = derive_shared_secret(recipient, sender_public_key);
    let keys = derive_keys(&shared_secret, salt)?;

    let cipher = Aes128Gcm::new_from_slice(keys.encryption_key())
        .map_err(|_| PushError::CipherFailure("AES-128-GCM rejected key length"))?;
    let padded = Zeroizing::new(
        cipher
            .decrypt(&Nonce::from(*keys.nonce()), ciphertext)
            .map_err(|_| PushError::DecryptionFailed)?,
    );

    strip_padding(&padded)
}

fn seal(keys: &DerivedKeys, payload: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes128Gcm::new_from_slice(keys.encryption_key())
        .map_err(|_| PushError::CipherFailure("AES-128-GCM rejected key length"))?;

    let mut plaintext = Zeroizing::new(Vec::with_capacity(PADDING_HEADER_LEN + payload.len()));
    plaintext.push(0u8);
    plaintext.extend_from_slice(payload);

    cipher
        .encrypt(&Nonce::from(*keys.nonce()), plaintext.as_slice())
        .map_err(|_| PushError::CipherFailure("AES-128-GCM encryption failed"))
}

/// First byte is the padding length `n`, followed by `n` zero bytes.
fn strip_padding(record: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let (&pad_len, rest) = record.split_first().ok_or(PushError::DecryptionFailed)?;
    let pad_len = usize::from(pad_len);
    if rest.len() < pad_len || rest[..pad_len].iter().any(|&b| b != 0) {
        return Err(PushError::DecryptionFailed);
    }
    Ok(Zeroizing::new(rest[pad_len..].to_vec()))
}

fn generate_ephemeral_secret<R>(rng: &mut R) -> Result<SecretKey>
where
    R: RngCore + CryptoRng + ?Sized,
{
    let mut candidate = Zeroizing::new([0u8; 32]);
    for _ in 0..MAX_SCALAR_ATTEMPTS {
        fill_random(rng, candidate.as_mut_slice())?;
        if let Ok(secret) = SecretKey::from_slice(candidate.as_slice()) {
            return Ok(secret);
        }
    }
    Err(PushError::RandomnessUnavailable(
        "random source did not yield a valid P-256 scalar".to_string(),
    ))
}

fn fill_random<R>(rng: &mut R, dest: &mut [u8]) -> Result<()>
where
    R: RngCore + CryptoRng + ?Sized,
{
    rng.try_fill_bytes(dest)
        .map_err(|e| PushError::RandomnessUnavailable(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::RecipientKeyPair;
    use p256::elliptic_curve::rand_core;
    use std::num::NonZeroU32;

    /// Random source whose every read fails.
    struct FailingRng;

    impl RngCore for FailingRng {
        fn next_u32(&mut self) -> u32 {
            0
        }
        fn next_u64(&mut self) -> u64 {
            0
        }
        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0);
        }
        fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> std::result::Result<(), rand_core::Error> {
            Err(rand_core::Error::from(
                NonZeroU32::new(rand_core::Error::CUSTOM_START).unwrap(),
            ))
        }
    }

    impl CryptoRng for FailingRng {}

    /// Random source that always yields zero bytes (never a valid scalar).
    struct ZeroRng;

    impl RngCore for ZeroRng {
        fn next_u32(&mut self) -> u32 {
            0
        }
        fn next_u64(&mut self) -> u64 {
            0
        }
        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0);
        }
        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand_core::Error> {
            dest.fill(0);
            Ok(())
        }
    }

    impl CryptoRng for ZeroRng {}

    fn open(pair: &RecipientKeyPair, encrypted: &Encrypted) -> Result<Zeroizing<Vec<u8>>> {
        decrypt(
            pair.secret_key(),
            encrypted.public_key(),
            encrypted.salt(),
            encrypted.ciphertext(),
        )
    }

    #[test]
    fn test_roundtrip_recovers_payload() {
        let recipient = RecipientKeyPair::generate();
        let payload = b"Hello, push world!";

        let encrypted = encrypt(&recipient.public_key(), payload).unwrap();
        let decrypted = open(&recipient, &encrypted).unwrap();

        assert_eq!(decrypted.as_slice(), payload);
    }

    #[test]
    fn test_roundtrip_empty_payload() {
        let recipient = RecipientKeyPair::generate();
        let encrypted = encrypt(&recipient.public_key(), b"").unwrap();
        assert_eq!(encrypted.ciphertext().len(), PADDING_HEADER_LEN + TAG_LEN);
        assert!(open(&recipient, &encrypted).unwrap().is_empty());
    }

    #[test]
    fn test_ciphertext_length_invariant() {
        let recipient = RecipientKeyPair::generate();
        for len in [0usize, 1, 15, 16, 17, 255, 1024, MAX_PAYLOAD_LEN] {
            let payload = vec![0xA5u8; len];
            let encrypted = encrypt(&recipient.public_key(), &payload).unwrap();
            assert_eq!(encrypted.ciphertext().len(), len + 1 + 16, "payload len {len}");
        }
    }

    #[test]
    fn test_payload_too_large_rejected() {
        let recipient = RecipientKeyPair::generate();
        let payload = vec![0u8; MAX_PAYLOAD_LEN + 1];
        assert!(matches!(
            encrypt(&recipient.public_key(), &payload),
            Err(PushError::PayloadTooLarge { len, max }) if len == MAX_PAYLOAD_LEN + 1 && max == MAX_PAYLOAD_LEN
        ));
    }

    #[test]
    fn test_largest_payload_fills_push_body_limit() {
        let recipient = RecipientKeyPair::generate();
        let encrypted = encrypt(&recipient.public_key(), &vec![1u8; MAX_PAYLOAD_LEN]).unwrap();
        assert_eq!(encrypted.ciphertext().len(), RECORD_SIZE);
        assert_eq!(open(&recipient, &encrypted).unwrap().len(), MAX_PAYLOAD_LEN);

        assert!(matches!(
            encrypt(&recipient.public_key(), &[1u8; 4080]),
            Err(PushError::PayloadTooLarge { len: 4080, .. })
        ));
    }

    #[test]
    fn test_each_encryption_is_unique() {
        let recipient = RecipientKeyPair::generate();
        let payload = b"same payload";

        let first = encrypt(&recipient.public_key(), payload).unwrap();
        let second = encrypt(&recipient.public_key(), payload).unwrap();

        assert_ne!(first.public_key(), second.public_key());
        assert_ne!(first.salt(), second.salt());
        assert_ne!(first.ciphertext(), second.ciphertext());
    }

    #[test]
    fn test_ephemeral_key_is_not_recipient_key() {
        let recipient = RecipientKeyPair::generate();
        let encrypted = encrypt(&recipient.public_key(), b"x").unwrap();
        assert_ne!(*encrypted.public_key(), recipient.public_key());
        assert_eq!(encrypted.public_key_bytes().len(), keys::UNCOMPRESSED_POINT_LEN);
    }

    #[test]
    fn test_tampered_ciphertext_fails_authentication() {
        let recipient = RecipientKeyPair::generate();
        let encrypted = encrypt(&recipient.public_key(), b"tamper me").unwrap();

        for byte in 0..encrypted.ciphertext().len() {
            for bit in 0..8 {
                let mut tampered = encrypted.ciphertext().to_vec();
                tampered[byte] ^= 1 << bit;
                let result = decrypt(
                    recipient.secret_key(),
                    encrypted.public_key(),
                    encrypted.salt(),
                    &tampered,
                );
                assert!(
                    matches!(result, Err(PushError::DecryptionFailed)),
                    "flip of byte {byte} bit {bit} was not detected"
                );
            }
        }
    }

    #[test]
    fn test_wrong_recipient_fails() {
        let recipient = RecipientKeyPair::generate();
        let other = RecipientKeyPair::generate();
        let encrypted = encrypt(&recipient.public_key(), b"secret").unwrap();
        assert!(matches!(open(&other, &encrypted), Err(PushError::DecryptionFailed)));
    }

    #[test]
    fn test_wrong_salt_fails() {
        let recipient = RecipientKeyPair::generate();
        let encrypted = encrypt(&recipient.public_key(), b"secret").unwrap();
        let mut salt = *encrypted.salt();
        salt[0] ^= 0xFF;
        let result = decrypt(
            recipient.secret_key(),
            encrypted.public_key(),
            &salt,
            encrypted.ciphertext(),
        );
        assert!(matches!(result, Err(PushError::DecryptionFailed)));
    }

    #[test]
    fn test_failing_rng_is_randomness_unavailable() {
        let recipient = RecipientKeyPair::generate();
        let result = encrypt_with_rng(&mut FailingRng, &recipient.public_key(), b"payload");
        assert!(matches!(result, Err(PushError::RandomnessUnavailable(_))));
    }

    #[test]
    fn test_degenerate_rng_is_randomness_unavailable() {
        let recipient = RecipientKeyPair::generate();
        let result = encrypt_with_rng(&mut ZeroRng, &recipient.public_key(), b"payload");
        assert!(matches!(result, Err(PushError::RandomnessUnavailable(_))));
    }

    #[test]
    fn test_shared_secret_is_symmetric() {
        let alice = RecipientKeyPair::generate();
        let bob = RecipientKeyPair::generate();

        let ab = derive_shared_secret(alice.secret_key(), &bob.public_key());
        let ba = derive_shared_secret(bob.secret_key(), &alice.public_key());
        assert_eq!(ab.as_bytes(), ba.as_bytes());
    }

    #[test]
    fn test_shared_secret_nist_vector() {
        // NIST CAVS ECC CDH primitive, P-256, COUNT = 0.
        let peer_x = hex::decode("700c48f77f56584c5cc632ca65640db91b6bacce3a4df6b42ce7cc838833d287").unwrap();
        let peer_y = hex::decode("db71e509e3fd9b060ddb20ba5c51dcc5948d46fbf640dfe0441782cab85fa4ac").unwrap();
        let private = hex::decode("7d7dc5f71eb29ddaf80d6214632eeae03d9058af1fb6d22ed80badb62bc1a534").unwrap();
        let own_x = hex::decode("ead218590119e8876b29146ff89ca61770c4edbbf97d38ce385ed281d8a6b230").unwrap();
        let own_y = hex::decode("28af61281fd35e2fa7002523acc85a429cb06ee6648325389f59edfce1405141").unwrap();
        let expected = hex::decode("46fc62106420ff012e54a434fbdd2d25ccc5852060561e68040dd7778997bd7b").unwrap();

        let mut peer_point = vec![0x04];
        peer_point.extend_from_slice(&peer_x);
        peer_point.extend_from_slice(&peer_y);
        let peer = keys::public_key_from_bytes(&peer_point).unwrap();

        let pair = RecipientKeyPair::from_secret(SecretKey::from_slice(&private).unwrap());
        let mut own_point = vec![0x04];
        own_point.extend_from_slice(&own_x);
        own_point.extend_from_slice(&own_y);
        assert_eq!(keys::encode_public_key(&pair.public_key()), own_point);

        let shared = derive_shared_secret(pair.secret_key(), &peer);
        assert_eq!(shared.as_bytes().as_slice(), expected.as_slice());
    }

    #[test]
    fn test_derive_keys_is_deterministic() {
        let alice = RecipientKeyPair::generate();
        let bob = RecipientKeyPair::generate();
        let shared = derive_shared_secret(alice.secret_key(), &bob.public_key());
        let salt = [7u8; SALT_LEN];

        let first = derive_keys(&shared, &salt).unwrap();
        let second = derive_keys(&shared, &salt).unwrap();
        assert_eq!(first.encryption_key(), second.encryption_key());
        assert_eq!(first.nonce(), second.nonce());

        let other = derive_keys(&shared, &[8u8; SALT_LEN]).unwrap();
        assert_ne!(first.encryption_key(), other.encryption_key());
    }

    #[test]
    fn test_derive_keys_matches_hkdf_expand() {
        let shared = SharedSecret([3u8; 32]);
        let salt = [9u8; SALT_LEN];
        let keys = derive_keys(&shared, &salt).unwrap();

        let key = hkdf_expand(&[3u8; 32], &salt, b"Content-Encoding: aesgcm128", 16).unwrap();
        let nonce = hkdf_expand(&[3u8; 32], &salt, b"Content-Encoding: nonce", 12).unwrap();
        assert_eq!(keys.encryption_key().as_slice(), key.as_slice());
        assert_eq!(keys.nonce().as_slice(), nonce.as_slice());
    }

    #[test]
    fn test_hkdf_expand_length_limit() {
        assert_eq!(hkdf_expand(b"ikm", b"salt", b"info", HKDF_MAX_OUTPUT).unwrap().len(), HKDF_MAX_OUTPUT);
        assert!(matches!(
            hkdf_expand(b"ikm", b"salt", b"info", HKDF_MAX_OUTPUT + 1),
            Err(PushError::InvalidLength { requested, max }) if requested == HKDF_MAX_OUTPUT + 1 && max == HKDF_MAX_OUTPUT
        ));
    }

    #[test]
    fn test_strip_padding() {
        assert_eq!(strip_padding(&[0, b'h', b'i']).unwrap().as_slice(), b"hi");
        assert_eq!(strip_padding(&[2, 0, 0, b'h', b'i']).unwrap().as_slice(), b"hi");
        assert!(strip_padding(&[]).is_err());
        assert!(strip_padding(&[3, 0, 0]).is_err(), "truncated padding");
        assert!(strip_padding(&[1, 5, b'x']).is_err(), "non-zero padding byte");
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let shared = SharedSecret([0xAB; 32]);
        assert_eq!(format!("{shared:?}"), "SharedSecret([REDACTED])");
        let keys = derive_keys(&shared, &[0u8; SALT_LEN]).unwrap();
        assert_eq!(format!("{keys:?}"), "DerivedKeys { .. }");
    }
}
