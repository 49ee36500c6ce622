//! P-256 key handling for Web Push.
//!
//! Browsers publish the recipient key (`p256dh`) as a base64url-encoded
//! uncompressed SEC1 point. This module converts between that form and
//! typed `p256` keys, and generates recipient key pairs for the receiving
//! side (tests, the `keygen` command, and [`crate::crypto::decrypt`]).

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use p256::elliptic_curve::rand_core::OsRng;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey, SecretKey};
use zeroize::Zeroizing;

use crate::error::{PushError, Result};

/// Length of an uncompressed SEC1 P-256 point (`0x04 || x || y`).
pub const UNCOMPRESSED_POINT_LEN: usize = 65;

/// Length of a raw P-256 private scalar.
pub const PRIVATE_SCALAR_LEN: usize = 32;

/// Parse a SEC1-encoded P-256 point (compressed or uncompressed).
///
/// Anything that is not a point on P-256 (wrong length, wrong tag byte,
/// coordinates off the curve, the identity) is `UnsupportedCurve`.
pub fn public_key_from_bytes(bytes: &[u8]) -> Result<PublicKey> {
    PublicKey::from_sec1_bytes(bytes).map_err(|_| PushError::UnsupportedCurve)
}

/// Parse a base64url-encoded P-256 point, as found in a subscription's
/// `keys.p256dh` field. Trailing `=` padding is tolerated.
pub fn public_key_from_base64url(encoded: &str) -> Result<PublicKey> {
    let bytes = decode_base64url(encoded)?;
    public_key_from_bytes(&bytes)
}

/// Uncompressed SEC1 encoding of a public key (65 bytes: `0x04 || x || y`).
pub fn encode_public_key(public_key: &PublicKey) -> Vec<u8> {
    public_key.to_encoded_point(false).as_bytes().to_vec()
}

/// Base64url (no padding) of the uncompressed SEC1 encoding.
pub fn encode_public_key_base64url(public_key: &PublicKey) -> String {
    BASE64URL.encode(public_key.to_encoded_point(false).as_bytes())
}

/// Decode base64url text, accepting input with or without `=` padding.
pub fn decode_base64url(encoded: &str) -> Result<Vec<u8>> {
    BASE64URL
        .decode(encoded.trim().trim_end_matches('='))
        .map_err(|e| PushError::InvalidKeyEncoding(e.to_string()))
}

/// A recipient (user agent) key pair.
///
/// The sender never needs one of these: it only ever holds the recipient's
/// public key. The receiving side uses it to decrypt, and the CLI's
/// `keygen` command prints one for testing against a local endpoint.
pub struct RecipientKeyPair {
    secret: SecretKey,
}

impl std::fmt::Debug for RecipientKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecipientKeyPair")
            .field("public_key", &self.public_key_base64url())
            .finish_non_exhaustive()
    }
}

impl RecipientKeyPair {
    /// Generate a fresh key pair from the OS random source.
    pub fn generate() -> Self {
        Self {
            secret: SecretKey::random(&mut OsRng),
        }
    }

    /// Wrap an existing secret key.
    pub fn from_secret(secret: SecretKey) -> Self {
        Self { secret }
    }

    /// Reconstruct from a base64url-encoded raw 32-byte scalar.
    pub fn from_base64url(private_key_b64: &str) -> Result<Self> {
        let bytes = Zeroizing::new(decode_base64url(private_key_b64)?);
        if bytes.len() != PRIVATE_SCALAR_LEN {
            return Err(PushError::InvalidKeyEncoding(format!(
                "private key must be a {PRIVATE_SCALAR_LEN}-byte P-256 scalar, got {} bytes",
                bytes.len()
            )));
        }
        let secret = SecretKey::from_slice(&bytes)
            .map_err(|_| PushError::InvalidKeyEncoding("not a valid P-256 scalar".into()))?;
        Ok(Self { secret })
    }

    /// The public half, to be published as `p256dh`.
    pub fn public_key(&self) -> PublicKey {
        self.secret.public_key()
    }

    /// The private scalar.
    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    /// Base64url of the uncompressed public key (65 bytes decoded).
    pub fn public_key_base64url(&self) -> String {
        encode_public_key_base64url(&self.public_key())
    }

    /// Base64url of the raw 32-byte private scalar.
    pub fn private_key_base64url(&self) -> Zeroizing<String> {
        let scalar = Zeroizing::new(self.secret.to_bytes().to_vec());
        Zeroizing::new(BASE64URL.encode(scalar.as_slice()))
    }
}
