//! Turns a [`Notification`] into a push request and sends it.
//!
//! Encrypted notifications carry their key agreement data in two headers:
//!
//! ```text
//! Encryption:     keyid=p256dh;salt=<base64url salt>
//! Encryption-Key: keyid=p256dh;dh=<base64url uncompressed ephemeral key>
//! ```
//!
//! Legacy notifications skip encryption and authenticate with
//! `Authorization: key=<api key>` instead.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};

use crate::config::Config;
use crate::crypto::{self, Encrypted};
use crate::error::{PushError, Result};
use crate::notification::{EncryptedNotification, LegacyNotification, Notification};
use crate::transport::{PushBody, PushRequest, PushResponse, Transport};

/// Content encoding advertised for encrypted payloads.
pub const CONTENT_ENCODING: &str = "aesgcm128";

const KEY_ID: &str = "p256dh";

/// Builds and sends push requests.
///
/// Holds only the optional legacy API key, so one instance can be shared
/// across tasks.
#[derive(Clone, Default)]
pub struct Dispatcher {
    legacy_api_key: Option<String>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("has_legacy_api_key", &self.legacy_api_key.is_some())
            .finish()
    }
}

impl Dispatcher {
    /// Create a dispatcher. `legacy_api_key` is only needed for legacy GCM
    /// notifications.
    pub fn new(legacy_api_key: Option<String>) -> Self {
        Self { legacy_api_key }
    }

    /// Create a dispatcher using the key from `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.legacy_api_key.clone())
    }

    /// Build the HTTP request for `notification` without sending it.
    ///
    /// # Errors
    ///
    /// `ConfigurationError` for a legacy notification when no API key is
    /// configured; any encryption error for an encrypted one.
    pub fn build_request(&self, notification: &Notification) -> Result<PushRequest> {
        let request = PushRequest::post(notification.endpoint().clone())
            .header("TTL", notification.ttl().to_string());

        match notification {
            Notification::Legacy(legacy) => self.legacy_request(request, legacy),
            Notification::Encrypted(encrypted) => Self::encrypted_request(request, encrypted),
        }
    }

    /// Build the request for `notification` and hand it to `transport`.
    ///
    /// Errors from encryption and from the transport are returned as-is.
    pub async fn send<T>(&self, transport: &T, notification: &Notification) -> Result<PushResponse>
    where
        T: Transport + ?Sized,
    {
        let request = self.build_request(notification)?;
        log::debug!(
            "[WebPush] Sending {} notification to {} ({} byte body)",
            if notification.is_legacy() { "legacy" } else { "encrypted" },
            notification.endpoint().host_str().unwrap_or("<no host>"),
            request.payload().len()
        );
        transport.execute(request).await
    }

    fn legacy_request(&self, request: PushRequest, legacy: &LegacyNotification) -> Result<PushRequest> {
        let api_key = self
            .legacy_api_key
            .as_deref()
            .ok_or(PushError::ConfigurationError("legacy GCM API key required"))?;

        Ok(request
            .header("Authorization", format!("key={api_key}"))
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .body(PushBody::Json(legacy.body().to_string())))
    }

    fn encrypted_request(request: PushRequest, notification: &EncryptedNotification) -> Result<PushRequest> {
        let encrypted = crypto::encrypt(notification.user_public_key(), notification.payload())?;

        Ok(request
            .header("Content-Type", "application/octet-stream")
            .header("Content-Encoding", CONTENT_ENCODING)
            .header("Encryption-Key", encryption_key_header(&encrypted))
            .header("Encryption", encryption_header(&encrypted))
            .body(PushBody::Bytes(encrypted.into_ciphertext())))
    }
}

/// `Encryption-Key` header value for an encrypted message.
pub fn encryption_key_header(encrypted: &Encrypted) -> String {
    format!("keyid={KEY_ID};dh={}", BASE64URL.encode(encrypted.public_key_bytes()))
}

/// `Encryption` header value for an encrypted message.
pub fn encryption_header(encrypted: &Encrypted) -> String {
    format!("keyid={KEY_ID};salt={}", BASE64URL.encode(encrypted.salt()))
}
