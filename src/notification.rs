//! Push notifications and browser subscriptions.
//!
//! A [`Notification`] is either an encrypted Web Push message for a browser
//! subscription, or a legacy plaintext GCM message that bypasses encryption.
//! The [`crate::dispatch::Dispatcher`] matches on the variant to pick the
//! delivery path.

use p256::PublicKey;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{PushError, Result};
use crate::keys;

/// A browser's push subscription, as returned by `PushSubscription.toJSON()`.
///
/// Only the fields this scheme uses are kept; `expirationTime` and
/// `keys.auth` are accepted and ignored.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PushSubscription {
    /// Push service endpoint URL.
    pub endpoint: String,
    /// Subscription keys.
    pub keys: SubscriptionKeys,
}

/// Key material published by the browser.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubscriptionKeys {
    /// Browser's P-256 ECDH public key (base64url).
    pub p256dh: String,
}

impl PushSubscription {
    /// Parse subscription JSON.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// The subscription's recipient public key.
    pub fn public_key(&self) -> Result<PublicKey> {
        keys::public_key_from_base64url(&self.keys.p256dh)
    }
}

/// An encrypted Web Push message for one recipient.
#[derive(Clone, Debug)]
pub struct EncryptedNotification {
    endpoint: Url,
    ttl: u32,
    user_public_key: PublicKey,
    payload: Vec<u8>,
}

impl EncryptedNotification {
    /// Recipient public key.
    pub fn user_public_key(&self) -> &PublicKey {
        &self.user_public_key
    }

    /// Plaintext payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// A legacy GCM message, sent as plaintext JSON.
#[derive(Clone, Debug)]
pub struct LegacyNotification {
    endpoint: Url,
    ttl: u32,
    body: String,
}

impl LegacyNotification {
    /// JSON body, passed through untouched.
    pub fn body(&self) -> &str {
        &self.body
    }
}

/// A notification to deliver.
#[derive(Clone, Debug)]
pub enum Notification {
    /// Encrypted Web Push delivery.
    Encrypted(EncryptedNotification),
    /// Legacy GCM delivery (no encryption, needs an API key).
    Legacy(LegacyNotification),
}

impl Notification {
    /// Build an encrypted notification.
    pub fn encrypted(endpoint: Url, user_public_key: PublicKey, payload: impl Into<Vec<u8>>, ttl: u32) -> Self {
        Self::Encrypted(EncryptedNotification {
            endpoint,
            ttl,
            user_public_key,
            payload: payload.into(),
        })
    }

    /// Build a legacy GCM notification.
    pub fn legacy(endpoint: Url, body: impl Into<String>, ttl: u32) -> Self {
        Self::Legacy(LegacyNotification {
            endpoint,
            ttl,
            body: body.into(),
        })
    }

    /// Build an encrypted notification addressed to a browser subscription.
    pub fn from_subscription(
        subscription: &PushSubscription,
        payload: impl Into<Vec<u8>>,
        ttl: u32,
    ) -> Result<Self> {
        let endpoint = parse_endpoint(&subscription.endpoint)?;
        let user_public_key = subscription.public_key()?;
        Ok(Self::encrypted(endpoint, user_public_key, payload, ttl))
    }

    /// Push service endpoint.
    pub fn endpoint(&self) -> &Url {
        match self {
            Self::Encrypted(n) => &n.endpoint,
            Self::Legacy(n) => &n.endpoint,
        }
    }

    /// Time-to-live in seconds.
    pub fn ttl(&self) -> u32 {
        match self {
            Self::Encrypted(n) => n.ttl,
            Self::Legacy(n) => n.ttl,
        }
    }

    /// Whether this notification takes the legacy GCM path.
    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::Legacy(_))
    }
}

/// Parse a push endpoint URL.
pub fn parse_endpoint(endpoint: &str) -> Result<Url> {
    Url::parse(endpoint).map_err(|e| PushError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })
}
