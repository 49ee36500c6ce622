//! Web Push payload encryption and delivery (`aesgcm128` draft scheme).
//!
//! Encrypts notification payloads for a browser's P-256 push subscription
//! key and delivers them to the push service endpoint, or sends legacy GCM
//! messages in the clear with an API key.
//!
//! # Modules
//!
//! - [`crypto`] - ECDH + HKDF + AES-128-GCM payload encryption
//! - [`keys`] - P-256 key parsing, encoding and generation
//! - [`notification`] - Notifications and browser subscriptions
//! - [`dispatch`] - Request assembly and sending
//! - [`transport`] - HTTP transport abstraction
//! - [`pool`] - Bounded concurrent delivery
//! - [`config`] - Configuration loading/saving
//!
//! # Example
//!
//! ```no_run
//! use webpush_aesgcm::{Dispatcher, HttpTransport, Notification, PushSubscription, Config};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let subscription = PushSubscription::from_json(r#"{
//!     "endpoint": "https://push.example.com/send/abc",
//!     "keys": { "p256dh": "BNc..." }
//! }"#)?;
//!
//! let notification = Notification::from_subscription(&subscription, "hello", config.default_ttl)?;
//! let transport = HttpTransport::from_config(&config)?;
//! Dispatcher::from_config(&config).send(&transport, &notification).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod crypto;
pub mod dispatch;
pub mod error;
pub mod keys;
pub mod notification;
pub mod pool;
pub mod transport;

// Re-export commonly used types
pub use config::Config;
pub use crypto::{decrypt, encrypt, Encrypted};
pub use dispatch::Dispatcher;
pub use error::{ErrorKind, PushError, Result};
pub use keys::RecipientKeyPair;
pub use notification::{Notification, PushSubscription};
pub use pool::DispatchPool;
pub use transport::{HttpTransport, PushBody, PushRequest, PushResponse, Transport};
