//! Error types for payload encryption and push dispatch.
//!
//! Every fallible operation in the crate returns [`Result`], carrying one
//! [`PushError`]. Errors group into a small taxonomy ([`ErrorKind`]) so
//! callers can decide what to do without matching every variant.

use thiserror::Error;

/// Result type for encryption and dispatch operations.
pub type Result<T> = std::result::Result<T, PushError>;

/// Errors raised while encrypting, building, or sending a push message.
#[derive(Debug, Error)]
pub enum PushError {
    /// The recipient key is not a point on P-256.
    #[error("recipient key is not a valid P-256 public key")]
    UnsupportedCurve,

    /// Key material could not be decoded from its text form.
    #[error("invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    /// The secure random source could not be read.
    #[error("secure random source unavailable: {0}")]
    RandomnessUnavailable(String),

    /// A cipher or KDF primitive rejected its parameters.
    #[error("cipher failure: {0}")]
    CipherFailure(&'static str),

    /// Requested HKDF output is longer than HKDF-SHA256 can produce.
    #[error("invalid HKDF output length {requested} (max {max})")]
    InvalidLength {
        /// Bytes requested.
        requested: usize,
        /// Largest permitted output.
        max: usize,
    },

    /// Payload does not fit in a single record.
    #[error("payload of {len} bytes exceeds the {max}-byte record limit")]
    PayloadTooLarge {
        /// Payload length.
        len: usize,
        /// Largest permitted payload.
        max: usize,
    },

    /// Ciphertext failed authentication or carried malformed padding.
    #[error("decryption failed: ciphertext is corrupt or was not encrypted for this key")]
    DecryptionFailed,

    /// Required configuration is missing.
    #[error("configuration error: {0}")]
    ConfigurationError(&'static str),

    /// The push endpoint is not a valid URL.
    #[error("invalid push endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        /// Endpoint as supplied.
        endpoint: String,
        /// Parser message.
        reason: String,
    },

    /// The push service answered with a non-success status.
    #[error("push service rejected request (HTTP {status}): {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },

    /// The HTTP request could not be completed.
    #[error("HTTP transport failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A dispatch task ended without producing a result.
    #[error("dispatch task failed: {0}")]
    Internal(String),
}

/// Coarse classification of a [`PushError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad caller input (keys, payload, endpoint). Not retryable.
    Input,
    /// The environment failed (no entropy). Not retryable.
    Environment,
    /// Internal invariant violation. Indicates a bug.
    Cipher,
    /// Missing configuration. Fix the configuration before retrying.
    Configuration,
    /// The transport or the push service failed. Retry policy is the caller's.
    Transport,
}

impl PushError {
    /// Taxonomy bucket for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedCurve
            | Self::InvalidKeyEncoding(_)
            | Self::PayloadTooLarge { .. }
            | Self::InvalidLength { .. }
            | Self::DecryptionFailed
            | Self::InvalidEndpoint { .. } => ErrorKind::Input,
            Self::RandomnessUnavailable(_) => ErrorKind::Environment,
            Self::CipherFailure(_) | Self::Internal(_) => ErrorKind::Cipher,
            Self::ConfigurationError(_) => ErrorKind::Configuration,
            Self::Rejected { .. } | Self::Http(_) => ErrorKind::Transport,
        }
    }

    /// Whether retrying the same call could succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Environment => write!(f, "environment"),
            Self::Cipher => write!(f, "cipher"),
            Self::Configuration => write!(f, "configuration"),
            Self::Transport => write!(f, "transport"),
        }
    }
}
