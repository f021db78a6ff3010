//! Error types for kvmrelay

use thiserror::Error;

/// Result type alias using the kvmrelay Error
pub type Result<T> = std::result::Result<T, Error>;

/// kvmrelay error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config encode error: {0}")]
    ConfigEncode(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Port allocation failed: {0}")]
    PortAllocation(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Remote presence port lookup failed: {0}")]
    RpLookup(String),

    #[error("Browser launch failed: {0}")]
    Browser(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn transition(from: impl ToString, to: impl ToString) -> Self {
        Error::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}
