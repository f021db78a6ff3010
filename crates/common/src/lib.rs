//! kvmrelay Common Library
//!
//! Configuration record, lifecycle types and the error taxonomy shared by
//! the relay library and the `kvmrelay` binary.

pub mod config;
pub mod error;
pub mod types;

pub use config::{SessionConfig, TlsFiles};
pub use error::{Error, Result};
pub use types::*;

/// kvmrelay version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Remote-presence port used when the BMC cannot be asked for one
pub const DEFAULT_RP_PORT: u16 = 3900;

/// BMC management API path that reports the remote-presence port
pub const RP_PORT_API_PATH: &str = "/api/providers/rp_port";

/// Server certificate read from the working directory by default
pub const DEFAULT_CERT_FILE: &str = "server.crt";

/// Server private key read from the working directory by default
pub const DEFAULT_KEY_FILE: &str = "server.key";

/// Pause after handing the listener to the background task
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 500;

/// Local address the relay binds to unless told otherwise
pub const DEFAULT_BIND_HOST: &str = "127.0.0.1";
