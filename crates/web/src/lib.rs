//! kvmrelay Web Relay
//!
//! Serves a BMC's remote console viewer from a local HTTPS origin and
//! relays the viewer SDK scripts from the BMC.

pub mod browser;
pub mod relay;
pub mod rp_port;
pub mod server;
pub mod session;
pub mod static_files;
pub mod template;
pub mod tls;
pub mod upstream;

pub use browser::{BrowserLauncher, LaunchPlan, Platform, SystemBrowser};
pub use relay::{is_relayed_path, AssetRelay};
pub use rp_port::{query_rp_port, resolve_rp_port};
pub use server::{spawn_tls, ServerHandle};
pub use session::{ConsoleSession, ResolvedSession};
pub use template::{render_console_page, PageTemplate, ViewerFields};
pub use tls::{generate_self_signed, TlsAcceptor};
pub use upstream::insecure_client;
