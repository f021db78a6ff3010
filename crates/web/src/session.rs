//! Console session lifecycle
//!
//! A [`ConsoleSession`] turns a [`SessionConfig`] into a running local HTTPS
//! endpoint for one BMC:
//!
//! ```text
//! uninitialized --initialize--> initialized --start--> serving --stop--> stopped
//! ```
//!
//! Initialization binds the real listener straight away and holds it until
//! `start`, so no other process can take the port in between.

use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;

use tracing::{debug, info};

use kvmrelay_common::{Error, Result, SessionConfig, SessionState};

use crate::browser::{BrowserLauncher, SystemBrowser};
use crate::relay::AssetRelay;
use crate::rp_port::resolve_rp_port;
use crate::server::{spawn_tls, ServerHandle};
use crate::template::{render_console_page, ViewerFields};
use crate::tls::TlsAcceptor;
use crate::upstream::insecure_client;

/// Values fixed by `initialize`, read-only afterwards
#[derive(Debug)]
pub struct ResolvedSession {
    pub bmc_host: String,
    pub rp_port: u16,
    pub listen_addr: SocketAddr,
    page: Arc<str>,
}

impl ResolvedSession {
    pub fn listen_port(&self) -> u16 {
        self.listen_addr.port()
    }

    pub fn page(&self) -> &str {
        &self.page
    }
}

/// One remote console session
pub struct ConsoleSession {
    config: SessionConfig,
    state: SessionState,
    resolved: Option<Arc<ResolvedSession>>,
    client: Option<reqwest::Client>,
    reserved: Option<StdTcpListener>,
    server: Option<ServerHandle>,
    launcher: Arc<dyn BrowserLauncher>,
}

impl ConsoleSession {
    pub fn new(config: SessionConfig) -> Self {
        let launcher = Arc::new(SystemBrowser::new(config.browser));
        Self {
            config,
            state: SessionState::Uninitialized,
            resolved: None,
            client: None,
            reserved: None,
            server: None,
            launcher,
        }
    }

    /// Replace the browser launcher used by [`open_in_browser`](Self::open_in_browser).
    pub fn with_launcher(mut self, launcher: Arc<dyn BrowserLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn resolved(&self) -> Option<&ResolvedSession> {
        self.resolved.as_deref()
    }

    /// Local listen port, once initialized
    pub fn port(&self) -> Option<u16> {
        self.resolved.as_ref().map(|r| r.listen_port())
    }

    /// Remote-presence port, once initialized
    pub fn rp_port(&self) -> Option<u16> {
        self.resolved.as_ref().map(|r| r.rp_port)
    }

    /// `https://localhost:<port>`
    pub fn url(&self) -> Result<String> {
        let port = self
            .port()
            .ok_or_else(|| Error::transition(self.state, "url"))?;
        Ok(format!("https://localhost:{}", port))
    }

    /// Resolve the remote-presence port, render the viewer page and bind
    /// the local listener.
    pub async fn initialize(&mut self) -> Result<()> {
        if self.state != SessionState::Uninitialized {
            return Err(Error::transition(self.state, SessionState::Initialized));
        }
        self.config.validate()?;

        let client = insecure_client(self.config.upstream_timeout())?;

        let rp_port = match self.config.explicit_rp_port() {
            Some(port) => port,
            None => {
                resolve_rp_port(
                    &client,
                    &self.config.bmc_host,
                    &self.config.username,
                    &self.config.password,
                )
                .await
            }
        };

        let page = render_console_page(&ViewerFields {
            bmc_host: &self.config.bmc_host,
            rp_port,
            username: &self.config.username,
            password: &self.config.password,
        })?;

        let listener = bind_listener(&self.config.bind_host, self.config.explicit_listen_port())?;
        let listen_addr = listener.local_addr()?;

        self.config.rp_port = Some(rp_port);
        self.config.listen_port = Some(listen_addr.port());
        self.resolved = Some(Arc::new(ResolvedSession {
            bmc_host: self.config.bmc_host.clone(),
            rp_port,
            listen_addr,
            page: Arc::from(page),
        }));
        self.client = Some(client);
        self.reserved = Some(listener);
        self.state = SessionState::Initialized;

        info!(
            "Console session for {} initialized (rp port {}, local port {})",
            self.config.bmc_host,
            rp_port,
            listen_addr.port()
        );
        Ok(())
    }

    /// Serve the relay over TLS in the background.
    ///
    /// Returns after the configured settle delay. Failures after that point
    /// are only logged.
    pub async fn start(&mut self) -> Result<()> {
        if self.state != SessionState::Initialized {
            return Err(Error::transition(self.state, SessionState::Serving));
        }

        let resolved = self
            .resolved
            .clone()
            .ok_or_else(|| Error::Internal("initialized session has no resolved state".into()))?;
        let client = self
            .client
            .clone()
            .ok_or_else(|| Error::Internal("initialized session has no BMC client".into()))?;

        let acceptor =
            TlsAcceptor::from_pem_files(&self.config.tls.cert_path, &self.config.tls.key_path)?;

        let reserved = self
            .reserved
            .take()
            .ok_or_else(|| Error::Internal("initialized session has no listener".into()))?;
        let listener = tokio::net::TcpListener::from_std(reserved)?;

        let relay = AssetRelay::new(resolved.bmc_host.clone(), resolved.page.clone(), client);
        let handle = spawn_tls(listener, acceptor, relay.router())?;

        self.server = Some(handle);
        self.state = SessionState::Serving;

        tokio::time::sleep(self.config.settle_delay()).await;
        info!(
            "Console for {} serving at https://localhost:{}",
            resolved.bmc_host,
            resolved.listen_port()
        );
        Ok(())
    }

    /// Close the listener.
    ///
    /// A session that was initialized but never started releases its
    /// reserved port and can no longer be started. Before `initialize`, or
    /// once stopped, this does nothing.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(handle) = self.server.take() {
            let addr = handle.local_addr();
            handle.shutdown().await;
            self.state = SessionState::Stopped;
            info!("Console session on {} stopped", addr);
        } else if let Some(reserved) = self.reserved.take() {
            drop(reserved);
            self.state = SessionState::Stopped;
            info!("Released reserved port for {}", self.config.bmc_host);
        } else {
            debug!("Stop requested for {} session; nothing to do", self.state);
        }
        Ok(())
    }

    pub fn open_in_browser(&self) -> Result<()> {
        let url = self.url()?;
        self.launcher.launch(&url)
    }

    /// Initialize, start and open the console in a browser.
    pub async fn launch_and_open(&mut self) -> Result<()> {
        self.initialize().await?;
        self.start().await?;
        self.open_in_browser()
    }
}

fn bind_listener(host: &str, port: Option<u16>) -> Result<StdTcpListener> {
    let port = port.unwrap_or(0);
    let listener = StdTcpListener::bind((host, port))
        .map_err(|e| Error::PortAllocation(format!("cannot bind {}:{}: {}", host, port, e)))?;
    listener.set_nonblocking(true)?;
    Ok(listener)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingLauncher {
        urls: Mutex<Vec<String>>,
    }

    impl BrowserLauncher for RecordingLauncher {
        fn launch(&self, url: &str) -> Result<()> {
            self.urls.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    fn config() -> SessionConfig {
        SessionConfig::new("127.0.0.1:1", "USERID", "PASSW0RD").with_rp_port(3901)
    }

    #[tokio::test]
    async fn test_initialize_fills_ports() {
        let mut session = ConsoleSession::new(config());
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert!(session.url().is_err());

        session.initialize().await.unwrap();

        assert_eq!(session.state(), SessionState::Initialized);
        assert_eq!(session.rp_port(), Some(3901));
        let port = session.port().unwrap();
        assert!(port > 0);
        assert_eq!(session.config().listen_port, Some(port));
        assert_eq!(session.url().unwrap(), format!("https://localhost:{}", port));
        assert!(session.resolved().unwrap().page().contains("USERID"));
    }

    #[tokio::test]
    async fn test_initialize_twice_is_rejected() {
        let mut session = ConsoleSession::new(config());
        session.initialize().await.unwrap();
        let err = session.initialize().await.unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition { .. }));
    }

    #[tokio::test]
    async fn test_reserved_port_cannot_be_taken() {
        let mut session = ConsoleSession::new(config());
        session.initialize().await.unwrap();
        let port = session.port().unwrap();

        let mut other = ConsoleSession::new(config().with_listen_port(port));
        let err = other.initialize().await.unwrap_err();
        assert!(matches!(err, Error::PortAllocation(_)));
        assert_eq!(other.state(), SessionState::Uninitialized);
    }

    #[tokio::test]
    async fn test_start_requires_initialize() {
        let mut session = ConsoleSession::new(config());
        let err = session.start().await.unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition { .. }));
    }

    #[tokio::test]
    async fn test_start_without_certificate_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = ConsoleSession::new(config().with_tls_files(
            dir.path().join("server.crt"),
            dir.path().join("server.key"),
        ));
        session.initialize().await.unwrap();

        let err = session.start().await.unwrap_err();
        assert!(matches!(err, Error::Tls(_)));
        assert_eq!(session.state(), SessionState::Initialized);
    }

    #[tokio::test]
    async fn test_stop_before_initialize_is_noop() {
        let mut session = ConsoleSession::new(config());
        session.stop().await.unwrap();
        assert_eq!(session.state(), SessionState::Uninitialized);
        session.initialize().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_before_start_releases_port() {
        let mut session = ConsoleSession::new(config());
        session.initialize().await.unwrap();
        let port = session.port().unwrap();

        session.stop().await.unwrap();
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(std::net::TcpStream::connect(("127.0.0.1", port)).is_err());

        session.stop().await.unwrap();
        let err = session.start().await.unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition { .. }));
    }

    #[tokio::test]
    async fn test_invalid_host_fails_initialize() {
        let mut session = ConsoleSession::new(SessionConfig::new("https://bmc", "u", "p"));
        let err = session.initialize().await.unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_open_in_browser_uses_launcher() {
        let launcher = Arc::new(RecordingLauncher::default());
        let mut session = ConsoleSession::new(config()).with_launcher(launcher.clone());

        assert!(session.open_in_browser().is_err());

        session.initialize().await.unwrap();
        session.open_in_browser().unwrap();

        let urls = launcher.urls.lock().unwrap();
        assert_eq!(urls.as_slice(), &[session.url().unwrap()]);
    }
}
