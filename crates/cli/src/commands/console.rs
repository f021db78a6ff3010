//! Console Command

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing::debug;

use kvmrelay_common::{BrowserPreference, Error, SessionConfig};
use kvmrelay_web::ConsoleSession;

use crate::output::{print_info, print_success, print_warning};

#[derive(Parser, Debug)]
pub struct ConsoleArgs {
    /// BMC address, `host` or `host:port`
    #[arg(required_unless_present = "config")]
    pub host: Option<String>,

    /// BMC account name
    #[arg(required_unless_present = "config")]
    pub username: Option<String>,

    /// BMC account password
    #[arg(env = "KVMRELAY_PASSWORD", hide_env_values = true, required_unless_present = "config")]
    pub password: Option<String>,

    /// Browser to prefer: auto, chrome, firefox or system
    pub browser: Option<String>,

    /// Local HTTPS port (auto-assigned when omitted)
    #[arg(long)]
    pub port: Option<u16>,

    /// Remote-presence port (asked from the BMC when omitted)
    #[arg(long)]
    pub rp_port: Option<u16>,

    /// Local bind address
    #[arg(long)]
    pub bind: Option<String>,

    /// Certificate for the local listener
    #[arg(long)]
    pub cert: Option<PathBuf>,

    /// Private key for the local listener
    #[arg(long)]
    pub key: Option<PathBuf>,

    /// Session settings file (TOML); positional arguments override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Do not open a browser
    #[arg(long)]
    pub no_browser: bool,
}

/// Merge the settings file (if any) with command-line overrides.
pub fn build_config(args: &ConsoleArgs) -> Result<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => SessionConfig::new("", "", ""),
    };

    if let Some(host) = &args.host {
        config.bmc_host = host.clone();
    }
    if let Some(username) = &args.username {
        config.username = username.clone();
    }
    if let Some(password) = &args.password {
        config.password = password.clone();
    }
    if let Some(browser) = &args.browser {
        config.browser = browser.parse::<BrowserPreference>()?;
    }
    if let Some(port) = args.port {
        config.listen_port = Some(port);
    }
    if let Some(rp_port) = args.rp_port {
        config.rp_port = Some(rp_port);
    }
    if let Some(bind) = &args.bind {
        config.bind_host = bind.clone();
    }
    if let Some(cert) = &args.cert {
        config.tls.cert_path = cert.clone();
    }
    if let Some(key) = &args.key {
        config.tls.key_path = key.clone();
    }

    config.validate()?;
    Ok(config)
}

pub async fn execute(args: ConsoleArgs) -> Result<()> {
    let config = build_config(&args)?;
    debug!(
        "Console settings: bmc={} bind={} port={:?} rp_port={:?} browser={}",
        config.bmc_host, config.bind_host, config.listen_port, config.rp_port, config.browser
    );

    print_info(&format!("Connecting to BMC {}", config.bmc_host));
    let mut session = ConsoleSession::new(config);
    session
        .initialize()
        .await
        .context("failed to initialize console session")?;

    if let Some(rp_port) = session.rp_port() {
        print_info(&format!("Remote presence port: {}", rp_port));
    }

    if let Err(e) = session.start().await {
        if matches!(e, Error::Tls(_)) {
            print_info("Create a local certificate with: kvmrelay cert");
        }
        return Err(anyhow::Error::new(e).context("failed to start local HTTPS relay"));
    }

    let url = session.url()?;
    print_success(&format!("Console available at {}", url.as_str().green().bold()));

    if !args.no_browser {
        match session.open_in_browser() {
            Ok(()) => print_success("Opened console in browser"),
            Err(e) => print_warning(&format!("Could not open a browser ({}); open {} manually", e, url)),
        }
    }

    println!("\nPress Ctrl-C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("failed to wait for Ctrl-C")?;

    session.stop().await?;
    print_success("Console session stopped");
    Ok(())
}
