//! Session configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{
    BrowserPreference, Error, Result, DEFAULT_BIND_HOST, DEFAULT_CERT_FILE, DEFAULT_KEY_FILE,
    DEFAULT_SETTLE_DELAY_MS,
};

/// Configuration for one console session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// BMC address, `host` or `host:port`
    pub bmc_host: String,

    /// BMC account name
    pub username: String,

    /// BMC account password
    pub password: String,

    /// Remote-presence port; resolved from the BMC when unset
    #[serde(default)]
    pub rp_port: Option<u16>,

    /// Browser family to prefer when opening the console
    #[serde(default)]
    pub browser: BrowserPreference,

    /// Local listen port; auto-assigned when unset
    #[serde(default)]
    pub listen_port: Option<u16>,

    /// Local bind address
    #[serde(default = "default_bind_host")]
    pub bind_host: String,

    /// Certificate and key for the local HTTPS listener
    #[serde(default)]
    pub tls: TlsFiles,

    /// Pause after starting the listener before `start` returns
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Whole-request timeout for calls to the BMC
    #[serde(default)]
    pub upstream_timeout_secs: Option<u64>,
}

/// PEM files for the local HTTPS listener
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsFiles {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

impl Default for TlsFiles {
    fn default() -> Self {
        Self {
            cert_path: PathBuf::from(DEFAULT_CERT_FILE),
            key_path: PathBuf::from(DEFAULT_KEY_FILE),
        }
    }
}

fn default_bind_host() -> String {
    DEFAULT_BIND_HOST.to_string()
}

fn default_settle_delay_ms() -> u64 {
    DEFAULT_SETTLE_DELAY_MS
}

impl SessionConfig {
    pub fn new(
        bmc_host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            bmc_host: bmc_host.into(),
            username: username.into(),
            password: password.into(),
            rp_port: None,
            browser: BrowserPreference::default(),
            listen_port: None,
            bind_host: default_bind_host(),
            tls: TlsFiles::default(),
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            upstream_timeout_secs: None,
        }
    }

    pub fn with_rp_port(mut self, port: u16) -> Self {
        self.rp_port = Some(port);
        self
    }

    pub fn with_listen_port(mut self, port: u16) -> Self {
        self.listen_port = Some(port);
        self
    }

    pub fn with_browser(mut self, browser: BrowserPreference) -> Self {
        self.browser = browser;
        self
    }

    pub fn with_bind_host(mut self, host: impl Into<String>) -> Self {
        self.bind_host = host.into();
        self
    }

    pub fn with_tls_files(mut self, cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        self.tls = TlsFiles {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        };
        self
    }

    pub fn with_settle_delay_ms(mut self, millis: u64) -> Self {
        self.settle_delay_ms = millis;
        self
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check the fields that cannot be repaired during initialization
    pub fn validate(&self) -> Result<()> {
        let host = self.bmc_host.trim();
        if host.is_empty() {
            return Err(Error::InvalidConfig("BMC host is empty".to_string()));
        }
        if host.contains("://") {
            return Err(Error::InvalidConfig(format!(
                "BMC host '{}' must not include a scheme",
                host
            )));
        }
        if host.contains('/') || host.contains(char::is_whitespace) {
            return Err(Error::InvalidConfig(format!(
                "BMC host '{}' must be a bare host or host:port",
                host
            )));
        }
        if !host.starts_with('[') && host.matches(':').count() > 1 {
            return Err(Error::InvalidConfig(format!(
                "IPv6 BMC host '{}' must be written in brackets, e.g. [{}]",
                host, host
            )));
        }
        if host.starts_with('[') && !host.contains(']') {
            return Err(Error::InvalidConfig(format!(
                "BMC host '{}' has an unterminated '['",
                host
            )));
        }
        if self.bind_host.trim().is_empty() {
            return Err(Error::InvalidConfig("bind host is empty".to_string()));
        }
        Ok(())
    }

    /// Remote-presence port the caller pinned, if any
    pub fn explicit_rp_port(&self) -> Option<u16> {
        self.rp_port.filter(|p| *p != 0)
    }

    /// Listen port the caller pinned, if any
    pub fn explicit_listen_port(&self) -> Option<u16> {
        self.listen_port.filter(|p| *p != 0)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn upstream_timeout(&self) -> Option<Duration> {
        self.upstream_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::new("10.0.0.5", "USERID", "PASSW0RD");
        assert_eq!(config.bind_host, "127.0.0.1");
        assert_eq!(config.tls.cert_path, PathBuf::from("server.crt"));
        assert_eq!(config.tls.key_path, PathBuf::from("server.key"));
        assert_eq!(config.settle_delay(), Duration::from_millis(500));
        assert!(config.upstream_timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_ports_mean_unset() {
        let config = SessionConfig::new("bmc", "u", "p")
            .with_rp_port(0)
            .with_listen_port(0);
        assert_eq!(config.explicit_rp_port(), None);
        assert_eq!(config.explicit_listen_port(), None);

        let config = config.with_rp_port(3901).with_listen_port(8443);
        assert_eq!(config.explicit_rp_port(), Some(3901));
        assert_eq!(config.explicit_listen_port(), Some(8443));
    }

    #[test]
    fn test_validate_rejects_urls() {
        assert!(SessionConfig::new("", "u", "p").validate().is_err());
        assert!(SessionConfig::new("https://bmc", "u", "p").validate().is_err());
        assert!(SessionConfig::new("bmc/api", "u", "p").validate().is_err());
        assert!(SessionConfig::new("bmc.example.com:8443", "u", "p").validate().is_ok());
    }

    #[test]
    fn test_validate_ipv6_hosts() {
        assert!(SessionConfig::new("[fe80::1]", "u", "p").validate().is_ok());
        assert!(SessionConfig::new("[fe80::1]:8443", "u", "p").validate().is_ok());
        assert!(SessionConfig::new("fe80::1", "u", "p").validate().is_err());
        assert!(SessionConfig::new("[fe80::1", "u", "p").validate().is_err());
    }

    #[test]
    fn test_load_minimal_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.toml");
        std::fs::write(
            &path,
            "bmc_host = \"10.145.127.12\"\nusername = \"USERID\"\npassword = \"PASSW0RD\"\nbrowser = \"firefox\"\n",
        )
        .unwrap();

        let config = SessionConfig::load(&path).unwrap();
        assert_eq!(config.bmc_host, "10.145.127.12");
        assert_eq!(config.browser, BrowserPreference::Firefox);
        assert_eq!(config.rp_port, None);
        assert_eq!(config.settle_delay_ms, DEFAULT_SETTLE_DELAY_MS);
        assert_eq!(config.bind_host, DEFAULT_BIND_HOST);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.toml");
        let config = SessionConfig::new("bmc", "admin", "secret")
            .with_rp_port(3901)
            .with_tls_files("/etc/kvmrelay/cert.pem", "/etc/kvmrelay/key.pem");

        config.save(&path).unwrap();
        assert_eq!(SessionConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = SessionConfig::load(Path::new("/nonexistent/kvmrelay.toml")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
