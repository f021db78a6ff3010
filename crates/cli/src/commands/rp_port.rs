//! Remote-presence port lookup command

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use serde::Serialize;

use kvmrelay_common::DEFAULT_RP_PORT;
use kvmrelay_web::{insecure_client, query_rp_port};

use crate::output::{print_item, OutputFormat, TableDisplay};

#[derive(Parser, Debug)]
pub struct RpPortArgs {
    /// BMC address, `host` or `host:port`
    pub host: String,

    /// BMC account name
    pub username: String,

    /// BMC account password
    #[arg(env = "KVMRELAY_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Output format
    #[arg(long, value_enum, default_value = "plain")]
    pub format: OutputFormat,

    /// Request timeout in seconds
    #[arg(long, default_value = "10")]
    pub timeout: u64,
}

/// Outcome of a lookup
#[derive(Debug, Serialize)]
pub struct RpPortReport {
    pub host: String,
    pub rp_port: u16,
    /// `bmc` when the BMC answered, `default` otherwise
    pub source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

impl RpPortReport {
    pub fn from_lookup(host: &str, result: kvmrelay_common::Result<u16>) -> Self {
        match result {
            Ok(port) => Self {
                host: host.to_string(),
                rp_port: port,
                source: "bmc",
                fallback_reason: None,
            },
            Err(e) => Self {
                host: host.to_string(),
                rp_port: DEFAULT_RP_PORT,
                source: "default",
                fallback_reason: Some(e.to_string()),
            },
        }
    }
}

impl TableDisplay for RpPortReport {
    fn headers() -> Vec<&'static str> {
        vec!["Host", "RP Port", "Source", "Note"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.host.clone(),
            self.rp_port.to_string(),
            self.source.to_string(),
            self.fallback_reason.clone().unwrap_or_default(),
        ]
    }
}

pub async fn execute(args: RpPortArgs) -> Result<()> {
    let client = insecure_client(Some(Duration::from_secs(args.timeout)))?;
    let result = query_rp_port(&client, &args.host, &args.username, &args.password).await;
    print_item(&RpPortReport::from_lookup(&args.host, result), args.format);
    Ok(())
}
