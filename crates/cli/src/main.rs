//! kvmrelay CLI - Main Entry Point
//!
//! Opens a BMC's remote console in a local browser through an HTTPS relay.

use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{cert, console, rp_port};

/// kvmrelay - BMC remote console relay
#[derive(Parser)]
#[command(name = "kvmrelay")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve a BMC console locally and open it in a browser
    Console(console::ConsoleArgs),

    /// Ask a BMC for its remote-presence port
    RpPort(rp_port::RpPortArgs),

    /// Create a self-signed certificate for the local listener
    Cert(cert::CertArgs),

    /// Show version information
    Version,
}

fn init_logging(verbose: bool, json: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    let result = match cli.command {
        Commands::Console(args) => console::execute(args).await,
        Commands::RpPort(args) => rp_port::execute(args).await,
        Commands::Cert(args) => cert::execute(args),
        Commands::Version => {
            println!("kvmrelay v{}", kvmrelay_common::VERSION);
            println!("Local HTTPS relay for BMC remote consoles");
            Ok(())
        }
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
