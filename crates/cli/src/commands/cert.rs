//! Local certificate command

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;

use kvmrelay_common::{DEFAULT_CERT_FILE, DEFAULT_KEY_FILE};
use kvmrelay_web::generate_self_signed;

use crate::output::print_success;

#[derive(Parser, Debug)]
pub struct CertArgs {
    /// Certificate output path
    #[arg(long, default_value = DEFAULT_CERT_FILE)]
    pub cert: PathBuf,

    /// Private key output path
    #[arg(long, default_value = DEFAULT_KEY_FILE)]
    pub key: PathBuf,

    /// Subject alternative name (repeatable)
    #[arg(long = "name")]
    pub names: Vec<String>,

    /// Overwrite existing files
    #[arg(long)]
    pub force: bool,
}

pub fn execute(args: CertArgs) -> Result<()> {
    for path in [&args.cert, &args.key] {
        if path.exists() && !args.force {
            bail!("{} already exists; pass --force to overwrite", path.display());
        }
    }

    let names = if args.names.is_empty() {
        vec!["localhost".to_string(), "127.0.0.1".to_string()]
    } else {
        args.names
    };

    generate_self_signed(&names, &args.cert, &args.key)?;
    print_success(&format!(
        "Wrote {} and {} for {}",
        args.cert.display(),
        args.key.display(),
        names.join(", ")
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(dir: &std::path::Path, force: bool) -> CertArgs {
        CertArgs {
            cert: dir.join("server.crt"),
            key: dir.join("server.key"),
            names: vec![],
            force,
        }
    }

    #[test]
    fn test_writes_pair() {
        let dir = tempfile::tempdir().unwrap();
        execute(args(dir.path(), false)).unwrap();
        assert!(dir.path().join("server.crt").exists());
        assert!(dir.path().join("server.key").exists());
    }

    #[test]
    fn test_refuses_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("server.key"), "keep me").unwrap();

        assert!(execute(args(dir.path(), false)).is_err());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("server.key")).unwrap(),
            "keep me"
        );

        execute(args(dir.path(), true)).unwrap();
        assert!(std::fs::read_to_string(dir.path().join("server.key"))
            .unwrap()
            .contains("PRIVATE KEY"));
    }
}
