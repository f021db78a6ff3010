//! TLS material for the local listener
//!
//! The relay serves HTTPS with a certificate/key pair that already exists on
//! disk. [`generate_self_signed`] exists for the CLI `cert` command; sessions
//! never create certificates on their own.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use tokio::net::TcpStream;
use tokio_rustls::server::TlsStream;

use kvmrelay_common::{Error, Result};

/// Upgrades accepted TCP connections to TLS
#[derive(Clone)]
pub struct TlsAcceptor {
    inner: tokio_rustls::TlsAcceptor,
}

impl TlsAcceptor {
    /// Build an acceptor from PEM-encoded certificate chain and key files.
    pub fn from_pem_files(cert_path: &Path, key_path: &Path) -> Result<Self> {
        let certs = load_certificates(cert_path)?;
        if certs.is_empty() {
            return Err(Error::Tls(format!(
                "no certificates found in {}",
                cert_path.display()
            )));
        }
        let key = load_private_key(key_path)?;

        let provider = rustls::crypto::ring::default_provider();

        let mut server_config = ServerConfig::builder_with_provider(Arc::new(provider))
            .with_safe_default_protocol_versions()
            .map_err(|e| Error::Tls(format!("failed to set protocol versions: {}", e)))?
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(|e| Error::Tls(format!("failed to build TLS config: {}", e)))?;
        server_config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

        Ok(Self {
            inner: tokio_rustls::TlsAcceptor::from(Arc::new(server_config)),
        })
    }

    pub async fn accept(&self, stream: TcpStream) -> Result<TlsStream<TcpStream>> {
        self.inner
            .accept(stream)
            .await
            .map_err(|e| Error::Tls(format!("handshake failed: {}", e)))
    }
}

fn load_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path)
        .map_err(|e| Error::Tls(format!("failed to open {}: {}", path.display(), e)))?;
    let mut reader = BufReader::new(file);

    rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Tls(format!("failed to parse {}: {}", path.display(), e)))
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let file = File::open(path)
        .map_err(|e| Error::Tls(format!("failed to open {}: {}", path.display(), e)))?;
    let mut reader = BufReader::new(file);

    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| Error::Tls(format!("failed to parse {}: {}", path.display(), e)))?
        .ok_or_else(|| Error::Tls(format!("no private key found in {}", path.display())))
}

/// Write a self-signed certificate and its private key as PEM files.
pub fn generate_self_signed(names: &[String], cert_path: &Path, key_path: &Path) -> Result<()> {
    let certified = rcgen::generate_simple_self_signed(names.to_vec())
        .map_err(|e| Error::Tls(format!("certificate generation failed: {}", e)))?;

    for path in [cert_path, key_path] {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }

    std::fs::write(cert_path, certified.cert.pem())?;
    std::fs::write(key_path, certified.key_pair.serialize_pem())?;
    Ok(())
}
