//! TLS configuration for SMTP sessions.

use crate::error::{Error, Result};
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_rustls::TlsConnector;

/// Where the TLS client configuration comes from.
#[derive(Debug, Clone)]
pub enum TlsParameters {
    /// Mozilla's root store via `webpki-roots`.
    DefaultRoots,
    /// Trust only the root certificates in a PEM file.
    CustomRootFile(PathBuf),
    /// A fully caller-supplied configuration.
    Custom(Arc<ClientConfig>),
}

impl TlsParameters {
    /// Builds a connector from these parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the custom root file cannot be read or
    /// contains no usable certificates.
    pub fn connector(&self) -> Result<TlsConnector> {
        let config = match self {
            Self::DefaultRoots => {
                let roots = RootCertStore {
                    roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
                };
                Arc::new(
                    ClientConfig::builder()
                        .with_root_certificates(roots)
                        .with_no_client_auth(),
                )
            }
            Self::CustomRootFile(path) => {
                let pem = std::fs::read(path)?;
                let mut roots = RootCertStore::empty();
                for cert in rustls_pemfile::certs(&mut pem.as_slice()) {
                    roots.add(cert?)?;
                }
                if roots.is_empty() {
                    return Err(Error::Protocol(format!(
                        "no root certificates found in {}",
                        path.display()
                    )));
                }
                Arc::new(
                    ClientConfig::builder()
                        .with_root_certificates(roots)
                        .with_no_client_auth(),
                )
            }
            Self::Custom(config) => Arc::clone(config),
        };
        Ok(TlsConnector::from(config))
    }
}

/// Session security mode, fixed at connect time.
#[derive(Debug, Clone)]
pub enum Security {
    /// Plaintext for the whole session (port 25). **Not recommended.**
    Insecure,
    /// Start in plaintext and upgrade with STARTTLS when the server
    /// advertises it (port 587).
    StartTls(TlsParameters),
    /// TLS from the first byte (port 465). **Recommended.**
    Implicit(TlsParameters),
}

impl Security {
    /// Returns the conventional port for this mode.
    #[must_use]
    pub const fn default_port(&self) -> u16 {
        match self {
            Self::Insecure => 25,
            Self::StartTls(_) => 587,
            Self::Implicit(_) => 465,
        }
    }
}

/// Converts a hostname into the SNI name used for certificate checks.
pub(crate) fn server_name(hostname: &str) -> Result<ServerName<'static>> {
    ServerName::try_from(hostname.to_string())
        .map_err(|_| Error::Protocol(format!("invalid hostname: {hostname}")))
}
