//! TLS policy applied to every connector.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use rustls::RootCertStore;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};

use courier_core::{Error, Result};

use crate::config::TlsSettings;

/// Process-wide TLS trust policy.
///
/// Assembled once at startup from [`TlsSettings`] and applied to every
/// connector the pipeline creates, so the shared pool and any dedicated
/// proxied transport negotiate TLS with identical trust configuration.
#[derive(Clone)]
pub struct TlsPolicy {
    config: rustls::ClientConfig,
}

impl std::fmt::Debug for TlsPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsPolicy").finish_non_exhaustive()
    }
}

impl TlsPolicy {
    /// Build the policy from trust settings.
    ///
    /// Starts from the Mozilla webpki roots, appends an optional PEM CA
    /// bundle, and loads an optional client certificate chain and key.
    ///
    /// # Errors
    ///
    /// Returns an error if any configured PEM file cannot be read or
    /// parsed, or if only one of the client certificate pair is set.
    pub fn from_settings(settings: &TlsSettings) -> Result<Self> {
        let mut root_store: RootCertStore =
            webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();

        if let Some(path) = &settings.ca_bundle {
            for cert in load_certs(path)? {
                root_store.add(cert).map_err(|e| {
                    Error::tls(format!("invalid CA certificate in {}: {e}", path.display()))
                })?;
            }
        }

        let builder = rustls::ClientConfig::builder().with_root_certificates(root_store);

        let config = match (&settings.client_cert, &settings.client_key) {
            (Some(cert_path), Some(key_path)) => {
                let certs = load_certs(cert_path)?;
                let key = load_private_key(key_path)?;
                builder
                    .with_client_auth_cert(certs, key)
                    .map_err(|e| Error::tls(format!("invalid client certificate: {e}")))?
            }
            (None, None) => builder.with_no_client_auth(),
            _ => {
                return Err(Error::tls(
                    "client certificate and key must both be set or both be unset",
                ));
            }
        };

        Ok(Self { config })
    }

    /// Wrap a connector so every connection it makes uses this policy.
    ///
    /// The connector must already accept `https` URIs (for
    /// `HttpConnector`, call `enforce_http(false)` first).
    pub fn wrap<C>(&self, connector: C) -> HttpsConnector<C> {
        HttpsConnectorBuilder::new()
            .with_tls_config(self.config.clone())
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .wrap_connector(connector)
    }
}

impl Default for TlsPolicy {
    /// Webpki roots only, no client authentication.
    fn default() -> Self {
        let root_store: RootCertStore = webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();

        let config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        Self { config }
    }
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let file =
        File::open(path).map_err(|e| Error::tls(format!("cannot open {}: {e}", path.display())))?;
    let mut reader = BufReader::new(file);

    rustls_pemfile::certs(&mut reader)
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| Error::tls(format!("cannot parse {}: {e}", path.display())))
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let file =
        File::open(path).map_err(|e| Error::tls(format!("cannot open {}: {e}", path.display())))?;
    let mut reader = BufReader::new(file);

    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| Error::tls(format!("cannot parse {}: {e}", path.display())))?
        .ok_or_else(|| Error::tls(format!("no private key found in {}", path.display())))
}
