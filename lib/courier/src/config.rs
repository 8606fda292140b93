//! Pipeline configuration types.

use std::path::PathBuf;

/// Deployment-mode switches consumed when a pipeline is built.
///
/// The embedding application reads these from its own configuration
/// subsystem; the pipeline only looks at the two booleans.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineConfig {
    /// Running under a clustered/managed deployment.
    ///
    /// Egress is platform-managed there, so per-pipeline proxy overrides
    /// are refused.
    pub clustered: bool,
    /// Local/development mode.
    ///
    /// Request/response tracing may only be attached in local mode.
    pub local: bool,
}

/// TLS trust material, loaded once when the [`TlsPolicy`] is built.
///
/// All paths are optional; with none set the policy trusts the bundled
/// webpki roots and presents no client certificate.
///
/// [`TlsPolicy`]: crate::TlsPolicy
#[derive(Debug, Clone, Default)]
pub struct TlsSettings {
    /// Extra PEM bundle of CA certificates added to the webpki roots.
    pub ca_bundle: Option<PathBuf>,
    /// PEM certificate chain presented for client authentication.
    pub client_cert: Option<PathBuf>,
    /// PEM private key matching `client_cert`.
    pub client_key: Option<PathBuf>,
}
