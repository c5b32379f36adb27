//! Error taxonomy for the provisioning pipeline
//!
//! Each variant corresponds to one pipeline phase so the binary can map
//! failures to distinct exit codes.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Control-plane install/uninstall or namespace labeling failed
    #[error("provisioning failed: {0}")]
    Provision(String),

    /// Applying or deleting a workload resource failed
    #[error("deployment failed for '{resource}': {message}")]
    Deployment { resource: String, message: String },

    /// The readiness gate never saw a fully-ready snapshot within the bound
    #[error("workload in namespace '{namespace}' not ready after {waited_secs}s")]
    ReadinessTimeout { namespace: String, waited_secs: u64 },

    /// No usable ingress endpoint could be determined
    #[error("ingress resolution failed: {0}")]
    Resolution(String),

    /// A load-generation backend invocation failed
    #[error("load test backend '{backend}' failed: {message}")]
    LoadTest { backend: String, message: String },

    /// Kubernetes API error while reading cluster state
    #[error("cluster api error: {0}")]
    Cluster(#[from] kube::Error),

    /// Invalid or unresolvable configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn provision(message: impl Into<String>) -> Self {
        Error::Provision(message.into())
    }

    pub fn deployment(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Deployment {
            resource: resource.into(),
            message: message.into(),
        }
    }

    pub fn resolution(message: impl Into<String>) -> Self {
        Error::Resolution(message.into())
    }

    pub fn load_test(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Error::LoadTest {
            backend: backend.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    /// Process exit code for this error kind
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Provision(_) => 2,
            Error::Deployment { .. } => 3,
            Error::ReadinessTimeout { .. } => 4,
            Error::Resolution(_) => 5,
            Error::LoadTest { .. } => 6,
            Error::Cluster(_) | Error::Config(_) => 1,
        }
    }
}
