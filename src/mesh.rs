//! Service-mesh control-plane lifecycle
//!
//! Installs the control plane through istioctl (full config file when one is
//! given, named profile otherwise) and turns on sidecar auto-injection for
//! the workload namespace. Install is not transactional: a mid-install
//! failure leaves partial cluster state, so uninstall is built to run safely
//! after any partial install.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::command::CommandRunner;
use crate::error::{Error, Result};

/// Installs and removes the mesh control plane
pub struct ControlPlaneInstaller {
    runner: Arc<dyn CommandRunner>,
    namespace: String,
    control_plane_namespace: String,
}

impl ControlPlaneInstaller {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        namespace: impl Into<String>,
        control_plane_namespace: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            namespace: namespace.into(),
            control_plane_namespace: control_plane_namespace.into(),
        }
    }

    /// Install the control plane and label the workload namespace for
    /// sidecar injection. The config file wins over the profile when it
    /// names an existing file.
    #[instrument(skip(self, config_file), fields(namespace = %self.namespace))]
    pub async fn install(&self, config_file: Option<&PathBuf>, profile: &str) -> Result<()> {
        let mut args = vec!["install".to_string(), "-y".to_string()];
        match config_file {
            Some(path) if path.exists() => {
                info!(config = %path.display(), "Installing control plane from config file");
                args.push("-f".to_string());
                args.push(path.display().to_string());
            }
            _ => {
                info!(profile, "Installing control plane from profile");
                args.push("--set".to_string());
                args.push(format!("profile={}", profile));
            }
        }

        let output = self
            .runner
            .run("istioctl", args)
            .await
            .map_err(|e| Error::provision(e.to_string()))?;
        if !output.success {
            return Err(Error::provision(format!(
                "istioctl install failed: {}",
                output.failure_detail()
            )));
        }

        let output = self
            .runner
            .run(
                "kubectl",
                vec![
                    "label".to_string(),
                    "namespace".to_string(),
                    self.namespace.clone(),
                    "istio-injection=enabled".to_string(),
                    "--overwrite".to_string(),
                ],
            )
            .await
            .map_err(|e| Error::provision(e.to_string()))?;
        if !output.success {
            return Err(Error::provision(format!(
                "failed to label namespace '{}' for injection: {}",
                self.namespace,
                output.failure_detail()
            )));
        }

        info!("Control plane installed and injection enabled");
        Ok(())
    }

    /// Remove the control plane, the injection label, and the control-plane
    /// namespace. Every step runs even when an earlier one fails, so this
    /// is safe after a partial install; the last hard failure is returned.
    #[instrument(skip(self), fields(namespace = %self.namespace))]
    pub async fn uninstall(&self) -> Result<()> {
        let mut last_failure = None;

        let purge = self
            .runner
            .run(
                "istioctl",
                vec![
                    "uninstall".to_string(),
                    "--purge".to_string(),
                    "-y".to_string(),
                ],
            )
            .await;
        match purge {
            Ok(output) if output.success => info!("Control plane purged"),
            Ok(output) => {
                warn!("istioctl uninstall failed: {}", output.failure_detail());
                last_failure = Some(Error::provision(output.failure_detail()));
            }
            Err(e) => {
                warn!("istioctl uninstall could not run: {}", e);
                last_failure = Some(Error::provision(e.to_string()));
            }
        }

        // Label removal and namespace deletion are cleanup of our own
        // bookkeeping; missing targets are fine.
        let unlabel = self
            .runner
            .run(
                "kubectl",
                vec![
                    "label".to_string(),
                    "namespace".to_string(),
                    self.namespace.clone(),
                    "istio-injection-".to_string(),
                ],
            )
            .await;
        match unlabel {
            Ok(output) if !output.success => {
                warn!("Failed to remove injection label: {}", output.failure_detail());
            }
            Ok(_) => {}
            Err(e) => warn!("Injection label removal could not run: {}", e),
        }

        let delete_ns = self
            .runner
            .run(
                "kubectl",
                vec![
                    "delete".to_string(),
                    "namespace".to_string(),
                    self.control_plane_namespace.clone(),
                    "--ignore-not-found".to_string(),
                ],
            )
            .await;
        match delete_ns {
            Ok(output) if output.success => {
                info!(namespace = %self.control_plane_namespace, "Control-plane namespace deleted")
            }
            Ok(output) => {
                warn!("Failed to delete control-plane namespace: {}", output.failure_detail());
                last_failure = Some(Error::provision(output.failure_detail()));
            }
            Err(e) => {
                warn!("kubectl delete namespace could not run: {}", e);
                last_failure = Some(Error::provision(e.to_string()));
            }
        }

        match last_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
