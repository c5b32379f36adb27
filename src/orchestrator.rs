//! End-to-end pipeline
//!
//! Fixed sequence: install the control plane, deploy the workload, block on
//! the readiness gate, resolve the ingress, drive the load backends, then
//! tear everything down in reverse unless the keep flag is set. Setup
//! failures abort the pipeline but still trigger best-effort cleanup of
//! whatever was created; resolution failures skip load testing but never
//! teardown; load failures are recorded and surfaced only after cleanup.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::command::CommandRunner;
use crate::config::RunConfiguration;
use crate::error::Result;
use crate::k8s::ingress::IngressResolver;
use crate::k8s::readiness::ReadinessGate;
use crate::k8s::ClusterView;
use crate::loadgen::{target_url, LoadTestDriver};
use crate::mesh::ControlPlaneInstaller;
use crate::workload::{DeploymentStack, WorkloadManager};

pub struct Orchestrator {
    config: RunConfiguration,
    runner: Arc<dyn CommandRunner>,
    cluster: Arc<dyn ClusterView>,
}

impl Orchestrator {
    pub fn new(
        config: RunConfiguration,
        runner: Arc<dyn CommandRunner>,
        cluster: Arc<dyn ClusterView>,
    ) -> Self {
        Self {
            config,
            runner,
            cluster,
        }
    }

    #[instrument(skip(self), fields(namespace = %self.config.namespace))]
    pub async fn run(&self) -> Result<()> {
        let installer = ControlPlaneInstaller::new(
            self.runner.clone(),
            &self.config.namespace,
            &self.config.control_plane_namespace,
        );
        let workloads = WorkloadManager::new(self.runner.clone(), &self.config.namespace);
        let mut stack = DeploymentStack::new();

        info!("Phase: control-plane install");
        if let Err(e) = installer
            .install(self.config.config_file.as_ref(), &self.config.profile)
            .await
        {
            self.abort_cleanup(&workloads, &installer, &stack).await;
            return Err(e);
        }

        info!("Phase: workload deploy");
        if let Err(e) = workloads.deploy(&mut stack, &self.config.resources).await {
            self.abort_cleanup(&workloads, &installer, &stack).await;
            return Err(e);
        }

        info!("Phase: readiness wait");
        let gate = ReadinessGate::new(
            &self.config.namespace,
            self.config.poll_interval,
            self.config.readiness_timeout,
        );
        if let Err(e) = gate.wait(self.cluster.as_ref()).await {
            self.abort_cleanup(&workloads, &installer, &stack).await;
            return Err(e);
        }

        info!("Phase: ingress resolution");
        let resolver = IngressResolver::new(&self.config.control_plane_namespace);
        let resolution = resolver.resolve(self.cluster.as_ref()).await;

        let mut load_failures = Vec::new();
        match &resolution {
            Ok(endpoint) => {
                let url = target_url(self.config.secure, endpoint, &self.config.match_path);
                info!(target = %url, "Phase: load test");
                let driver = LoadTestDriver::new(self.runner.clone(), &self.config);
                load_failures = driver.run(&url).await;
            }
            Err(e) => {
                // Fatal for load testing, but teardown still happens
                error!("Skipping load test, ingress could not be resolved: {}", e);
            }
        }

        let teardown_result = if self.config.keep {
            info!("Keep flag set, leaving workload and control plane running");
            Ok(())
        } else {
            info!("Phase: teardown");
            let deleted = workloads.teardown(&stack).await;
            let uninstalled = installer.uninstall().await;
            deleted.and(uninstalled)
        };

        // Error precedence once cleanup has run: resolution, then the first
        // load failure, then any teardown failure.
        resolution?;
        if let Some(failure) = load_failures.into_iter().next() {
            return Err(failure);
        }
        teardown_result?;

        info!("Run complete");
        Ok(())
    }

    /// Best-effort reverse-order cleanup after a setup failure. Honors the
    /// keep flag so a failed environment can be inspected.
    async fn abort_cleanup(
        &self,
        workloads: &WorkloadManager,
        installer: &ControlPlaneInstaller,
        stack: &DeploymentStack,
    ) {
        if self.config.keep {
            warn!("Setup failed but keep flag is set, leaving partial state in place");
            return;
        }

        warn!(applied = stack.len(), "Setup failed, cleaning up partial state");
        if let Err(e) = workloads.teardown(stack).await {
            warn!("Cleanup teardown incomplete: {}", e);
        }
        if let Err(e) = installer.uninstall().await {
            warn!("Cleanup uninstall incomplete: {}", e);
        }
    }
}
