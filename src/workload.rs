//! Workload deployment and teardown
//!
//! Applies an ordered list of resource manifests and deletes them in exactly
//! reverse order. Dependent resources (a gateway referencing a backing
//! service) must be removed before their dependencies, so the reverse-order
//! invariant is hard: the `DeploymentStack` is append-only while deploying
//! and only iterated last-to-first once teardown begins.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::command::CommandRunner;
use crate::error::{Error, Result};

/// One deployable manifest, identified by a local path or remote URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    location: String,
}

impl ResourceRef {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.location)
    }
}

/// Ordered record of what has actually been applied to the cluster
#[derive(Debug, Default)]
pub struct DeploymentStack {
    applied: Vec<ResourceRef>,
}

impl DeploymentStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, resource: ResourceRef) {
        self.applied.push(resource);
    }

    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }

    pub fn len(&self) -> usize {
        self.applied.len()
    }

    /// Iterate in teardown order: exact reverse of application order
    pub fn unwind(&self) -> impl Iterator<Item = &ResourceRef> {
        self.applied.iter().rev()
    }
}

/// Applies and deletes workload manifests through kubectl
pub struct WorkloadManager {
    runner: Arc<dyn CommandRunner>,
    namespace: String,
}

impl WorkloadManager {
    pub fn new(runner: Arc<dyn CommandRunner>, namespace: impl Into<String>) -> Self {
        Self {
            runner,
            namespace: namespace.into(),
        }
    }

    /// Apply each resource in listed order, recording every successful
    /// apply on the stack so a mid-sequence failure can still be unwound.
    #[instrument(skip(self, stack, resources), fields(namespace = %self.namespace))]
    pub async fn deploy(
        &self,
        stack: &mut DeploymentStack,
        resources: &[ResourceRef],
    ) -> Result<()> {
        for resource in resources {
            info!(resource = %resource, "Applying resource");
            let output = self
                .runner
                .run(
                    "kubectl",
                    vec![
                        "apply".to_string(),
                        "-n".to_string(),
                        self.namespace.clone(),
                        "-f".to_string(),
                        resource.location().to_string(),
                    ],
                )
                .await
                .map_err(|e| Error::deployment(resource.location(), e.to_string()))?;

            if !output.success {
                return Err(Error::deployment(
                    resource.location(),
                    output.failure_detail(),
                ));
            }

            stack.push(resource.clone());
        }

        info!(count = stack.len(), "All resources applied");
        Ok(())
    }

    /// Delete everything on the stack, last-applied first. Best-effort:
    /// a failed delete is logged and the remaining deletes still run; the
    /// last failure is returned.
    #[instrument(skip(self, stack), fields(namespace = %self.namespace))]
    pub async fn teardown(&self, stack: &DeploymentStack) -> Result<()> {
        let mut last_failure = None;

        for resource in stack.unwind() {
            info!(resource = %resource, "Deleting resource");
            let result = self
                .runner
                .run(
                    "kubectl",
                    vec![
                        "delete".to_string(),
                        "-n".to_string(),
                        self.namespace.clone(),
                        "-f".to_string(),
                        resource.location().to_string(),
                        "--ignore-not-found".to_string(),
                    ],
                )
                .await;

            match result {
                Ok(output) if output.success => {}
                Ok(output) => {
                    warn!(resource = %resource, "Delete failed: {}", output.failure_detail());
                    last_failure = Some(Error::deployment(
                        resource.location(),
                        output.failure_detail(),
                    ));
                }
                Err(e) => {
                    warn!(resource = %resource, "Delete could not run: {}", e);
                    last_failure = Some(Error::deployment(resource.location(), e.to_string()));
                }
            }
        }

        match last_failure {
            Some(err) => Err(err),
            None => {
                info!(count = stack.len(), "All resources deleted");
                Ok(())
            }
        }
    }
}
