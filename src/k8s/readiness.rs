//! Gang-readiness gate
//!
//! Two-state machine: `Waiting` until a single snapshot shows every pod in
//! the namespace fully ready, then `Ready` (terminal). Each tick takes a
//! fresh snapshot; if any pod fails the predicate the whole snapshot is
//! discarded and the next tick re-evaluates the full set. Nothing carries
//! across iterations except "not yet ready".

use std::time::Duration;

use k8s_openapi::api::core::v1::Pod;
use strum::Display;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

use super::ClusterView;
use crate::error::{Error, Result};

/// Gate state; `Ready` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum GateState {
    Waiting,
    Ready,
}

/// Per-pod readiness extracted from one snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodReadiness {
    pub name: String,
    pub ready_containers: usize,
    pub total_containers: usize,
    pub phase: String,
}

impl PodReadiness {
    pub fn is_ready(&self) -> bool {
        self.ready_containers == self.total_containers && self.phase == "Running"
    }
}

/// Extract readiness tuples from a fresh pod listing. Total container count
/// comes from the pod spec (sidecar injection changes it per pod), ready
/// count from the container statuses.
pub fn snapshot(pods: &[Pod]) -> Vec<PodReadiness> {
    pods.iter()
        .map(|pod| {
            let name = pod.metadata.name.clone().unwrap_or_default();

            let total_containers = pod
                .spec
                .as_ref()
                .map(|s| s.containers.len())
                .unwrap_or(0);

            let ready_containers = pod
                .status
                .as_ref()
                .and_then(|s| s.container_statuses.as_ref())
                .map(|statuses| statuses.iter().filter(|c| c.ready).count())
                .unwrap_or(0);

            let phase = pod
                .status
                .as_ref()
                .and_then(|s| s.phase.clone())
                .unwrap_or_else(|| "Unknown".to_string());

            PodReadiness {
                name,
                ready_containers,
                total_containers,
                phase,
            }
        })
        .collect()
}

/// Evaluate one snapshot as a single atomic predicate. An empty snapshot is
/// `Waiting`: the poll can win the race against pod creation, and a gate
/// that has seen no workload has nothing to declare ready.
pub fn evaluate(snapshot: &[PodReadiness]) -> GateState {
    if !snapshot.is_empty() && snapshot.iter().all(PodReadiness::is_ready) {
        GateState::Ready
    } else {
        GateState::Waiting
    }
}

/// Polls pod status until a consistent snapshot shows everything serving
pub struct ReadinessGate {
    namespace: String,
    interval: Duration,
    /// None blocks indefinitely
    timeout: Option<Duration>,
}

impl ReadinessGate {
    pub fn new(namespace: impl Into<String>, interval: Duration, timeout: Option<Duration>) -> Self {
        Self {
            namespace: namespace.into(),
            interval,
            timeout,
        }
    }

    /// Block until the gate reaches `Ready`, or fail with
    /// `ReadinessTimeout` once the configured bound elapses.
    #[instrument(skip(self, cluster), fields(namespace = %self.namespace))]
    pub async fn wait(&self, cluster: &dyn ClusterView) -> Result<()> {
        let started = Instant::now();

        loop {
            let pods = cluster.pods(&self.namespace, None).await?;
            let snap = snapshot(&pods);

            let ready = snap.iter().filter(|p| p.is_ready()).count();
            debug!(ready, total = snap.len(), "Polled pod readiness");

            if evaluate(&snap) == GateState::Ready {
                info!(pods = snap.len(), "All pods ready");
                return Ok(());
            }

            if let Some(timeout) = self.timeout {
                if started.elapsed() >= timeout {
                    return Err(Error::ReadinessTimeout {
                        namespace: self.namespace.clone(),
                        waited_secs: started.elapsed().as_secs(),
                    });
                }
            }

            tokio::time::sleep(self.interval).await;
        }
    }
}
