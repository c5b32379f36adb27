//! Kubernetes integration
//!
//! All cluster reads go through the `ClusterView` trait: pod snapshots for
//! the readiness gate and service/pod lookups for ingress resolution.
//! Mutations (apply/delete/label) never happen here; those go through
//! external commands.

mod client;
pub mod ingress;
pub mod readiness;

pub use client::K8sClient;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, Service};
#[cfg(test)]
use mockall::automock;

use crate::error::Result;

/// Read-only view of cluster state
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterView: Send + Sync {
    /// List pods in a namespace, optionally filtered by label selector
    async fn pods(&self, namespace: &str, label_selector: Option<String>) -> Result<Vec<Pod>>;

    /// Fetch a service by name, None when it does not exist
    async fn service(&self, namespace: &str, name: &str) -> Result<Option<Service>>;
}
