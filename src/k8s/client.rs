//! Kubernetes client wrapper

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, Service};
use kube::{
    api::{Api, ListParams},
    Client, Config,
};
use tracing::{info, instrument};

use super::ClusterView;
use crate::error::Result;

/// Wrapper around kube::Client with the reads the pipeline needs
#[derive(Clone)]
pub struct K8sClient {
    client: Client,
}

impl K8sClient {
    /// Create a new K8sClient using the default kubeconfig or in-cluster config
    #[instrument(skip_all)]
    pub async fn new() -> Result<Self> {
        let config = Config::infer()
            .await
            .map_err(kube::Error::InferConfig)?;
        let client = Client::try_from(config)?;

        info!("Connected to Kubernetes cluster");

        Ok(Self { client })
    }

    fn pods_api(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn services_api(&self, namespace: &str) -> Api<Service> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ClusterView for K8sClient {
    async fn pods(&self, namespace: &str, label_selector: Option<String>) -> Result<Vec<Pod>> {
        let mut params = ListParams::default();
        if let Some(selector) = label_selector {
            params = params.labels(&selector);
        }
        let list = self.pods_api(namespace).list(&params).await?;
        Ok(list.items)
    }

    async fn service(&self, namespace: &str, name: &str) -> Result<Option<Service>> {
        match self.services_api(namespace).get(name).await {
            Ok(svc) => Ok(Some(svc)),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
