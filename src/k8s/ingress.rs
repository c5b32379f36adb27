//! Ingress endpoint resolution
//!
//! Discovers the externally reachable host and ports of the ingress
//! gateway. Two topologies exist in the wild: a cloud load balancer with an
//! external IP and a bare-metal cluster exposing node ports. The
//! load-balancer host is authoritative when present; the node-port path is
//! consulted only when no load-balancer host exists. One read per path, no
//! retries.

use k8s_openapi::api::core::v1::{Pod, Service};
use tracing::{info, instrument};

use super::ClusterView;
use crate::error::{Error, Result};

/// Name of the ingress gateway service in the control-plane namespace
pub const INGRESS_SERVICE: &str = "istio-ingressgateway";

/// Label selector matching the ingress gateway pods
pub const INGRESS_POD_SELECTOR: &str = "istio=ingressgateway";

const PLAIN_PORT_NAME: &str = "http2";
const SECURE_PORT_NAME: &str = "https";

/// Externally reachable ingress address; write-once, read-only thereafter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressEndpoint {
    pub host: String,
    pub plain_port: i32,
    pub secure_port: i32,
}

/// Non-empty external IP of the load balancer, if one has been assigned
pub fn lb_host(service: &Service) -> Option<String> {
    service
        .status
        .as_ref()?
        .load_balancer
        .as_ref()?
        .ingress
        .as_ref()?
        .first()?
        .ip
        .clone()
        .filter(|ip| !ip.is_empty())
}

/// Node-port fallback: host IP of an ingress pod plus the node-assigned ports
pub fn node_port_endpoint(service: &Service, gateway_pods: &[Pod]) -> Option<IngressEndpoint> {
    let host = gateway_pods
        .iter()
        .find_map(|pod| pod.status.as_ref()?.host_ip.clone())?;

    if host.is_empty() {
        return None;
    }

    Some(IngressEndpoint {
        host,
        plain_port: named_port(service, PLAIN_PORT_NAME, |p| p.node_port)?,
        secure_port: named_port(service, SECURE_PORT_NAME, |p| p.node_port)?,
    })
}

fn named_port<F>(service: &Service, name: &str, extract: F) -> Option<i32>
where
    F: Fn(&k8s_openapi::api::core::v1::ServicePort) -> Option<i32>,
{
    service
        .spec
        .as_ref()?
        .ports
        .as_ref()?
        .iter()
        .find(|p| p.name.as_deref() == Some(name))
        .and_then(extract)
}

/// Discovers how the ingress gateway is reachable from outside the cluster
pub struct IngressResolver {
    control_plane_namespace: String,
}

impl IngressResolver {
    pub fn new(control_plane_namespace: impl Into<String>) -> Self {
        Self {
            control_plane_namespace: control_plane_namespace.into(),
        }
    }

    #[instrument(skip(self, cluster), fields(namespace = %self.control_plane_namespace))]
    pub async fn resolve(&self, cluster: &dyn ClusterView) -> Result<IngressEndpoint> {
        let service = cluster
            .service(&self.control_plane_namespace, INGRESS_SERVICE)
            .await?
            .ok_or_else(|| {
                Error::resolution(format!(
                    "service '{}' not found in namespace '{}'",
                    INGRESS_SERVICE, self.control_plane_namespace
                ))
            })?;

        // A load-balancer host commits resolution to the LB path; missing
        // named ports are an error there, not a reason to consult the pods.
        if let Some(host) = lb_host(&service) {
            let plain = named_port(&service, PLAIN_PORT_NAME, |p| Some(p.port));
            let secure = named_port(&service, SECURE_PORT_NAME, |p| Some(p.port));
            return match (plain, secure) {
                (Some(plain_port), Some(secure_port)) => {
                    info!(host = %host, "Resolved ingress via load balancer");
                    Ok(IngressEndpoint {
                        host,
                        plain_port,
                        secure_port,
                    })
                }
                _ => Err(Error::resolution(format!(
                    "load-balancer host '{}' found but service '{}' has no '{}'/'{}' ports",
                    host, INGRESS_SERVICE, PLAIN_PORT_NAME, SECURE_PORT_NAME
                ))),
            };
        }

        let gateway_pods = cluster
            .pods(
                &self.control_plane_namespace,
                Some(INGRESS_POD_SELECTOR.to_string()),
            )
            .await?;

        match node_port_endpoint(&service, &gateway_pods) {
            Some(endpoint) => {
                info!(host = %endpoint.host, "Resolved ingress via node port");
                Ok(endpoint)
            }
            None => Err(Error::resolution(
                "no load-balancer IP and no usable node-port host for the ingress gateway",
            )),
        }
    }
}
