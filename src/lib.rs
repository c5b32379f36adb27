//! Meshbench library
//!
//! Provisions a service-mesh control plane, deploys a workload behind it,
//! waits for gang readiness, load tests the public ingress, and tears
//! everything down in reverse order.

pub mod command;
pub mod config;
pub mod error;
pub mod k8s;
pub mod loadgen;
pub mod mesh;
pub mod orchestrator;
pub mod workload;

pub use config::{Args, RunConfiguration, Settings};
pub use error::{Error, Result};
pub use orchestrator::Orchestrator;
