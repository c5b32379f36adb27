//! Run configuration
//!
//! All operator-supplied knobs are folded into one immutable
//! `RunConfiguration` up front: CLI flags for the per-run surface,
//! environment variables (MESHBENCH_*) for operational settings. Defaults
//! that depend on the host (the fortio connection level) are resolved here,
//! never queried later from business logic.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use serde::Deserialize;

use crate::workload::ResourceRef;

/// Default two-resource workload: application manifest plus gateway manifest
pub const DEFAULT_APP_MANIFEST: &str = "samples/bookinfo/platform/kube/bookinfo.yaml";
pub const DEFAULT_GATEWAY_MANIFEST: &str = "samples/bookinfo/networking/bookinfo-gateway.yaml";

/// CLI surface
#[derive(Parser, Debug)]
#[command(name = "meshbench")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Control-plane config file (overrides the mesh profile)
    #[arg(short = 'f', long = "config-file")]
    pub config_file: Option<PathBuf>,

    /// Keep the control plane and workload installed after the run
    #[arg(short = 'k', long = "keep")]
    pub keep: bool,

    /// Path appended to the ingress host when building the target URL
    #[arg(short = 'p', long = "match-path", default_value = "")]
    pub match_path: String,

    /// Use the secure scheme (https + secure port) for the target URL
    #[arg(short = 's', long = "secure")]
    pub secure: bool,

    /// Fortio connection level (0 skips fortio entirely)
    #[arg(short = 'c', long = "connections")]
    pub connections: Option<u32>,

    /// Free-form extra parameters passed to fortio
    #[arg(short = 'F', long = "fortio-params", default_value = "", allow_hyphen_values = true)]
    pub fortio_params: String,

    /// K6 virtual-user level (0 skips k6 entirely)
    #[arg(short = 'u', long = "vus", default_value_t = 0)]
    pub vus: u32,

    /// Free-form extra parameters passed to k6
    #[arg(short = 'K', long = "k6-params", default_value = "", allow_hyphen_values = true)]
    pub k6_params: String,

    /// Resource manifests to deploy, in order (paths or URIs)
    #[arg(value_name = "RESOURCE")]
    pub resources: Vec<String>,
}

/// Operational settings from the environment (MESHBENCH_* variables)
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_control_plane_namespace")]
    pub control_plane_namespace: String,

    #[serde(default = "default_profile")]
    pub profile: String,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// 0 disables the bound and the readiness gate blocks indefinitely
    #[serde(default = "default_readiness_timeout_secs")]
    pub readiness_timeout_secs: u64,
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_control_plane_namespace() -> String {
    "istio-system".to_string()
}

fn default_profile() -> String {
    "default".to_string()
}

fn default_poll_interval_secs() -> u64 {
    1
}

fn default_readiness_timeout_secs() -> u64 {
    300
}

impl Settings {
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix("MESHBENCH"))
            .build()?;

        let settings: Settings = settings
            .try_deserialize()
            .unwrap_or_else(|_| Settings::default());

        Ok(settings)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            control_plane_namespace: default_control_plane_namespace(),
            profile: default_profile(),
            poll_interval_secs: default_poll_interval_secs(),
            readiness_timeout_secs: default_readiness_timeout_secs(),
        }
    }
}

/// Immutable record of every knob for one run
#[derive(Debug, Clone)]
pub struct RunConfiguration {
    pub config_file: Option<PathBuf>,
    pub keep: bool,
    pub match_path: String,
    pub secure: bool,
    pub connections: u32,
    pub fortio_params: String,
    pub vus: u32,
    pub k6_params: String,
    pub resources: Vec<ResourceRef>,
    pub namespace: String,
    pub control_plane_namespace: String,
    pub profile: String,
    pub poll_interval: Duration,
    /// None means unbounded (baseline behavior)
    pub readiness_timeout: Option<Duration>,
}

impl RunConfiguration {
    /// Fold CLI flags and environment settings into one immutable value
    pub fn resolve(args: Args, settings: Settings) -> Self {
        let connections = args
            .connections
            .unwrap_or_else(|| 4 * num_cpus::get() as u32);

        let resources = if args.resources.is_empty() {
            vec![
                ResourceRef::new(DEFAULT_APP_MANIFEST),
                ResourceRef::new(DEFAULT_GATEWAY_MANIFEST),
            ]
        } else {
            args.resources.iter().map(ResourceRef::new).collect()
        };

        let readiness_timeout = match settings.readiness_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Self {
            config_file: args.config_file,
            keep: args.keep,
            match_path: args.match_path,
            secure: args.secure,
            connections,
            fortio_params: args.fortio_params,
            vus: args.vus,
            k6_params: args.k6_params,
            resources,
            namespace: settings.namespace,
            control_plane_namespace: settings.control_plane_namespace,
            profile: settings.profile,
            poll_interval: Duration::from_secs(settings.poll_interval_secs),
            readiness_timeout,
        }
    }
}
