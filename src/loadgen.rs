//! Load generation against the resolved ingress
//!
//! Two interchangeable backends: fortio keyed on a connection count and k6
//! keyed on a virtual-user count. A level of zero skips that backend
//! entirely; a positive level means one synchronous invocation with the
//! target URL plus the backend's free-form parameter string. Backend
//! failures are independent: both always get their chance to run.

use std::sync::Arc;

use strum::Display;
use tracing::{error, info, instrument};

use crate::command::CommandRunner;
use crate::config::RunConfiguration;
use crate::error::Error;
use crate::k8s::ingress::IngressEndpoint;

/// Fully-qualified URL the backends are pointed at; computed once after
/// readiness and ingress resolution both complete.
pub fn target_url(secure: bool, endpoint: &IngressEndpoint, match_path: &str) -> String {
    let (scheme, port) = if secure {
        ("https", endpoint.secure_port)
    } else {
        ("http", endpoint.plain_port)
    };
    format!("{}://{}:{}{}", scheme, endpoint.host, port, match_path)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum LoadBackend {
    Fortio,
    K6,
}

/// Drives the configured load backends against a target URL
pub struct LoadTestDriver {
    runner: Arc<dyn CommandRunner>,
    connections: u32,
    fortio_params: String,
    vus: u32,
    k6_params: String,
}

impl LoadTestDriver {
    pub fn new(runner: Arc<dyn CommandRunner>, config: &RunConfiguration) -> Self {
        Self {
            runner,
            connections: config.connections,
            fortio_params: config.fortio_params.clone(),
            vus: config.vus,
            k6_params: config.k6_params.clone(),
        }
    }

    /// Run every backend whose load level is above zero. Failures are
    /// collected, not short-circuited, since the backends are independent.
    #[instrument(skip(self))]
    pub async fn run(&self, target: &str) -> Vec<Error> {
        let mut failures = Vec::new();

        if self.connections > 0 {
            let mut args = vec![
                "load".to_string(),
                "-c".to_string(),
                self.connections.to_string(),
            ];
            args.extend(self.fortio_params.split_whitespace().map(String::from));
            args.push(target.to_string());

            if let Err(e) = self.invoke(LoadBackend::Fortio, "fortio", args).await {
                failures.push(e);
            }
        } else {
            info!("Connection level is 0, skipping fortio");
        }

        if self.vus > 0 {
            let mut args = vec![
                "run".to_string(),
                "--vus".to_string(),
                self.vus.to_string(),
            ];
            args.extend(self.k6_params.split_whitespace().map(String::from));
            args.push(target.to_string());

            if let Err(e) = self.invoke(LoadBackend::K6, "k6", args).await {
                failures.push(e);
            }
        } else {
            info!("VU level is 0, skipping k6");
        }

        failures
    }

    async fn invoke(
        &self,
        backend: LoadBackend,
        program: &str,
        args: Vec<String>,
    ) -> Result<(), Error> {
        info!(%backend, "Starting load backend");

        let output = self
            .runner
            .run(program, args)
            .await
            .map_err(|e| Error::load_test(backend.to_string(), e.to_string()))?;

        if output.success {
            info!(%backend, "Load backend finished");
            Ok(())
        } else {
            error!(%backend, "Load backend failed: {}", output.failure_detail());
            Err(Error::load_test(
                backend.to_string(),
                output.failure_detail(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{failed_output, ok_output, MockCommandRunner};
    use crate::config::{Args, Settings, RunConfiguration};
    use clap::Parser;
    use mockall::predicate::*;

    fn config_with_levels(connections: u32, vus: u32) -> RunConfiguration {
        let args = Args::try_parse_from([
            "meshbench",
            "-c",
            &connections.to_string(),
            "-u",
            &vus.to_string(),
        ])
        .unwrap();
        RunConfiguration::resolve(args, Settings::default())
    }

    fn endpoint() -> IngressEndpoint {
        IngressEndpoint {
            host: "1.2.3.4".to_string(),
            plain_port: 80,
            secure_port: 443,
        }
    }

    #[test]
    fn test_target_url_plain_scheme() {
        assert_eq!(
            target_url(false, &endpoint(), "/foo"),
            "http://1.2.3.4:80/foo"
        );
    }

    #[test]
    fn test_target_url_secure_scheme() {
        assert_eq!(
            target_url(true, &endpoint(), "/foo"),
            "https://1.2.3.4:443/foo"
        );
    }

    #[test]
    fn test_target_url_empty_match_path() {
        assert_eq!(target_url(false, &endpoint(), ""), "http://1.2.3.4:80");
    }

    #[tokio::test]
    async fn test_both_levels_zero_means_zero_invocations() {
        // Mock with no expectations: any run() call panics
        let runner = MockCommandRunner::new();
        let driver = LoadTestDriver::new(Arc::new(runner), &config_with_levels(0, 0));

        let failures = driver.run("http://1.2.3.4:80").await;
        assert!(failures.is_empty());
    }

    #[tokio::test]
    async fn test_connections_only_invokes_fortio_exactly_once() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .with(
                eq("fortio"),
                eq(vec![
                    "load".to_string(),
                    "-c".to_string(),
                    "8".to_string(),
                    "http://1.2.3.4:80".to_string(),
                ]),
            )
            .times(1)
            .returning(|_, _| Ok(ok_output()));

        let driver = LoadTestDriver::new(Arc::new(runner), &config_with_levels(8, 0));
        let failures = driver.run("http://1.2.3.4:80").await;
        assert!(failures.is_empty());
    }

    #[tokio::test]
    async fn test_vus_only_invokes_k6_exactly_once() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .with(
                eq("k6"),
                eq(vec![
                    "run".to_string(),
                    "--vus".to_string(),
                    "25".to_string(),
                    "http://1.2.3.4:80".to_string(),
                ]),
            )
            .times(1)
            .returning(|_, _| Ok(ok_output()));

        let driver = LoadTestDriver::new(Arc::new(runner), &config_with_levels(0, 25));
        let failures = driver.run("http://1.2.3.4:80").await;
        assert!(failures.is_empty());
    }

    #[tokio::test]
    async fn test_free_form_params_are_spliced_before_the_url() {
        let args = Args::try_parse_from([
            "meshbench", "-c", "4", "-u", "0", "-F", "-qps 100 -t 30s",
        ])
        .unwrap();
        let config = RunConfiguration::resolve(args, Settings::default());

        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .with(
                eq("fortio"),
                eq(vec![
                    "load".to_string(),
                    "-c".to_string(),
                    "4".to_string(),
                    "-qps".to_string(),
                    "100".to_string(),
                    "-t".to_string(),
                    "30s".to_string(),
                    "http://1.2.3.4:80".to_string(),
                ]),
            )
            .times(1)
            .returning(|_, _| Ok(ok_output()));

        let driver = LoadTestDriver::new(Arc::new(runner), &config);
        let failures = driver.run("http://1.2.3.4:80").await;
        assert!(failures.is_empty());
    }

    #[tokio::test]
    async fn test_fortio_failure_does_not_stop_k6() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .with(eq("fortio"), always())
            .times(1)
            .returning(|_, _| Ok(failed_output("connection refused")));
        runner
            .expect_run()
            .with(eq("k6"), always())
            .times(1)
            .returning(|_, _| Ok(ok_output()));

        let driver = LoadTestDriver::new(Arc::new(runner), &config_with_levels(4, 10));
        let failures = driver.run("http://1.2.3.4:80").await;

        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0], Error::LoadTest { .. }));
        assert!(failures[0].to_string().contains("fortio"));
    }
}
