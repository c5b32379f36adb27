use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use meshbench::{
    command::ShellRunner,
    config::{Args, RunConfiguration, Settings},
    k8s::K8sClient,
    Orchestrator,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting meshbench");

    let args = Args::parse();
    let settings = Settings::load()?;
    let config = RunConfiguration::resolve(args, settings);
    tracing::info!(
        namespace = %config.namespace,
        resources = config.resources.len(),
        connections = config.connections,
        vus = config.vus,
        "Configuration resolved"
    );

    let cluster = K8sClient::new().await?;
    let orchestrator = Orchestrator::new(config, Arc::new(ShellRunner::new()), Arc::new(cluster));

    if let Err(e) = orchestrator.run().await {
        tracing::error!("{}", e);
        std::process::exit(e.exit_code());
    }

    Ok(())
}
