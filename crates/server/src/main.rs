use anyhow::Context;
use deployment::Deployment;
use server::{DeploymentImpl, app};
use services::services::config::{Config, LogFormat};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use utils::sentry::{init_once, sentry_layer};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,server=debug,services=debug,tower_http=info".into());
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(sentry_layer());
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid configuration")?;
    let _sentry = init_once(config.sentry_dsn.as_deref());
    init_tracing(config.log_format);

    let address = config.bind_address();
    let deployment = DeploymentImpl::new(config)
        .await
        .context("failed to start deployment")?;
    deployment
        .validate_database()
        .await
        .context("database is not ready")?;

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    tracing::info!(%address, "Coaching server listening");

    axum::serve(listener, app(deployment))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}
