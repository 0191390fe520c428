use std::sync::Arc;

use broker_core::{BrokerConfig, LogFormat};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use broker::app::BrokerApp;
use broker::{election, failure_detector, http, membership};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = BrokerConfig::parse();
    init_tracing(config.log_format);
    config.validate()?;

    let bind_addr = config.bind_addr();
    let (app, background) = BrokerApp::build(config).await?;
    let app = Arc::new(app);

    tokio::spawn(background.retry_worker.run());
    tokio::spawn(failure_detector::run_probe_loop(
        app.failure_detector.clone(),
        app.peer_client.clone(),
        app.registry_client.clone(),
        app.config.heartbeat_interval(),
        app.config.probe_timeout(),
    ));
    tokio::spawn(membership::run_poll_loop(app.membership.clone(), app.config.membership_interval()));
    tokio::spawn(election::run_election_loop(app.election.clone(), app.config.heartbeat_interval()));

    let router = http::router(app.clone());

    tracing::info!(broker_id = app.config.broker_id, %bind_addr, "broker listening");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::from_default_env();
    match format {
        LogFormat::Pretty => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
        LogFormat::Json => {
            tracing_subscriber::fmt().json().with_env_filter(filter).init();
        }
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
