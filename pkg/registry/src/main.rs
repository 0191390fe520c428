use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use broker_registry::{router, RegistryState};

#[derive(Debug, Parser)]
#[command(name = "broker-registry", about = "Reference registry for the broker cluster")]
struct Args {
    #[arg(long, env = "REGISTRY_HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "REGISTRY_PORT", default_value_t = 4000)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let addr = format!("{}:{}", args.host, args.port);

    let app = router(RegistryState::new()).layer(TraceLayer::new_for_http());

    tracing::info!(%addr, "registry listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
