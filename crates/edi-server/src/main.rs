use std::net::SocketAddr;

use clap::Parser;
use edi_adapter_db::{DbConnection, edi_schema};
use edi_server::{AppState, Config, router, telemetry};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    telemetry::init_tracing(&config)?;

    let db = DbConnection::with_config(config.database.connection_config());
    db.connect().await?;
    db.apply_schema(&edi_schema()).await?;

    let state = AppState::new(db.clone(), &config.app_name, &config.resilience);
    let app = router(state);

    let listener = TcpListener::bind(config.bind_address()?).await?;
    info!(
        address = %listener.local_addr()?,
        service = %config.app_name,
        environment = %config.environment,
        "listening"
    );

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c, running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
