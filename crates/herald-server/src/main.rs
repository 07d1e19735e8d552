mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing::info;

use herald_api::AppStateInner;
use herald_db::{Database, NotificationStore, SqliteStore};
use herald_dispatch::{DispatchStats, HttpPushGateway, Pipeline};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "herald=debug,herald_api=debug,herald_dispatch=debug,herald_db=info,tower_http=debug"
                    .into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    let db = Database::open(&config.db_path)?;
    let store: Arc<dyn NotificationStore> = Arc::new(SqliteStore::new(db));
    let gateway = Arc::new(HttpPushGateway::new(&config.auth_file)?);
    let stats = Arc::new(DispatchStats::new());

    let pipeline = Pipeline::start(config.pipeline(), store.clone(), gateway, stats);

    let state = Arc::new(AppStateInner {
        store,
        auth_token: config.auth_token.clone(),
        insert_retry: config.insert_retry(),
    });

    let app = herald_api::router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Herald listening on {}", addr);
    info!(
        "Retention: {} hours, daily at {}",
        config.retention_window.as_secs() / 3600,
        config.retention_run_at
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Ingress is closed; drain queued notifications before exiting
    pipeline.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
