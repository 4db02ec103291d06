//! Dev-session gateway binary.

use std::net::SocketAddr;
use std::sync::Arc;

use dev_sessions_core::SlugGenerator;
use dev_sessions_gateway::GatewayService;
use dev_sessions_remote::{SshConfig, SshTmuxExecutor};
use dev_sessions_server::config::Config;
use dev_sessions_server::http;
use dev_sessions_store::SqliteStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .init();

    dotenvy::dotenv().ok();

    if let Err(err) = run().await {
        tracing::error!(error = %err, "gateway failed to start");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    let store = SqliteStore::open(&config.database_path).await?;
    let ssh = SshConfig::new(&config.ssh_host, &config.ssh_user, config.ssh_port);
    let remote = SshTmuxExecutor::new(&ssh);
    let gateway = Arc::new(GatewayService::new(
        store,
        remote,
        Box::new(SlugGenerator),
        config.max_sessions_per_creator,
    ));

    tracing::info!(
        ssh_target = %format!("{}@{}:{}", config.ssh_user, config.ssh_host, config.ssh_port),
        database = %config.database_path.display(),
        "dev-session gateway starting"
    );

    // Reconcile the registry before accepting traffic.
    match gateway.prune_dead_sessions().await {
        Ok(0) => tracing::info!("no stale sessions found"),
        Ok(pruned) => tracing::info!(pruned, "deleted stale sessions"),
        Err(err) => tracing::warn!(error = %err, "startup prune failed"),
    }

    let app = http::build_router(Arc::clone(&gateway));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutting down");
    gateway.close().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => tracing::error!(error = %err, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
