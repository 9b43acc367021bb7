use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use enigma_portal::api::rate_limit::spawn_cleanup_task;
use enigma_portal::config::Config;
use enigma_portal::db;
use enigma_portal::AppState;

#[derive(Parser, Debug)]
#[command(name = "enigma-portal")]
#[command(author, version, about = "Enigma RP community portal: accounts, organizations and recruitment", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "enigma.toml", env = "ENIGMA_CONFIG")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = cli.log_level.clone();
    let config = Config::load(&cli.config)?;

    // RUST_LOG wins over the flag, the flag over the config file
    let log_level = log_level.unwrap_or_else(|| config.logging.level.clone());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Enigma Portal v{}", env!("CARGO_PKG_VERSION"));

    let pool = db::init(&config.database).await?;

    db::seed_admin_user(&pool, &config.auth).await?;
    db::seed_organizations(&pool).await?;

    let state = Arc::new(AppState::new(config.clone(), pool));

    if config.rate_limit.enabled {
        spawn_cleanup_task(state.rate_limiter.clone(), config.rate_limit.cleanup_interval);
    }

    let mut app = enigma_portal::api::create_router(state);

    // SPA files with index.html fallback, after the API routes
    if let Some(static_dir) = &config.server.static_dir {
        let index_file = static_dir.join("index.html");
        tracing::info!("Serving static files from {}", static_dir.display());
        app = app.fallback_service(ServeDir::new(static_dir).not_found_service(ServeFile::new(index_file)));
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("API server listening on http://{}", addr);
    tracing::info!("Accepting requests from {}", config.server.frontend_url);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
