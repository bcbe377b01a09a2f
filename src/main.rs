use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use connecthub::auth::{SessionStore, SqliteSessionStore};
use connecthub::config::{Cli, Config};
use connecthub::state::AppState;
use connecthub::{db, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Initialize database
    let pool = db::create_pool(&config.db_path(), &config.database)?;
    db::run_migrations(&pool)?;

    let sessions: Arc<dyn SessionStore> =
        Arc::new(SqliteSessionStore::new(pool.clone(), config.auth.session_ttl()));
    spawn_session_sweeper(
        sessions.clone(),
        Duration::from_secs(config.auth.purge_interval_secs.max(1)),
    );

    let state = AppState {
        db: pool,
        config: config.clone(),
        sessions,
    };
    let app = routes::app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically drop expired sessions so stale tokens do not linger in the table.
fn spawn_session_sweeper(sessions: Arc<dyn SessionStore>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match sessions.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => tracing::info!(purged, "Expired sessions removed"),
                Err(e) => tracing::warn!("Session sweep failed: {}", e),
            }
        }
    });
}
