use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use tokio::net::TcpListener;
use tower::make::Shared;
use tracing_subscriber::EnvFilter;

use bates_backend::auth::jwt::JwtService;
use bates_backend::config::AppConfig;
use bates_backend::db;
use bates_backend::routes;
use bates_backend::state::AppState;
use bates_backend::storage::S3Storage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "server",
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        server_host = %config.server_host,
        server_port = config.server_port,
        s3_bucket = %config.s3_bucket,
        page_count_strategy = ?config.page_count_strategy,
        page_size_bytes = config.page_size_bytes,
        allocation_timeout_ms = config.allocation_timeout.as_millis() as u64,
        "loaded backend configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    {
        let pool = pool.clone();
        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get migration connection: {err}"))?;
            db::run_migrations(&mut conn)
        })
        .await
        .context("migration task panicked")??;
    }
    tracing::info!("database migrations applied");

    let storage = Arc::new(S3Storage::from_config(&config).await?);
    let jwt = JwtService::from_config(&config)?;
    let listen_addr: SocketAddr =
        format!("{}:{}", config.server_host, config.server_port).parse()?;

    let state = AppState::new(pool, config, storage, jwt);
    let router = routes::create_router(state)?;

    let listener = TcpListener::bind(listen_addr).await?;
    tracing::info!("listening on {}", listen_addr);

    axum::serve(listener, Shared::new(router)).await?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
