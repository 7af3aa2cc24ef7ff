use std::sync::Arc;
use std::time::Duration;

use diesel::{
    pg::PgConnection,
    r2d2::{ConnectionManager, PooledConnection},
};

use crate::{
    auth::jwt::JwtService,
    config::AppConfig,
    db::PgPool,
    error::{AppError, AppResult, BatesResult},
    storage::ObjectStorage,
};

type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn ObjectStorage>,
    pub jwt: JwtService,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        config: AppConfig,
        storage: Arc<dyn ObjectStorage>,
        jwt: JwtService,
    ) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            storage,
            jwt,
        }
    }

    pub fn db(&self) -> AppResult<PgPooledConnection> {
        self.pool
            .get()
            .map_err(|err| AppError::internal(format!("database pool error: {err}")))
    }

    /// Checks out a connection and runs one engine operation on it.
    pub fn run<T>(
        &self,
        operation: impl FnOnce(&mut PgConnection) -> BatesResult<T>,
    ) -> AppResult<T> {
        let mut conn = self.db()?;
        operation(&mut *conn).map_err(AppError::from)
    }

    /// Like [`AppState::run`], but on the blocking pool. For operations that
    /// wait on a row lock.
    pub async fn run_blocking<T, F>(&self, operation: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> BatesResult<T> + Send + 'static,
    {
        let state = self.clone();
        tokio::task::spawn_blocking(move || state.run(operation))
            .await
            .map_err(|err| AppError::internal(format!("database task failed: {err}")))?
    }

    pub fn allocation_timeout(&self) -> Duration {
        self.config.allocation_timeout
    }
}
