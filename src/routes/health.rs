use axum::{extract::State, http::StatusCode, response::Json};
use diesel::connection::SimpleConnection;
use serde_json::{json, Value};
use tracing::warn;

use crate::state::AppState;

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let database = state
        .db()
        .ok()
        .and_then(|mut conn| conn.batch_execute("SELECT 1").ok());

    match database {
        Some(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        None => {
            warn!("health check could not reach the database");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "database": "unreachable" })),
            )
        }
    }
}
