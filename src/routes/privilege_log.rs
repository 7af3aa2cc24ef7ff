use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::productions::ProductionSetResponse;
use crate::error::AppResult;
use crate::privilege_log::{self, LogFormat, PrivilegeLogOutput, PrivilegeLogRow};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct PrivilegeLogQuery {
    pub format: Option<String>,
}

#[derive(Serialize)]
pub struct PrivilegeLogResponse {
    pub production_set: ProductionSetResponse,
    pub entries: Vec<PrivilegeLogRow>,
}

pub async fn get_privilege_log(
    State(state): State<AppState>,
    Path(production_set_id): Path<Uuid>,
    Query(query): Query<PrivilegeLogQuery>,
) -> AppResult<Response> {
    let format = match query.format.as_deref() {
        Some(value) => value.parse::<LogFormat>()?,
        None => LogFormat::default(),
    };
    let output = state.run(|conn| privilege_log::generate(conn, production_set_id, format))?;

    match output {
        PrivilegeLogOutput::Json(log) => {
            info!(%production_set_id, rows = log.rows.len(), "rendered privilege log");
            Ok(Json(PrivilegeLogResponse {
                production_set: log.production_set.into(),
                entries: log.rows,
            })
            .into_response())
        }
        PrivilegeLogOutput::Csv { filename, body } => {
            info!(%production_set_id, bytes = body.len(), "exported privilege log csv");
            Ok((
                [
                    (header::CONTENT_TYPE, "text/csv".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{filename}\""),
                    ),
                ],
                body,
            )
                .into_response())
        }
    }
}
