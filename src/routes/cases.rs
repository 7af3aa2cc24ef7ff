use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::documents::{to_iso, DocumentResponse};
use super::productions::ProductionEntryResponse;
use crate::cases::{self, CaseUpdate};
use crate::error::{AppError, AppResult};
use crate::models::Case;
use crate::state::AppState;
use crate::utils::json::classify_string_update;

#[derive(Deserialize)]
pub struct CreateCaseRequest {
    pub name: String,
    pub bates_prefix: Option<String>,
}

#[derive(Serialize)]
pub struct CaseResponse {
    pub id: Uuid,
    pub name: String,
    pub bates_prefix: Option<String>,
    pub current_bates_number: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Case> for CaseResponse {
    fn from(case: Case) -> Self {
        Self {
            id: case.id,
            name: case.name,
            bates_prefix: case.bates_prefix,
            current_bates_number: case.current_bates_number,
            created_at: to_iso(case.created_at),
            updated_at: to_iso(case.updated_at),
        }
    }
}

#[derive(Deserialize)]
pub struct LookupQuery {
    pub label: String,
}

#[derive(Serialize)]
pub struct BatesLookupResponse {
    pub label: String,
    pub prefix: String,
    pub number: i64,
    pub document: Option<DocumentResponse>,
    pub production_entries: Vec<ProductionEntryResponse>,
}

pub async fn create_case(
    State(state): State<AppState>,
    Json(payload): Json<CreateCaseRequest>,
) -> AppResult<(StatusCode, Json<CaseResponse>)> {
    let prefix = payload.bates_prefix.filter(|value| !value.trim().is_empty());
    let case = state.run(|conn| cases::create_case(conn, &payload.name, prefix))?;
    Ok((StatusCode::CREATED, Json(case.into())))
}

pub async fn get_case(
    State(state): State<AppState>,
    Path(case_id): Path<Uuid>,
) -> AppResult<Json<CaseResponse>> {
    let case = state.run(|conn| cases::load_case(conn, case_id))?;
    Ok(Json(case.into()))
}

/// `bates_prefix: null` clears the prefix; omitting it leaves it unchanged.
pub async fn update_case(
    State(state): State<AppState>,
    Path(case_id): Path<Uuid>,
    Json(payload): Json<Value>,
) -> AppResult<Json<CaseResponse>> {
    let name = match payload.get("name") {
        None | Some(Value::Null) => None,
        Some(Value::String(name)) => Some(name.clone()),
        Some(_) => return Err(AppError::bad_request("name must be a string")),
    };
    let bates_prefix = classify_string_update("bates_prefix", payload.get("bates_prefix"))
        .map_err(AppError::bad_request)?;

    let update = CaseUpdate { name, bates_prefix };
    let case = state
        .run_blocking(move |conn| cases::update_case(conn, case_id, update))
        .await?;
    Ok(Json(case.into()))
}

pub async fn list_case_documents(
    State(state): State<AppState>,
    Path(case_id): Path<Uuid>,
) -> AppResult<Json<Vec<DocumentResponse>>> {
    let documents = state.run(|conn| cases::list_documents(conn, case_id))?;
    Ok(Json(documents.into_iter().map(Into::into).collect()))
}

pub async fn lookup_bates(
    State(state): State<AppState>,
    Path(case_id): Path<Uuid>,
    Query(query): Query<LookupQuery>,
) -> AppResult<Json<BatesLookupResponse>> {
    let label = query.label.trim().to_string();
    let lookup = state.run(|conn| cases::lookup_label(conn, case_id, &label))?;

    Ok(Json(BatesLookupResponse {
        label,
        prefix: lookup.prefix,
        number: lookup.number,
        document: lookup.document.map(Into::into),
        production_entries: lookup
            .production_entries
            .into_iter()
            .map(Into::into)
            .collect(),
    }))
}
