use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::documents::to_iso;
use crate::error::AppResult;
use crate::models::{ProductionDocument, ProductionSet};
use crate::productions::{self, NewProduction};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateProductionRequest {
    pub name: String,
    pub recipient: String,
    pub produced_date: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct AddDocumentsRequest {
    pub document_ids: Vec<Uuid>,
    pub bates_prefix: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdatePrivilegeRequest {
    pub is_privileged: bool,
    pub privilege_reason: Option<String>,
}

#[derive(Serialize)]
pub struct ProductionSetResponse {
    pub id: Uuid,
    pub case_id: Uuid,
    pub name: String,
    pub recipient: String,
    pub produced_date: NaiveDate,
    pub bates_prefix: Option<String>,
    pub current_bates_number: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ProductionSet> for ProductionSetResponse {
    fn from(set: ProductionSet) -> Self {
        Self {
            id: set.id,
            case_id: set.case_id,
            name: set.name,
            recipient: set.recipient,
            produced_date: set.produced_date,
            bates_prefix: set.bates_prefix,
            current_bates_number: set.current_bates_number,
            created_at: to_iso(set.created_at),
            updated_at: to_iso(set.updated_at),
        }
    }
}

#[derive(Serialize)]
pub struct ProductionEntryResponse {
    pub id: Uuid,
    pub production_set_id: Uuid,
    pub document_id: Uuid,
    pub bates_number: Option<String>,
    pub is_privileged: bool,
    pub privilege_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ProductionDocument> for ProductionEntryResponse {
    fn from(entry: ProductionDocument) -> Self {
        Self {
            id: entry.id,
            production_set_id: entry.production_set_id,
            document_id: entry.document_id,
            bates_number: entry.bates_number,
            is_privileged: entry.is_privileged,
            privilege_reason: entry.privilege_reason,
            created_at: to_iso(entry.created_at),
            updated_at: to_iso(entry.updated_at),
        }
    }
}

#[derive(Serialize)]
pub struct ProductionDetailResponse {
    #[serde(flatten)]
    pub production_set: ProductionSetResponse,
    pub entries: Vec<ProductionEntryResponse>,
}

pub async fn list_productions(
    State(state): State<AppState>,
    Path(case_id): Path<Uuid>,
) -> AppResult<Json<Vec<ProductionSetResponse>>> {
    let sets = state.run(|conn| productions::list_production_sets(conn, case_id))?;
    Ok(Json(sets.into_iter().map(Into::into).collect()))
}

/// `produced_date` defaults to today (UTC).
pub async fn create_production(
    State(state): State<AppState>,
    Path(case_id): Path<Uuid>,
    Json(payload): Json<CreateProductionRequest>,
) -> AppResult<(StatusCode, Json<ProductionSetResponse>)> {
    let production = NewProduction {
        case_id,
        name: payload.name,
        recipient: payload.recipient,
        produced_date: payload
            .produced_date
            .unwrap_or_else(|| Utc::now().date_naive()),
    };
    let set = state.run(|conn| productions::create_production_set(conn, production))?;
    Ok((StatusCode::CREATED, Json(set.into())))
}

pub async fn get_production(
    State(state): State<AppState>,
    Path(production_set_id): Path<Uuid>,
) -> AppResult<Json<ProductionDetailResponse>> {
    let (set, entries) = state.run(|conn| {
        let set = productions::load_production_set(conn, production_set_id)?;
        let entries = productions::load_entries(conn, production_set_id)?;
        Ok((set, entries))
    })?;

    Ok(Json(ProductionDetailResponse {
        production_set: set.into(),
        entries: entries.into_iter().map(Into::into).collect(),
    }))
}

pub async fn add_documents(
    State(state): State<AppState>,
    Path(production_set_id): Path<Uuid>,
    Json(payload): Json<AddDocumentsRequest>,
) -> AppResult<(StatusCode, Json<Vec<ProductionEntryResponse>>)> {
    let prefix = payload
        .bates_prefix
        .filter(|value| !value.trim().is_empty());
    let timeout = state.allocation_timeout();
    let document_ids = payload.document_ids;
    let entries = state
        .run_blocking(move |conn| {
            productions::add_documents(
                conn,
                production_set_id,
                &document_ids,
                prefix.as_deref(),
                timeout,
            )
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(entries.into_iter().map(Into::into).collect()),
    ))
}

pub async fn update_entry_privilege(
    State(state): State<AppState>,
    Path((production_set_id, entry_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdatePrivilegeRequest>,
) -> AppResult<Json<ProductionEntryResponse>> {
    let entry = state.run(|conn| {
        productions::update_privilege(
            conn,
            production_set_id,
            entry_id,
            payload.is_privileged,
            payload.privilege_reason,
        )
    })?;
    Ok(Json(entry.into()))
}
