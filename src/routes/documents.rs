use axum::extract::{Json, Multipart, Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::cases::load_case;
use crate::error::{AppError, AppResult};
use crate::intake::{estimate_page_count, register_document, IntakeRequest};
use crate::models::{Document, PrivilegeLogEntry};
use crate::privilege_entries::{load_log_entry, upsert_log_entry, LogEntryInput};
use crate::schema::documents;
use crate::state::AppState;
use crate::storage::document_key;

#[derive(Serialize)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub case_id: Uuid,
    pub name: String,
    pub mime_type: Option<String>,
    pub file_size: i64,
    pub checksum: String,
    pub page_count: i32,
    pub bates_start: Option<String>,
    pub bates_end: Option<String>,
    pub uploaded_at: String,
    pub updated_at: String,
    pub deleted_at: Option<String>,
}

impl From<Document> for DocumentResponse {
    fn from(document: Document) -> Self {
        Self {
            id: document.id,
            case_id: document.case_id,
            name: document.name,
            mime_type: document.mime_type,
            file_size: document.file_size,
            checksum: document.checksum,
            page_count: document.page_count,
            bates_start: document.bates_start,
            bates_end: document.bates_end,
            uploaded_at: to_iso(document.uploaded_at),
            updated_at: to_iso(document.updated_at),
            deleted_at: document.deleted_at.map(to_iso),
        }
    }
}

#[derive(Serialize)]
pub struct PrivilegeLogEntryResponse {
    pub document_id: Uuid,
    pub document_date: Option<NaiveDate>,
    pub author: Option<String>,
    pub recipients: serde_json::Value,
    pub document_type: Option<String>,
    pub privilege_type: Option<String>,
    pub basis: Option<String>,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<PrivilegeLogEntry> for PrivilegeLogEntryResponse {
    fn from(entry: PrivilegeLogEntry) -> Self {
        Self {
            document_id: entry.document_id,
            document_date: entry.document_date,
            author: entry.author,
            recipients: entry.recipients,
            document_type: entry.document_type,
            privilege_type: entry.privilege_type,
            basis: entry.basis,
            description: entry.description,
            created_at: to_iso(entry.created_at),
            updated_at: to_iso(entry.updated_at),
        }
    }
}

#[derive(Deserialize)]
pub struct PrivilegeLogEntryRequest {
    pub document_date: Option<NaiveDate>,
    pub author: Option<String>,
    #[serde(default)]
    pub recipients: Vec<String>,
    pub document_type: Option<String>,
    pub privilege_type: Option<String>,
    pub basis: Option<String>,
    pub description: Option<String>,
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "on"
    )
}

fn guess_mime(file_name: &str, declared: Option<String>) -> Option<String> {
    declared
        .filter(|value| !value.is_empty() && value != "application/octet-stream")
        .or_else(|| {
            mime_guess::from_path(file_name)
                .first()
                .map(|mime| mime.essence_str().to_string())
        })
}

/// Multipart intake: stores the blob, then registers the document and its
/// Bates range in one transaction. The blob is removed again when the
/// transaction fails.
pub async fn upload_document(
    State(state): State<AppState>,
    Path(case_id): Path<Uuid>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DocumentResponse>)> {
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut content_type: Option<String> = None;
    let mut auto_bates = false;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        error!(error = %err, "invalid multipart data");
        AppError::bad_request(format!("invalid multipart data: {err}"))
    })? {
        match field.name() {
            Some("file") => {
                file_name = field.file_name().map(|name| name.to_string());
                content_type = field.content_type().map(|mime| mime.to_string());
                let data = field.bytes().await.map_err(|err| {
                    error!(error = %err, "failed to read file bytes");
                    AppError::bad_request(format!("failed to read file bytes: {err}"))
                })?;
                file_bytes = Some(data.to_vec());
            }
            Some("auto_bates") => {
                let value = field.text().await.map_err(|err| {
                    AppError::bad_request(format!("invalid auto_bates field: {err}"))
                })?;
                auto_bates = parse_flag(&value);
            }
            _ => {}
        }
    }

    let bytes = file_bytes.ok_or_else(|| AppError::bad_request("file field is required"))?;
    if bytes.is_empty() {
        return Err(AppError::bad_request("file field must not be empty"));
    }
    let name = file_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| AppError::bad_request("filename is required"))?;

    state.run(|conn| load_case(conn, case_id))?;

    let mime_type = guess_mime(&name, content_type);
    let strategy = state.config.page_count_strategy;
    let page_size_bytes = state.config.page_size_bytes;
    let mime_for_count = mime_type.clone();
    // PDFium parses the whole upload, so counting stays off the async workers.
    let (bytes, page_count) = tokio::task::spawn_blocking(move || {
        let pages =
            estimate_page_count(strategy, &bytes, mime_for_count.as_deref(), page_size_bytes);
        (bytes, pages)
    })
    .await
    .map_err(|err| AppError::internal(format!("page count task failed: {err}")))?;
    let document_id = Uuid::new_v4();
    let storage_key = document_key(case_id, document_id);
    let request = IntakeRequest {
        document_id,
        case_id,
        name,
        mime_type: mime_type.clone(),
        file_size: bytes.len() as i64,
        checksum: hex::encode(Sha256::digest(&bytes)),
        storage_key: storage_key.clone(),
        page_count,
        auto_bates,
    };

    state
        .storage
        .put_object(&storage_key, bytes, mime_type)
        .await
        .map_err(|err| {
            error!(error = %err, key = %storage_key, "failed to store document");
            AppError::internal(format!("failed to store document: {err}"))
        })?;

    let timeout = state.allocation_timeout();
    match state
        .run_blocking(move |conn| register_document(conn, request, timeout))
        .await
    {
        Ok(document) => {
            info!(
                document_id = %document.id,
                case_id = %case_id,
                pages = document.page_count,
                bates_start = ?document.bates_start,
                "document intake succeeded"
            );
            Ok((StatusCode::CREATED, Json(document.into())))
        }
        Err(err) => {
            error!(error = ?err, case_id = %case_id, "document intake failed");
            if let Err(cleanup) = state.storage.delete_object(&storage_key).await {
                warn!(error = %cleanup, key = %storage_key, "failed to remove orphaned blob");
            }
            Err(err)
        }
    }
}

fn load_live_document(state: &AppState, document_id: Uuid) -> AppResult<Document> {
    let mut conn = state.db()?;
    documents::table
        .find(document_id)
        .filter(documents::deleted_at.is_null())
        .first::<Document>(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)
}

pub async fn get_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
) -> AppResult<Json<DocumentResponse>> {
    let document = load_live_document(&state, document_id)?;
    Ok(Json(document.into()))
}

/// Soft delete. Bates ranges stay on the row and are never handed out again.
pub async fn delete_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;
    let now = Utc::now().naive_utc();
    let updated = diesel::update(
        documents::table
            .find(document_id)
            .filter(documents::deleted_at.is_null()),
    )
    .set((
        documents::deleted_at.eq(Some(now)),
        documents::updated_at.eq(now),
    ))
    .execute(&mut conn)?;

    if updated == 0 {
        return Err(AppError::not_found());
    }
    info!(%document_id, "soft deleted document");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_privilege_log_entry(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
) -> AppResult<Json<PrivilegeLogEntryResponse>> {
    let entry = state.run(|conn| load_log_entry(conn, document_id))?;
    Ok(Json(entry.into()))
}

pub async fn put_privilege_log_entry(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    Json(payload): Json<PrivilegeLogEntryRequest>,
) -> AppResult<Json<PrivilegeLogEntryResponse>> {
    let input = LogEntryInput {
        document_date: payload.document_date,
        author: payload.author,
        recipients: payload.recipients,
        document_type: payload.document_type,
        privilege_type: payload.privilege_type,
        basis: payload.basis,
        description: payload.description,
    };
    let entry = state.run(|conn| upsert_log_entry(conn, document_id, input))?;
    Ok(Json(entry.into()))
}

pub(crate) fn to_iso(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_bates_accepts_common_truthy_values() {
        for value in ["true", "1", "on", " TRUE "] {
            assert!(parse_flag(value), "{value}");
        }
        for value in ["false", "0", "off", "", "yes"] {
            assert!(!parse_flag(value), "{value}");
        }
    }

    #[test]
    fn guesses_mime_from_extension_when_missing() {
        assert_eq!(
            guess_mime("exhibit.pdf", None).as_deref(),
            Some("application/pdf")
        );
        assert_eq!(
            guess_mime("scan.png", Some("application/octet-stream".into())).as_deref(),
            Some("image/png")
        );
        assert_eq!(
            guess_mime("notes.txt", Some("text/markdown".into())).as_deref(),
            Some("text/markdown")
        );
    }
}
