use std::str::FromStr;

use diesel::prelude::*;
use diesel::PgConnection;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::error::{BatesError, BatesResult};
use crate::models::{Document, PrivilegeLogEntry, ProductionDocument, ProductionSet};
use crate::productions::load_production_set;
use crate::schema::{documents, privilege_log_entries, production_documents};

pub const NOT_AVAILABLE: &str = "N/A";
pub const DEFAULT_PRIVILEGE_CLAIMED: &str = "Attorney-Client Privilege";
pub const RECIPIENT_SEPARATOR: &str = "; ";

pub const PRIVILEGE_LOG_COLUMNS: [&str; 8] = [
    "batesNumber",
    "documentDate",
    "author",
    "recipients",
    "documentType",
    "privilegeClaimed",
    "basis",
    "description",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Csv,
    Pdf,
}

impl FromStr for LogFormat {
    type Err = BatesError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "pdf" => Ok(Self::Pdf),
            other => Err(BatesError::invalid(format!(
                "unsupported privilege log format '{other}'. Supported formats: json, csv, pdf"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivilegeLogRow {
    pub bates_number: String,
    pub document_date: String,
    pub author: String,
    pub recipients: Vec<String>,
    pub document_type: String,
    pub privilege_claimed: String,
    pub basis: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct PrivilegeLog {
    pub production_set: ProductionSet,
    pub rows: Vec<PrivilegeLogRow>,
}

#[derive(Debug, Clone)]
pub enum PrivilegeLogOutput {
    Json(PrivilegeLog),
    Csv { filename: String, body: Vec<u8> },
}

fn first_present<T>(candidates: impl IntoIterator<Item = Option<T>>) -> Option<T> {
    candidates.into_iter().flatten().next()
}

fn parse_recipients(document_id: Uuid, raw: &Value) -> Vec<String> {
    match raw {
        Value::Null => Vec::new(),
        Value::Array(items) => {
            let parsed: Option<Vec<String>> = items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect();
            parsed.unwrap_or_else(|| {
                warn!(%document_id, "privilege log recipients contain non-string values");
                Vec::new()
            })
        }
        other => {
            warn!(%document_id, recipients = %other, "privilege log recipients are not a list");
            Vec::new()
        }
    }
}

/// Builds one log row, resolving every field through its fallback chain.
pub fn build_row(
    entry: &ProductionDocument,
    document: &Document,
    log: Option<&PrivilegeLogEntry>,
) -> PrivilegeLogRow {
    let date_from_log = log
        .and_then(|log| log.document_date)
        .map(|date| date.format("%Y-%m-%d").to_string());
    let upload_date = Some(document.uploaded_at.date().format("%Y-%m-%d").to_string());

    PrivilegeLogRow {
        bates_number: entry
            .bates_number
            .clone()
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        document_date: first_present([date_from_log, upload_date])
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        author: first_present([log.and_then(|log| log.author.clone())])
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        recipients: log
            .map(|log| parse_recipients(document.id, &log.recipients))
            .unwrap_or_default(),
        document_type: first_present([
            log.and_then(|log| log.document_type.clone()),
            Some(document.name.clone()),
        ])
        .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        privilege_claimed: first_present([log.and_then(|log| log.privilege_type.clone())])
            .unwrap_or_else(|| DEFAULT_PRIVILEGE_CLAIMED.to_string()),
        basis: first_present([
            log.and_then(|log| log.basis.clone()),
            entry.privilege_reason.clone(),
        ])
        .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        description: first_present([
            log.and_then(|log| log.description.clone()),
            Some(document.name.clone()).filter(|name| !name.is_empty()),
        ])
        .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
    }
}

pub fn load_rows(
    conn: &mut PgConnection,
    production_set_id: Uuid,
) -> BatesResult<Vec<PrivilegeLogRow>> {
    let joined: Vec<(ProductionDocument, Document, Option<PrivilegeLogEntry>)> =
        production_documents::table
            .inner_join(documents::table)
            .left_join(
                privilege_log_entries::table
                    .on(privilege_log_entries::document_id.eq(documents::id)),
            )
            .filter(production_documents::production_set_id.eq(production_set_id))
            .filter(production_documents::is_privileged.eq(true))
            .order((
                production_documents::bates_sequence.asc(),
                production_documents::created_at.asc(),
                production_documents::id.asc(),
            ))
            .load(conn)?;

    Ok(joined
        .iter()
        .map(|(entry, document, log)| build_row(entry, document, log.as_ref()))
        .collect())
}

pub fn render_csv(rows: &[PrivilegeLogRow]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(PRIVILEGE_LOG_COLUMNS)?;
    for row in rows {
        let recipients = row.recipients.join(RECIPIENT_SEPARATOR);
        writer.write_record([
            row.bates_number.as_str(),
            row.document_date.as_str(),
            row.author.as_str(),
            recipients.as_str(),
            row.document_type.as_str(),
            row.privilege_claimed.as_str(),
            row.basis.as_str(),
            row.description.as_str(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))
}

pub fn csv_filename(production_set_id: Uuid) -> String {
    format!("privilege-log-{production_set_id}.csv")
}

/// Read-only: renders the privilege log of a production in `format`.
pub fn generate(
    conn: &mut PgConnection,
    production_set_id: Uuid,
    format: LogFormat,
) -> BatesResult<PrivilegeLogOutput> {
    let production_set = load_production_set(conn, production_set_id)?;

    match format {
        LogFormat::Pdf => Err(BatesError::NotImplemented(
            "pdf privilege log export".to_string(),
        )),
        LogFormat::Json => {
            let rows = load_rows(conn, production_set_id)?;
            Ok(PrivilegeLogOutput::Json(PrivilegeLog {
                production_set,
                rows,
            }))
        }
        LogFormat::Csv => {
            let rows = load_rows(conn, production_set_id)?;
            let body = render_csv(&rows)?;
            Ok(PrivilegeLogOutput::Csv {
                filename: csv_filename(production_set_id),
                body,
            })
        }
    }
}
