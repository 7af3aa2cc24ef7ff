//! Supplemental privilege metadata kept per document, read by the privilege
//! log when a document is produced as privileged.

use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use diesel::PgConnection;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::error::{BatesError, BatesResult};
use crate::models::{NewPrivilegeLogEntry, PrivilegeLogEntry};
use crate::schema::{documents, privilege_log_entries};

#[derive(Debug, Clone, Default)]
pub struct LogEntryInput {
    pub document_date: Option<NaiveDate>,
    pub author: Option<String>,
    pub recipients: Vec<String>,
    pub document_type: Option<String>,
    pub privilege_type: Option<String>,
    pub basis: Option<String>,
    pub description: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

impl LogEntryInput {
    fn into_record(self, document_id: Uuid) -> NewPrivilegeLogEntry {
        let recipients: Vec<String> = self
            .recipients
            .into_iter()
            .map(|recipient| recipient.trim().to_string())
            .filter(|recipient| !recipient.is_empty())
            .collect();

        NewPrivilegeLogEntry {
            document_id,
            document_date: self.document_date,
            author: non_blank(self.author),
            recipients: Value::from(recipients),
            document_type: non_blank(self.document_type),
            privilege_type: non_blank(self.privilege_type),
            basis: non_blank(self.basis),
            description: non_blank(self.description),
        }
    }
}

pub fn load_log_entry(
    conn: &mut PgConnection,
    document_id: Uuid,
) -> BatesResult<PrivilegeLogEntry> {
    privilege_log_entries::table
        .find(document_id)
        .first(conn)
        .optional()?
        .ok_or(BatesError::NotFound("privilege log entry"))
}

/// Creates or fully replaces the entry for `document_id`.
pub fn upsert_log_entry(
    conn: &mut PgConnection,
    document_id: Uuid,
    input: LogEntryInput,
) -> BatesResult<PrivilegeLogEntry> {
    let document_exists: bool =
        diesel::select(diesel::dsl::exists(documents::table.find(document_id)))
            .get_result(conn)?;
    if !document_exists {
        return Err(BatesError::NotFound("document"));
    }

    let record = input.into_record(document_id);
    diesel::insert_into(privilege_log_entries::table)
        .values(&record)
        .on_conflict(privilege_log_entries::document_id)
        .do_update()
        .set((
            &record,
            privilege_log_entries::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;

    info!(%document_id, "stored privilege log entry");
    load_log_entry(conn, document_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_are_stored_as_missing() {
        let input = LogEntryInput {
            author: Some("  ".into()),
            recipients: vec![" A. Client ".into(), "".into()],
            basis: Some(" legal advice ".into()),
            ..LogEntryInput::default()
        };

        let record = input.into_record(Uuid::nil());
        assert_eq!(record.author, None);
        assert_eq!(record.recipients, serde_json::json!(["A. Client"]));
        assert_eq!(record.basis.as_deref(), Some("legal advice"));
    }
}
