use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = cases)]
pub struct Case {
    pub id: Uuid,
    pub name: String,
    pub bates_prefix: Option<String>,
    pub current_bates_number: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = cases)]
pub struct NewCase {
    pub id: Uuid,
    pub name: String,
    pub bates_prefix: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = documents)]
#[diesel(belongs_to(Case))]
pub struct Document {
    pub id: Uuid,
    pub case_id: Uuid,
    pub name: String,
    pub mime_type: Option<String>,
    pub file_size: i64,
    pub checksum: String,
    pub storage_key: String,
    pub page_count: i32,
    pub bates_start: Option<String>,
    pub bates_end: Option<String>,
    pub bates_start_number: Option<i64>,
    pub bates_end_number: Option<i64>,
    pub uploaded_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = documents)]
pub struct NewDocument {
    pub id: Uuid,
    pub case_id: Uuid,
    pub name: String,
    pub mime_type: Option<String>,
    pub file_size: i64,
    pub checksum: String,
    pub storage_key: String,
    pub page_count: i32,
    pub bates_start: Option<String>,
    pub bates_end: Option<String>,
    pub bates_start_number: Option<i64>,
    pub bates_end_number: Option<i64>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = production_sets)]
#[diesel(belongs_to(Case))]
pub struct ProductionSet {
    pub id: Uuid,
    pub case_id: Uuid,
    pub name: String,
    pub recipient: String,
    pub produced_date: NaiveDate,
    pub bates_prefix: Option<String>,
    pub current_bates_number: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = production_sets)]
pub struct NewProductionSet {
    pub id: Uuid,
    pub case_id: Uuid,
    pub name: String,
    pub recipient: String,
    pub produced_date: NaiveDate,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = production_documents)]
#[diesel(belongs_to(ProductionSet, foreign_key = production_set_id))]
#[diesel(belongs_to(Document))]
pub struct ProductionDocument {
    pub id: Uuid,
    pub production_set_id: Uuid,
    pub document_id: Uuid,
    pub bates_number: Option<String>,
    pub bates_sequence: Option<i64>,
    pub is_privileged: bool,
    pub privilege_reason: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = production_documents)]
pub struct NewProductionDocument {
    pub id: Uuid,
    pub production_set_id: Uuid,
    pub document_id: Uuid,
    pub bates_number: Option<String>,
    pub bates_sequence: Option<i64>,
    pub is_privileged: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = privilege_log_entries)]
#[diesel(primary_key(document_id))]
#[diesel(belongs_to(Document))]
pub struct PrivilegeLogEntry {
    pub document_id: Uuid,
    pub document_date: Option<NaiveDate>,
    pub author: Option<String>,
    pub recipients: serde_json::Value,
    pub document_type: Option<String>,
    pub privilege_type: Option<String>,
    pub basis: Option<String>,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = privilege_log_entries)]
#[diesel(primary_key(document_id))]
#[diesel(treat_none_as_null = true)]
pub struct NewPrivilegeLogEntry {
    pub document_id: Uuid,
    pub document_date: Option<NaiveDate>,
    pub author: Option<String>,
    pub recipients: serde_json::Value,
    pub document_type: Option<String>,
    pub privilege_type: Option<String>,
    pub basis: Option<String>,
    pub description: Option<String>,
}
