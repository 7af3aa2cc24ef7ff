//! Case records, their intake numbering settings and label lookup.

use chrono::Utc;
use diesel::prelude::*;
use diesel::PgConnection;
use tracing::info;
use uuid::Uuid;

use crate::bates::{parse_label, validate_prefix};
use crate::error::{BatesError, BatesResult};
use crate::models::{Case, Document, NewCase, ProductionDocument};
use crate::schema::{cases, documents, production_documents, production_sets};
use crate::utils::json::FieldUpdate;

#[derive(Debug)]
pub struct CaseUpdate {
    pub name: Option<String>,
    pub bates_prefix: FieldUpdate,
}

/// Everything in a case that carries a given Bates label.
#[derive(Debug, Clone)]
pub struct BatesLookup {
    pub prefix: String,
    pub number: i64,
    pub document: Option<Document>,
    pub production_entries: Vec<ProductionDocument>,
}

fn clean_name(name: &str) -> BatesResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(BatesError::invalid("name must not be empty"));
    }
    Ok(trimmed.to_string())
}

pub fn create_case(
    conn: &mut PgConnection,
    name: &str,
    bates_prefix: Option<String>,
) -> BatesResult<Case> {
    let name = clean_name(name)?;
    if let Some(prefix) = &bates_prefix {
        validate_prefix(prefix)?;
    }

    let new_case = NewCase {
        id: Uuid::new_v4(),
        name,
        bates_prefix,
    };
    diesel::insert_into(cases::table)
        .values(&new_case)
        .execute(conn)?;

    info!(case_id = %new_case.id, bates_prefix = ?new_case.bates_prefix, "created case");
    Ok(cases::table.find(new_case.id).first(conn)?)
}

pub fn load_case(conn: &mut PgConnection, case_id: Uuid) -> BatesResult<Case> {
    cases::table
        .find(case_id)
        .first(conn)
        .optional()?
        .ok_or(BatesError::NotFound("case"))
}

/// Renames a case or changes its prefix. Clearing the prefix stops intake
/// numbering; the counter keeps its value so later ranges never restart.
pub fn update_case(
    conn: &mut PgConnection,
    case_id: Uuid,
    update: CaseUpdate,
) -> BatesResult<Case> {
    let name = update.name.as_deref().map(clean_name).transpose()?;
    let prefix = match update.bates_prefix {
        FieldUpdate::Keep => None,
        FieldUpdate::Clear => Some(None),
        FieldUpdate::Set(prefix) => {
            validate_prefix(&prefix)?;
            Some(Some(prefix))
        }
    };

    conn.transaction::<_, BatesError, _>(|conn| {
        let case: Case = cases::table
            .find(case_id)
            .for_update()
            .first(conn)
            .optional()?
            .ok_or(BatesError::NotFound("case"))?;

        let now = Utc::now().naive_utc();
        if let Some(name) = &name {
            diesel::update(cases::table.find(case.id))
                .set((cases::name.eq(name), cases::updated_at.eq(now)))
                .execute(conn)?;
        }
        if let Some(prefix) = &prefix {
            diesel::update(cases::table.find(case.id))
                .set((
                    cases::bates_prefix.eq(prefix.as_deref()),
                    cases::updated_at.eq(now),
                ))
                .execute(conn)?;
            info!(
                case_id = %case.id,
                bates_prefix = ?prefix,
                current_bates_number = case.current_bates_number,
                "updated case bates prefix"
            );
        }

        Ok(cases::table.find(case.id).first(conn)?)
    })
}

/// Live documents of a case: numbered ones in Bates order, then the rest by
/// upload time.
pub fn list_documents(conn: &mut PgConnection, case_id: Uuid) -> BatesResult<Vec<Document>> {
    load_case(conn, case_id)?;

    Ok(documents::table
        .filter(documents::case_id.eq(case_id))
        .filter(documents::deleted_at.is_null())
        .order((
            documents::bates_start_number.asc(),
            documents::uploaded_at.asc(),
            documents::id.asc(),
        ))
        .load(conn)?)
}

/// Resolves `label` to the document whose intake range contains it and to
/// the production entries stamped with exactly that label.
pub fn lookup_label(
    conn: &mut PgConnection,
    case_id: Uuid,
    label: &str,
) -> BatesResult<BatesLookup> {
    let (prefix, number) = parse_label(label.trim())
        .ok_or_else(|| BatesError::invalid(format!("'{label}' is not a Bates label")))?;
    load_case(conn, case_id)?;

    let candidates: Vec<Document> = documents::table
        .filter(documents::case_id.eq(case_id))
        .filter(documents::bates_start_number.le(number))
        .filter(documents::bates_end_number.ge(number))
        .load(conn)?;
    let document = candidates.into_iter().find(|document| {
        document
            .bates_start
            .as_deref()
            .and_then(parse_label)
            .is_some_and(|(start_prefix, _)| start_prefix == prefix)
    });

    let production_entries: Vec<ProductionDocument> = production_documents::table
        .inner_join(production_sets::table)
        .filter(production_sets::case_id.eq(case_id))
        .filter(production_documents::bates_number.eq(label.trim()))
        .select(production_documents::all_columns)
        .order(production_documents::created_at.asc())
        .load(conn)?;

    if document.is_none() && production_entries.is_empty() {
        return Err(BatesError::NotFound("bates label"));
    }

    Ok(BatesLookup {
        prefix: prefix.to_string(),
        number,
        document,
        production_entries,
    })
}
