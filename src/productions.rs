use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use diesel::PgConnection;
use tracing::info;
use uuid::Uuid;

use crate::bates::{allocate, format_label, validate_prefix};
use crate::db::set_local_timeout;
use crate::error::{BatesError, BatesResult};
use crate::models::{NewProductionDocument, NewProductionSet, ProductionDocument, ProductionSet};
use crate::schema::{cases, documents, production_documents, production_sets};

#[derive(Debug, Clone)]
pub struct NewProduction {
    pub case_id: Uuid,
    pub name: String,
    pub recipient: String,
    pub produced_date: NaiveDate,
}

pub fn create_production_set(
    conn: &mut PgConnection,
    production: NewProduction,
) -> BatesResult<ProductionSet> {
    let name = production.name.trim();
    if name.is_empty() {
        return Err(BatesError::invalid("name must not be empty"));
    }
    let recipient = production.recipient.trim();
    if recipient.is_empty() {
        return Err(BatesError::invalid("recipient must not be empty"));
    }

    let case_exists: bool =
        diesel::select(diesel::dsl::exists(cases::table.find(production.case_id)))
            .get_result(conn)?;
    if !case_exists {
        return Err(BatesError::NotFound("case"));
    }

    let new_set = NewProductionSet {
        id: Uuid::new_v4(),
        case_id: production.case_id,
        name: name.to_string(),
        recipient: recipient.to_string(),
        produced_date: production.produced_date,
    };
    diesel::insert_into(production_sets::table)
        .values(&new_set)
        .execute(conn)?;

    Ok(production_sets::table.find(new_set.id).first(conn)?)
}

pub fn load_production_set(
    conn: &mut PgConnection,
    production_set_id: Uuid,
) -> BatesResult<ProductionSet> {
    production_sets::table
        .find(production_set_id)
        .first(conn)
        .optional()?
        .ok_or(BatesError::NotFound("production set"))
}

pub fn list_production_sets(
    conn: &mut PgConnection,
    case_id: Uuid,
) -> BatesResult<Vec<ProductionSet>> {
    let case_exists: bool =
        diesel::select(diesel::dsl::exists(cases::table.find(case_id))).get_result(conn)?;
    if !case_exists {
        return Err(BatesError::NotFound("case"));
    }

    Ok(production_sets::table
        .filter(production_sets::case_id.eq(case_id))
        .order((
            production_sets::produced_date.desc(),
            production_sets::created_at.desc(),
        ))
        .load(conn)?)
}

/// Entries of a production in Bates order; unnumbered entries last.
pub fn load_entries(
    conn: &mut PgConnection,
    production_set_id: Uuid,
) -> BatesResult<Vec<ProductionDocument>> {
    Ok(production_documents::table
        .filter(production_documents::production_set_id.eq(production_set_id))
        .order((
            production_documents::bates_sequence.asc(),
            production_documents::created_at.asc(),
            production_documents::id.asc(),
        ))
        .load(conn)?)
}

/// Adds `document_ids` to a production, numbering them in input order after
/// the production's high-water mark. All-or-nothing.
pub fn add_documents(
    conn: &mut PgConnection,
    production_set_id: Uuid,
    document_ids: &[Uuid],
    bates_prefix: Option<&str>,
    timeout: Duration,
) -> BatesResult<Vec<ProductionDocument>> {
    if document_ids.is_empty() {
        return Err(BatesError::invalid("document_ids must not be empty"));
    }
    if let Some(prefix) = bates_prefix {
        validate_prefix(prefix)?;
    }

    conn.build_transaction()
        .read_write()
        .run::<_, BatesError, _>(|conn| {
            set_local_timeout(conn, timeout)?;

            let production: ProductionSet = production_sets::table
                .find(production_set_id)
                .for_update()
                .first(conn)
                .optional()?
                .ok_or(BatesError::NotFound("production set"))?;

            let unique_ids: HashSet<Uuid> = document_ids.iter().copied().collect();
            let requested: Vec<Uuid> = unique_ids.iter().copied().collect();
            let found: i64 = documents::table
                .filter(documents::id.eq_any(&requested))
                .filter(documents::case_id.eq(production.case_id))
                .filter(documents::deleted_at.is_null())
                .count()
                .get_result(conn)?;
            if found != requested.len() as i64 {
                return Err(BatesError::NotFound("document"));
            }

            let numbering = match bates_prefix {
                Some(prefix) => {
                    if let Some(existing) = production.bates_prefix.as_deref() {
                        if existing != prefix {
                            return Err(BatesError::invalid(format!(
                                "production set is numbered under prefix '{existing}'"
                            )));
                        }
                    }
                    Some((
                        prefix,
                        allocate(
                            production.current_bates_number,
                            prefix,
                            document_ids.len() as i64,
                        )?,
                    ))
                }
                None => None,
            };

            let new_rows: Vec<NewProductionDocument> = document_ids
                .iter()
                .enumerate()
                .map(|(offset, document_id)| {
                    let sequence = numbering
                        .as_ref()
                        .map(|(_, allocation)| allocation.start_number + offset as i64);
                    NewProductionDocument {
                        id: Uuid::new_v4(),
                        production_set_id,
                        document_id: *document_id,
                        bates_number: numbering
                            .as_ref()
                            .zip(sequence)
                            .map(|((prefix, _), number)| format_label(prefix, number)),
                        bates_sequence: sequence,
                        is_privileged: false,
                    }
                })
                .collect();

            if let Some((prefix, allocation)) = &numbering {
                let advanced = diesel::update(
                    production_sets::table
                        .filter(production_sets::id.eq(production_set_id))
                        .filter(
                            production_sets::current_bates_number
                                .eq(production.current_bates_number),
                        ),
                )
                .set((
                    production_sets::current_bates_number.eq(allocation.new_high_water_mark),
                    production_sets::bates_prefix.eq(Some(*prefix)),
                    production_sets::updated_at.eq(Utc::now().naive_utc()),
                ))
                .execute(conn)?;

                if advanced != 1 {
                    return Err(BatesError::Conflict(format!(
                        "bates counter for production set {production_set_id} changed during allocation"
                    )));
                }
            }

            diesel::insert_into(production_documents::table)
                .values(&new_rows)
                .execute(conn)?;

            let positions: HashMap<Uuid, usize> = new_rows
                .iter()
                .enumerate()
                .map(|(position, row)| (row.id, position))
                .collect();
            let inserted_ids: Vec<Uuid> = positions.keys().copied().collect();
            let mut inserted: Vec<ProductionDocument> = production_documents::table
                .filter(production_documents::id.eq_any(&inserted_ids))
                .load(conn)?;
            inserted.sort_by_key(|entry| positions.get(&entry.id).copied().unwrap_or(usize::MAX));

            match &numbering {
                Some((_, allocation)) => info!(
                    production_set_id = %production_set_id,
                    documents = inserted.len(),
                    bates_start = %allocation.start_label,
                    bates_end = %allocation.end_label,
                    "added documents to production"
                ),
                None => info!(
                    production_set_id = %production_set_id,
                    documents = inserted.len(),
                    "added unnumbered documents to production"
                ),
            }

            Ok(inserted)
        })
}

/// Sets or clears the privilege flag on one production entry.
///
/// Clearing the flag drops the reason too. Bates fields are left alone.
pub fn update_privilege(
    conn: &mut PgConnection,
    production_set_id: Uuid,
    entry_id: Uuid,
    is_privileged: bool,
    reason: Option<String>,
) -> BatesResult<ProductionDocument> {
    let reason = if is_privileged {
        reason
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    } else {
        None
    };

    let updated = diesel::update(
        production_documents::table
            .filter(production_documents::id.eq(entry_id))
            .filter(production_documents::production_set_id.eq(production_set_id)),
    )
    .set((
        production_documents::is_privileged.eq(is_privileged),
        production_documents::privilege_reason.eq(reason),
        production_documents::updated_at.eq(Utc::now().naive_utc()),
    ))
    .execute(conn)?;

    if updated == 0 {
        return Err(BatesError::NotFound("production document"));
    }

    Ok(production_documents::table.find(entry_id).first(conn)?)
}
