//! Consistency checks over stored Bates numbers, run by the maintenance tool.

use std::collections::HashMap;

use diesel::prelude::*;
use diesel::PgConnection;
use uuid::Uuid;

use crate::error::BatesResult;
use crate::models::{Case, ProductionSet};
use crate::schema::{cases, documents, production_documents, production_sets};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeViolation {
    /// Two documents of one case share intake numbers.
    Overlap {
        case_id: Uuid,
        first: Uuid,
        second: Uuid,
    },
    /// A stored number is above the owning counter.
    AboveHighWaterMark {
        owner_id: Uuid,
        record_id: Uuid,
        number: i64,
        high_water_mark: i64,
    },
    /// Two entries of one production share a sequence number.
    DuplicateSequence {
        production_set_id: Uuid,
        sequence: i64,
    },
}

/// Sorts `(record, start, end)` ranges and reports each range that starts
/// inside an earlier one, paired with the earlier range reaching furthest.
pub fn find_overlaps(ranges: &mut [(Uuid, i64, i64)]) -> Vec<(Uuid, Uuid)> {
    ranges.sort_by_key(|(_, start, end)| (*start, *end));

    let mut overlaps = Vec::new();
    let mut furthest: Option<(Uuid, i64)> = None;
    for (id, start, end) in ranges.iter() {
        if let Some((previous, reach)) = furthest {
            if *start <= reach {
                overlaps.push((previous, *id));
            }
        }
        if furthest.map_or(true, |(_, reach)| *end > reach) {
            furthest = Some((*id, *end));
        }
    }
    overlaps
}

pub fn verify_case(conn: &mut PgConnection, case: &Case) -> BatesResult<Vec<RangeViolation>> {
    let rows: Vec<(Uuid, Option<i64>, Option<i64>)> = documents::table
        .filter(documents::case_id.eq(case.id))
        .filter(documents::bates_start_number.is_not_null())
        .select((
            documents::id,
            documents::bates_start_number,
            documents::bates_end_number,
        ))
        .load(conn)?;

    let mut ranges: Vec<(Uuid, i64, i64)> = rows
        .into_iter()
        .filter_map(|(id, start, end)| Some((id, start?, end?)))
        .collect();

    let mut violations: Vec<RangeViolation> = ranges
        .iter()
        .filter(|(_, _, end)| *end > case.current_bates_number)
        .map(|(id, _, end)| RangeViolation::AboveHighWaterMark {
            owner_id: case.id,
            record_id: *id,
            number: *end,
            high_water_mark: case.current_bates_number,
        })
        .collect();

    violations.extend(find_overlaps(&mut ranges).into_iter().map(|(first, second)| {
        RangeViolation::Overlap {
            case_id: case.id,
            first,
            second,
        }
    }));
    Ok(violations)
}

pub fn verify_production(
    conn: &mut PgConnection,
    set: &ProductionSet,
) -> BatesResult<Vec<RangeViolation>> {
    let rows: Vec<(Uuid, Option<i64>)> = production_documents::table
        .filter(production_documents::production_set_id.eq(set.id))
        .filter(production_documents::bates_sequence.is_not_null())
        .select((production_documents::id, production_documents::bates_sequence))
        .load(conn)?;

    let mut violations = Vec::new();
    let mut seen: HashMap<i64, Uuid> = HashMap::new();
    for (id, sequence) in rows {
        let Some(sequence) = sequence else { continue };
        if sequence > set.current_bates_number {
            violations.push(RangeViolation::AboveHighWaterMark {
                owner_id: set.id,
                record_id: id,
                number: sequence,
                high_water_mark: set.current_bates_number,
            });
        }
        if seen.insert(sequence, id).is_some() {
            violations.push(RangeViolation::DuplicateSequence {
                production_set_id: set.id,
                sequence,
            });
        }
    }
    Ok(violations)
}

/// Checks every case and production set.
pub fn verify_all(conn: &mut PgConnection) -> BatesResult<Vec<RangeViolation>> {
    let mut violations = Vec::new();

    let all_cases: Vec<Case> = cases::table.order(cases::created_at.asc()).load(conn)?;
    for case in &all_cases {
        violations.extend(verify_case(conn, case)?);
    }

    let sets: Vec<ProductionSet> = production_sets::table
        .order(production_sets::created_at.asc())
        .load(conn)?;
    for set in &sets {
        violations.extend(verify_production(conn, set)?);
    }

    Ok(violations)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_intersecting_ranges_only() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let c = Uuid::from_u128(3);
        let mut ranges = vec![(c, 7, 9), (a, 1, 3), (b, 3, 6)];

        assert_eq!(find_overlaps(&mut ranges), vec![(a, b)]);
    }

    #[test]
    fn adjacent_ranges_do_not_overlap() {
        let mut ranges = vec![
            (Uuid::from_u128(1), 1, 3),
            (Uuid::from_u128(2), 4, 4),
            (Uuid::from_u128(3), 5, 10),
        ];
        assert!(find_overlaps(&mut ranges).is_empty());
    }

    #[test]
    fn wide_range_overlaps_every_range_it_covers() {
        let wide = Uuid::from_u128(1);
        let inner_a = Uuid::from_u128(2);
        let inner_b = Uuid::from_u128(3);
        let mut ranges = vec![(inner_b, 5, 6), (wide, 1, 10), (inner_a, 2, 3)];

        assert_eq!(
            find_overlaps(&mut ranges),
            vec![(wide, inner_a), (wide, inner_b)]
        );
    }
}
