//! Bates label formatting and block allocation.
//!
//! Labels are `"{prefix}-{number}"` with the number zero-padded to
//! [`BATES_NUMBER_WIDTH`] digits. Numbers wider than that render in full.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{BatesError, BatesResult};

pub const BATES_NUMBER_WIDTH: usize = 6;
pub const MAX_PREFIX_LEN: usize = 32;

static LABEL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*)-(\d+)$").expect("static Bates label pattern"));

/// A contiguous block of Bates numbers handed out by [`allocate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatesAllocation {
    pub start_label: String,
    pub end_label: String,
    pub start_number: i64,
    pub end_number: i64,
    pub new_high_water_mark: i64,
}

pub fn format_label(prefix: &str, number: i64) -> String {
    format!("{prefix}-{number:0width$}", width = BATES_NUMBER_WIDTH)
}

/// Splits a label into its prefix and numeric suffix.
pub fn parse_label(label: &str) -> Option<(&str, i64)> {
    let captures = LABEL_PATTERN.captures(label)?;
    let prefix = captures.get(1)?.as_str();
    let number = captures.get(2)?.as_str().parse().ok()?;
    Some((prefix, number))
}

pub fn validate_prefix(prefix: &str) -> BatesResult<()> {
    if prefix.is_empty() {
        return Err(BatesError::invalid("bates prefix must not be empty"));
    }
    if prefix.chars().count() > MAX_PREFIX_LEN {
        return Err(BatesError::invalid(format!(
            "bates prefix must be at most {MAX_PREFIX_LEN} characters"
        )));
    }
    if !prefix
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Err(BatesError::invalid(
            "bates prefix may only contain ASCII letters, digits, '-' and '_'",
        ));
    }
    Ok(())
}

/// Computes the next `count` labels after `current_high_water_mark`.
///
/// Pure: persisting `new_high_water_mark` together with the record that
/// receives the range is the caller's job.
pub fn allocate(
    current_high_water_mark: i64,
    prefix: &str,
    count: i64,
) -> BatesResult<BatesAllocation> {
    if count < 1 {
        return Err(BatesError::invalid(format!(
            "bates allocation count must be at least 1, got {count}"
        )));
    }
    if current_high_water_mark < 0 {
        return Err(BatesError::invalid(format!(
            "bates high-water mark must not be negative, got {current_high_water_mark}"
        )));
    }

    let new_high_water_mark = current_high_water_mark
        .checked_add(count)
        .ok_or_else(|| BatesError::invalid("bates counter would overflow"))?;
    let start_number = current_high_water_mark + 1;

    Ok(BatesAllocation {
        start_label: format_label(prefix, start_number),
        end_label: format_label(prefix, new_high_water_mark),
        start_number,
        end_number: new_high_water_mark,
        new_high_water_mark,
    })
}
