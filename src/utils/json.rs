use serde_json::Value;

/// A PATCH field: left alone, cleared with `null`, or replaced.
#[derive(Debug, PartialEq, Eq)]
pub enum FieldUpdate {
    Keep,
    Clear,
    Set(String),
}

pub fn classify_string_update(field: &str, value: Option<&Value>) -> Result<FieldUpdate, String> {
    match value {
        None => Ok(FieldUpdate::Keep),
        Some(Value::Null) => Ok(FieldUpdate::Clear),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(FieldUpdate::Clear),
        Some(Value::String(text)) => Ok(FieldUpdate::Set(text.to_owned())),
        Some(other) => Err(format!("{field} must be a string or null, got {other}")),
    }
}
