//! Turning `--field key=value` and `--json` arguments into records.

use bastion_sync_core::ResourceSchema;
use bastion_sync_types::Record;
use serde_json::Value;
use thiserror::Error;

/// Malformed command-line record input.
#[derive(Debug, Error)]
pub enum InputError {
    /// A `--field` argument without `=`.
    #[error("expected key=value, got '{0}'")]
    MissingEquals(String),

    /// A `--field` argument with an empty key.
    #[error("empty field name in '{0}'")]
    EmptyKey(String),

    /// `--json` is not valid JSON.
    #[error("invalid --json: {0}")]
    Json(#[from] serde_json::Error),

    /// `--json` is valid JSON but not an object.
    #[error("--json must be a JSON object")]
    NotAnObject,
}

/// Build a record from `--json` (if any) overlaid with `--field` values.
///
/// Field values are coerced to the JSON type the schema expects. Names the
/// schema does not know are kept as text so validation can reject them.
pub fn parse_record(
    schema: &ResourceSchema,
    fields: &[String],
    json: Option<&str>,
) -> Result<Record, InputError> {
    let mut record = match json {
        Some(text) => match serde_json::from_str(text)? {
            Value::Object(map) => map,
            _ => return Err(InputError::NotAnObject),
        },
        None => Record::new(),
    };

    for arg in fields {
        let (key, raw) = arg
            .split_once('=')
            .ok_or_else(|| InputError::MissingEquals(arg.clone()))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(InputError::EmptyKey(arg.clone()));
        }
        let value = schema
            .coerce(key, raw)
            .unwrap_or_else(|| Value::String(raw.to_string()));
        record.insert(key.to_string(), value);
    }

    Ok(record)
}
