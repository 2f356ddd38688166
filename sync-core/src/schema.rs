//! Submission resource schemas.
//!
//! Every kind of public submission (advisor applications, event listings,
//! company/consortium/innovation listings, newsletter signups) is described
//! by one [`ResourceSchema`]: the collection it lives in, its fields, and
//! whether staff moderate it. Validation and field coercion live here so the
//! forms, the CLI and the admin tooling all agree on what a valid record is.

use bastion_sync_types::Record;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Fields maintained by the system rather than typed by a visitor.
pub const SYSTEM_FIELDS: &[&str] = &["id", "status", "submitted_at", "updated_at"];

/// Moderation status of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    /// Awaiting review.
    Pending,
    /// Published.
    Approved,
    /// Declined.
    Rejected,
}

impl SubmissionStatus {
    /// All statuses, in review order.
    pub const ALL: [SubmissionStatus; 3] = [
        SubmissionStatus::Pending,
        SubmissionStatus::Approved,
        SubmissionStatus::Rejected,
    ];

    /// The value stored in the record's `status` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing a [`SubmissionStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown status '{0}' (expected pending, approved or rejected)")]
pub struct ParseStatusError(pub String);

impl FromStr for SubmissionStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(SubmissionStatus::Pending),
            "approved" => Ok(SubmissionStatus::Approved),
            "rejected" => Ok(SubmissionStatus::Rejected),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

/// The type of value a field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Single-line text.
    Text,
    /// Multi-line text.
    LongText,
    /// An email address.
    Email,
    /// An http(s) URL.
    Url,
    /// A calendar date, `YYYY-MM-DD`.
    Date,
    /// A number.
    Number,
    /// A yes/no flag.
    Boolean,
    /// A list of short strings.
    List,
}

impl FieldKind {
    /// Turn raw text (from a form field or a `key=value` argument) into the
    /// JSON value this kind expects. Unparseable input is kept as a string
    /// so validation can report it.
    pub fn coerce(&self, raw: &str) -> Value {
        let trimmed = raw.trim();
        match self {
            FieldKind::Number => trimmed
                .parse::<i64>()
                .ok()
                .map(Number::from)
                .or_else(|| trimmed.parse::<f64>().ok().and_then(Number::from_f64))
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(raw.to_string())),
            FieldKind::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Value::Bool(true),
                "false" | "no" | "off" | "0" => Value::Bool(false),
                _ => Value::String(raw.to_string()),
            },
            FieldKind::List => Value::Array(
                split_list(trimmed)
                    .into_iter()
                    .map(Value::String)
                    .collect(),
            ),
            _ => Value::String(trimmed.to_string()),
        }
    }

    fn check(&self, value: &Value) -> Result<(), String> {
        match self {
            FieldKind::Text | FieldKind::LongText => match value {
                Value::String(_) => Ok(()),
                _ => Err("must be text".into()),
            },
            FieldKind::Email => match value {
                Value::String(s) if is_email(s) => Ok(()),
                _ => Err("must be a valid email address".into()),
            },
            FieldKind::Url => match value {
                Value::String(s) if is_url(s) => Ok(()),
                _ => Err("must be an http:// or https:// URL".into()),
            },
            FieldKind::Date => match value {
                Value::String(s) if is_date(s) => Ok(()),
                _ => Err("must be a date in YYYY-MM-DD form".into()),
            },
            FieldKind::Number => match value {
                Value::Number(_) => Ok(()),
                Value::String(s) if s.trim().parse::<f64>().is_ok() => Ok(()),
                _ => Err("must be a number".into()),
            },
            FieldKind::Boolean => match value {
                Value::Bool(_) => Ok(()),
                _ => Err("must be true or false".into()),
            },
            FieldKind::List => match value {
                Value::Array(items) if items.iter().all(Value::is_string) => Ok(()),
                Value::String(_) => Ok(()),
                _ => Err("must be a list of text values".into()),
            },
        }
    }
}

/// One field of a submission form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Key in the stored record.
    pub name: &'static str,
    /// Label shown to people.
    pub label: &'static str,
    /// Value type.
    pub kind: FieldKind,
    /// Whether a submission must supply a non-empty value.
    pub required: bool,
}

impl FieldSpec {
    /// A required field.
    pub const fn required(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            label,
            kind,
            required: true,
        }
    }

    /// An optional field.
    pub const fn optional(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            label,
            kind,
            required: false,
        }
    }
}

/// A validation failure on one field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct FieldError {
    /// The offending field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl FieldError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Description of one kind of submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSchema {
    /// Short name used on the command line and in admin URLs.
    pub entity: &'static str,
    /// Remote collection the records live in.
    pub table: &'static str,
    /// Visitor-supplied fields, in display order.
    pub fields: Vec<FieldSpec>,
    /// Whether records carry a moderation `status`.
    pub moderated: bool,
}

impl ResourceSchema {
    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Validate a complete submission.
    ///
    /// Every required field must be present and non-empty, every supplied
    /// field must have the right shape, and unknown fields are rejected.
    /// System fields are ignored.
    pub fn validate(&self, record: &Record) -> Result<(), Vec<FieldError>> {
        let mut errors = self.check_unknown(record);

        for spec in &self.fields {
            match record.get(spec.name) {
                Some(value) if !is_blank(value) => {
                    if let Err(message) = spec.kind.check(value) {
                        errors.push(FieldError::new(spec.name, message));
                    }
                }
                _ if spec.required => {
                    errors.push(FieldError::new(spec.name, format!("{} is required", spec.label)));
                }
                _ => {}
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate an edit: only the supplied fields are checked, and a
    /// required field may not be blanked out.
    pub fn validate_partial(&self, fields: &Record) -> Result<(), Vec<FieldError>> {
        let mut errors = self.check_unknown(fields);

        for (name, value) in fields {
            let Some(spec) = self.field(name) else {
                continue;
            };
            if is_blank(value) {
                if spec.required {
                    errors.push(FieldError::new(spec.name, format!("{} is required", spec.label)));
                }
            } else if let Err(message) = spec.kind.check(value) {
                errors.push(FieldError::new(spec.name, message));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Coerce a raw `name=value` pair into a record entry for this schema.
    ///
    /// Returns `None` for unknown field names.
    pub fn coerce(&self, name: &str, raw: &str) -> Option<Value> {
        self.field(name).map(|spec| spec.kind.coerce(raw))
    }

    fn check_unknown(&self, record: &Record) -> Vec<FieldError> {
        record
            .keys()
            .filter(|k| !SYSTEM_FIELDS.contains(&k.as_str()) && self.field(k).is_none())
            .map(|k| FieldError::new(k, format!("unknown field for {}", self.entity)))
            .collect()
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_email(s: &str) -> bool {
    let s = s.trim();
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

fn is_url(s: &str) -> bool {
    let s = s.trim();
    let rest = s
        .strip_prefix("https://")
        .or_else(|| s.strip_prefix("http://"));
    match rest {
        Some(rest) => {
            let host = rest.split(['/', '?', '#']).next().unwrap_or("");
            !host.is_empty() && !s.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

fn is_date(s: &str) -> bool {
    let parts: Vec<&str> = s.trim().split('-').collect();
    let [year, month, day] = parts.as_slice() else {
        return false;
    };
    if year.len() != 4 || month.len() != 2 || day.len() != 2 {
        return false;
    }
    let (Ok(_), Ok(month), Ok(day)) = (year.parse::<u16>(), month.parse::<u8>(), day.parse::<u8>())
    else {
        return false;
    };
    (1..=12).contains(&month) && (1..=31).contains(&day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> ResourceSchema {
        ResourceSchema {
            entity: "events",
            table: "events",
            fields: vec![
                FieldSpec::required("name", "Event name", FieldKind::Text),
                FieldSpec::required("event_date", "Date", FieldKind::Date),
                FieldSpec::required("contact_email", "Contact email", FieldKind::Email),
                FieldSpec::optional("website", "Website", FieldKind::Url),
                FieldSpec::optional("capacity", "Capacity", FieldKind::Number),
                FieldSpec::optional("virtual", "Virtual", FieldKind::Boolean),
                FieldSpec::optional("tags", "Tags", FieldKind::List),
            ],
            moderated: true,
        }
    }

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn failed_fields(result: Result<(), Vec<FieldError>>) -> Vec<String> {
        result
            .unwrap_err()
            .into_iter()
            .map(|e| e.field)
            .collect()
    }

    #[test]
    fn valid_record_passes() {
        let r = record(json!({
            "name": "Defense Tech Summit",
            "event_date": "2026-11-03",
            "contact_email": "events@example.org",
            "website": "https://summit.example.org/2026",
            "capacity": 300,
            "virtual": false,
            "tags": ["autonomy", "space"],
        }));
        assert!(schema().validate(&r).is_ok());
    }

    #[test]
    fn missing_and_blank_required_fields_fail() {
        let r = record(json!({"name": "   ", "contact_email": "a@b.co"}));
        assert_eq!(
            failed_fields(schema().validate(&r)),
            vec!["name".to_string(), "event_date".to_string()]
        );
    }

    #[test]
    fn malformed_values_fail() {
        let r = record(json!({
            "name": "X",
            "event_date": "2026-13-01",
            "contact_email": "not-an-email",
            "website": "ftp://example.org",
            "capacity": "lots",
            "virtual": "maybe",
        }));
        assert_eq!(
            failed_fields(schema().validate(&r)),
            vec!["event_date", "contact_email", "website", "capacity", "virtual"]
        );
    }

    #[test]
    fn unknown_fields_rejected_but_system_fields_allowed() {
        let r = record(json!({
            "name": "X",
            "event_date": "2026-01-01",
            "contact_email": "a@b.co",
            "status": "pending",
            "id": "abc",
            "hacker": true,
        }));
        assert_eq!(failed_fields(schema().validate(&r)), vec!["hacker"]);
    }

    #[test]
    fn partial_validation_checks_only_supplied_fields() {
        let s = schema();
        assert!(s.validate_partial(&record(json!({"website": "http://x.org"}))).is_ok());
        assert_eq!(
            failed_fields(s.validate_partial(&record(json!({"name": ""})))),
            vec!["name"]
        );
        assert_eq!(
            failed_fields(s.validate_partial(&record(json!({"contact_email": "nope"})))),
            vec!["contact_email"]
        );
    }

    #[test]
    fn coerce_follows_field_kind() {
        let s = schema();
        assert_eq!(s.coerce("capacity", " 250 "), Some(json!(250)));
        assert_eq!(s.coerce("capacity", "2.5"), Some(json!(2.5)));
        assert_eq!(s.coerce("virtual", "yes"), Some(json!(true)));
        assert_eq!(s.coerce("tags", "a, b,,c"), Some(json!(["a", "b", "c"])));
        assert_eq!(s.coerce("name", "  Summit "), Some(json!("Summit")));
        assert_eq!(s.coerce("nope", "x"), None);
    }

    #[test]
    fn email_rules() {
        assert!(is_email("jane.doe@agency.gov"));
        assert!(!is_email("jane@localhost"));
        assert!(!is_email("@agency.gov"));
        assert!(!is_email("jane@@agency.gov"));
        assert!(!is_email("jane doe@agency.gov"));
        assert!(!is_email("jane@agency."));
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Approved".parse::<SubmissionStatus>(), Ok(SubmissionStatus::Approved));
        assert!("archived".parse::<SubmissionStatus>().is_err());
        assert_eq!(SubmissionStatus::Rejected.to_string(), "rejected");
    }
}
