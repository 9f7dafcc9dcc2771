//! Shared form types
//!
//! Identifiers, the form payload representation, and the wire shapes exchanged
//! with a Remote Form Store.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Editable form payload. Keys are sorted, so serialisation is deterministic.
pub type FormData = Map<String, Value>;

// Metadata keys stamped onto payloads by the session manager and stores.
pub const STATUS_KEY: &str = "status";
pub const SUBMITTED_AT_KEY: &str = "submittedAt";
pub const FORM_VERSION_KEY: &str = "formVersion";
pub const LAST_AUTO_SAVED_KEY: &str = "lastAutoSaved";
pub const SAVED_AT_KEY: &str = "savedAt";

/// Keys that describe a record rather than hold user input.
pub const METADATA_KEYS: [&str; 5] = [
    STATUS_KEY,
    SUBMITTED_AT_KEY,
    FORM_VERSION_KEY,
    LAST_AUTO_SAVED_KEY,
    SAVED_AT_KEY,
];

/// Identifier selecting which logical form a session edits (e.g. `consentPhoto`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormType(String);

impl FormType {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FormType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for FormType {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifier of the client record a form pertains to
///
/// Client ids arrive as strings or numbers depending on the caller; both are
/// normalised to their string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the id carries no usable value.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ClientId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<i64> for ClientId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl From<u64> for ClientId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

/// Present and non-blank client id, if any.
pub fn present_client(client_id: Option<&ClientId>) -> Option<&ClientId> {
    client_id.filter(|id| !id.is_blank())
}

/// Lifecycle status stamped onto saved payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormStatus {
    Draft,
    Completed,
}

impl FormStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormStatus::Draft => "draft",
            FormStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for FormStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a fetch against the Remote Form Store
///
/// An empty result is the valid "no data yet" state, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchedForm {
    Empty,
    Record(FormData),
    /// Several records for the same key, newest first.
    Records(Vec<FormData>),
}

impl FetchedForm {
    /// Interpret a raw JSON body as a fetch result.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => FetchedForm::Empty,
            Value::Object(map) if map.is_empty() => FetchedForm::Empty,
            Value::Object(map) => FetchedForm::Record(map),
            Value::Array(items) => {
                let records: Vec<FormData> = items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::Object(map) => Some(map),
                        _ => None,
                    })
                    .collect();
                if records.is_empty() {
                    FetchedForm::Empty
                } else {
                    FetchedForm::Records(records)
                }
            }
            _ => FetchedForm::Empty,
        }
    }

    /// The record a session should hydrate from, if any.
    pub fn into_latest(self) -> Option<FormData> {
        match self {
            FetchedForm::Empty => None,
            FetchedForm::Record(map) => Some(map).filter(|m| !m.is_empty()),
            FetchedForm::Records(records) => records.into_iter().find(|m| !m.is_empty()),
        }
    }
}

/// Derived statistics for one stored form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSummary {
    pub client_id: ClientId,
    pub form_type: FormType,
    pub status: Option<FormStatus>,
    pub field_count: usize,
    pub filled_count: usize,
    /// Percentage of non-metadata fields that are filled, 0..=100.
    pub completion: u8,
    pub submitted_at: Option<String>,
    pub last_auto_saved: Option<String>,
    pub save_count: u64,
    pub auto_save_count: u64,
}

/// RFC 3339 timestamp with millisecond precision, as stamped on payloads.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Copy of `data` without metadata keys.
pub fn user_fields(data: &FormData) -> FormData {
    data.iter()
        .filter(|(key, _)| !METADATA_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> FormData {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_fetched_form_from_value() {
        assert_eq!(FetchedForm::from_value(Value::Null), FetchedForm::Empty);
        assert_eq!(FetchedForm::from_value(json!({})), FetchedForm::Empty);
        assert_eq!(FetchedForm::from_value(json!([])), FetchedForm::Empty);
        assert_eq!(
            FetchedForm::from_value(json!({"a": 1})),
            FetchedForm::Record(object(json!({"a": 1})))
        );
    }

    #[test]
    fn test_into_latest_takes_first_non_empty_record() {
        let fetched = FetchedForm::from_value(json!([{}, {"a": 2}, {"a": 1}]));
        assert_eq!(fetched.into_latest(), Some(object(json!({"a": 2}))));
        assert_eq!(FetchedForm::Empty.into_latest(), None);
    }

    #[test]
    fn test_client_id_normalisation() {
        assert_eq!(ClientId::from(42i64).as_str(), "42");
        assert!(ClientId::from("  ").is_blank());
        assert!(present_client(Some(&ClientId::from(""))).is_none());
        assert!(present_client(Some(&ClientId::from("c-1"))).is_some());
        assert!(present_client(None).is_none());
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(json!(FormStatus::Completed), json!("completed"));
        assert_eq!(FormStatus::Draft.to_string(), "draft");
    }

    #[test]
    fn test_user_fields_strips_metadata() {
        let data = object(json!({
            "clientName": "Ada",
            "status": "draft",
            "lastAutoSaved": "2024-01-01T00:00:00.000Z"
        }));
        let fields = user_fields(&data);
        assert_eq!(fields.len(), 1);
        assert!(fields.contains_key("clientName"));
    }
}
