//! Validation Engine
//!
//! A small rule interpreter over form payloads. Rules are evaluated in a fixed
//! order (required, email, phone, min length, custom) and every failure is
//! collected rather than stopping at the first one.

use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;

use crate::types::{present_client, ClientId, FormData};

/// Message returned when no client is selected.
pub const NO_CLIENT_SELECTED: &str = "No client selected. Please select a client first.";

/// Verdict of a custom predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleVerdict {
    Valid,
    /// Invalid with no message of its own; reported as "<field> is invalid".
    Invalid,
    /// Invalid with a message reported verbatim.
    Message(String),
}

impl From<bool> for RuleVerdict {
    fn from(valid: bool) -> Self {
        if valid {
            RuleVerdict::Valid
        } else {
            RuleVerdict::Invalid
        }
    }
}

/// Custom predicate receiving `(value, formData, clientID)`.
///
/// Missing fields are passed as `Value::Null`.
pub type CustomPredicate =
    Arc<dyn Fn(&Value, &FormData, Option<&ClientId>) -> RuleVerdict + Send + Sync>;

/// Rule-set description consumed by [`Validator`]
#[derive(Clone, Default)]
pub struct ValidationRules {
    pub required: Vec<String>,
    pub email: Vec<String>,
    pub phone: Vec<String>,
    /// Field -> minimum length, checked in insertion order.
    pub min_length: Vec<(String, usize)>,
    /// Field -> predicate, checked in insertion order.
    pub custom: Vec<(String, CustomPredicate)>,
}

impl fmt::Debug for ValidationRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationRules")
            .field("required", &self.required)
            .field("email", &self.email)
            .field("phone", &self.phone)
            .field("min_length", &self.min_length)
            .field(
                "custom",
                &self.custom.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ValidationRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn email<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.email.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn phone<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.phone.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn min_length(mut self, field: impl Into<String>, minimum: usize) -> Self {
        self.min_length.push((field.into(), minimum));
        self
    }

    pub fn custom<F>(mut self, field: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Value, &FormData, Option<&ClientId>) -> RuleVerdict + Send + Sync + 'static,
    {
        self.custom.push((field.into(), Arc::new(predicate)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.required.is_empty()
            && self.email.is_empty()
            && self.phone.is_empty()
            && self.min_length.is_empty()
            && self.custom.is_empty()
    }
}

/// Validator built from a [`ValidationRules`] description
#[derive(Debug, Clone, Default)]
pub struct Validator {
    rules: ValidationRules,
}

impl Validator {
    pub fn new(rules: ValidationRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }

    /// Evaluate every rule and collect all error messages.
    pub fn validate(&self, form_data: &FormData, client_id: Option<&ClientId>) -> Vec<String> {
        let mut errors = Vec::new();

        for field in &self.rules.required {
            if is_missing(form_data.get(field)) {
                errors.push(format!("{} is required", humanize_field_name(field)));
            }
        }

        for field in &self.rules.email {
            if let Some(text) = present_text(form_data.get(field)) {
                if !EMAIL_RE.is_match(&text) {
                    errors.push(format!(
                        "{} must be a valid email address",
                        humanize_field_name(field)
                    ));
                }
            }
        }

        for field in &self.rules.phone {
            if let Some(text) = present_text(form_data.get(field)) {
                let digits = text.chars().filter(char::is_ascii_digit).count();
                if digits != 10 {
                    errors.push(format!(
                        "{} must be a valid 10-digit phone number",
                        humanize_field_name(field)
                    ));
                }
            }
        }

        for (field, minimum) in &self.rules.min_length {
            let value = form_data.get(field);
            if is_falsy(value) {
                continue;
            }
            if let Some(length) = value.and_then(value_length) {
                if length < *minimum {
                    errors.push(format!(
                        "{} must be at least {} characters",
                        humanize_field_name(field),
                        minimum
                    ));
                }
            }
        }

        for (field, predicate) in &self.rules.custom {
            let value = form_data.get(field).unwrap_or(&Value::Null);
            match predicate(value, form_data, client_id) {
                RuleVerdict::Valid => {}
                RuleVerdict::Invalid => {
                    errors.push(format!("{} is invalid", humanize_field_name(field)));
                }
                RuleVerdict::Message(message) if message.is_empty() => {
                    errors.push(format!("{} is invalid", humanize_field_name(field)));
                }
                RuleVerdict::Message(message) => errors.push(message),
            }
        }

        errors
    }

    /// Like [`Validator::validate`], but a missing client short-circuits every
    /// other rule with [`NO_CLIENT_SELECTED`].
    pub fn validate_with_client(
        &self,
        form_data: &FormData,
        client_id: Option<&ClientId>,
    ) -> Vec<String> {
        match present_client(client_id) {
            None => vec![NO_CLIENT_SELECTED.to_string()],
            Some(client) => self.validate(form_data, Some(client)),
        }
    }
}

/// Build a validator closure from a rule-set description.
pub fn create_validator(
    rules: ValidationRules,
) -> impl Fn(&FormData, Option<&ClientId>) -> Vec<String> {
    let validator = Validator::new(rules);
    move |form_data, client_id| validator.validate(form_data, client_id)
}

/// Build a validator closure that also requires a selected client.
pub fn create_client_validator(
    rules: ValidationRules,
) -> impl Fn(&FormData, Option<&ClientId>) -> Vec<String> {
    let validator = Validator::new(rules);
    move |form_data, client_id| validator.validate_with_client(form_data, client_id)
}

/// `clientMedConditions` -> `client med conditions`
pub fn humanize_field_name(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 4);
    for ch in field.chars() {
        if ch.is_uppercase() {
            out.push(' ');
        }
        out.extend(ch.to_lowercase());
    }
    out.trim().to_string()
}

/// `local@domain.tld` shape
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

/// JavaScript-style falsiness: null, absent, false, 0 and the empty string.
fn is_falsy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Bool(flag)) => !flag,
        Some(Value::Number(n)) => n.as_f64().map_or(false, |f| f == 0.0 || f.is_nan()),
        Some(Value::String(text)) => text.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => false,
    }
}

/// Required-field check: falsy, or a string that is blank after trimming.
fn is_missing(value: Option<&Value>) -> bool {
    match value {
        Some(Value::String(text)) => text.trim().is_empty(),
        other => is_falsy(other),
    }
}

/// Text form of a present (truthy) scalar value.
fn present_text(value: Option<&Value>) -> Option<String> {
    if is_falsy(value) {
        return None;
    }
    match value? {
        Value::String(text) => Some(text.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Array(_) | Value::Object(_) | Value::Null => None,
    }
}

fn value_length(value: &Value) -> Option<usize> {
    match value {
        Value::String(text) => Some(text.chars().count()),
        Value::Array(items) => Some(items.len()),
        Value::Number(n) => Some(n.to_string().chars().count()),
        _ => None,
    }
}
