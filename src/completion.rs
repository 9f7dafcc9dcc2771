//! Completion Calculator
//!
//! Scores how filled out a form is against a field checklist.

use serde_json::Value;

use crate::types::FormData;

/// Whether a single value counts as filled.
///
/// Arrays must be non-empty, booleans must be `true`, objects need at least one
/// key; everything else only has to be present and not an empty string.
pub fn is_filled(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Number(_)) => true,
    }
}

/// Percentage (0..=100) of checklist fields that are filled in `form_data`.
///
/// The checklist is `total_fields` when non-empty, otherwise `required_fields`.
/// An empty checklist scores 0.
pub fn calculate_form_completion<S: AsRef<str>>(
    form_data: &FormData,
    required_fields: &[S],
    total_fields: &[S],
) -> u8 {
    let fields = if total_fields.is_empty() {
        required_fields
    } else {
        total_fields
    };

    if fields.is_empty() {
        return 0;
    }

    let filled = fields
        .iter()
        .filter(|field| is_filled(form_data.get(field.as_ref())))
        .count();

    percentage(filled, fields.len())
}

/// round(100 * part / whole), 0 when `whole` is zero, clamped to 100.
pub(crate) fn percentage(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 0;
    }
    let ratio = (100.0 * part as f64 / whole as f64).round();
    ratio.clamp(0.0, 100.0) as u8
}
