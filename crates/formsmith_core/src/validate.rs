//! Definition and submission validation.
//!
//! Definition checks run when a form is created or replaced; answer
//! checks run on every public submission and collect all violations so
//! a respondent sees every broken field at once.

use chrono::NaiveDate;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{FieldViolation, FormsmithError};
use crate::proto::FieldSpec;
use crate::types::{FieldType, FormField};

/// Check a builder-submitted definition and materialise it into fields
/// with fresh ids and dense ordinals.
pub fn build_fields(title: &str, specs: &[FieldSpec]) -> Result<Vec<FormField>, FormsmithError> {
    if title.trim().is_empty() {
        return Err(FormsmithError::InvalidInput("title must not be empty".into()));
    }
    let mut fields = Vec::with_capacity(specs.len());
    for (i, spec) in specs.iter().enumerate() {
        if spec.label.trim().is_empty() {
            return Err(FormsmithError::InvalidInput(format!(
                "field {i}: label must not be empty"
            )));
        }
        if spec.field_type.is_choice() && spec.options.is_empty() {
            return Err(FormsmithError::InvalidInput(format!(
                "field {i} ({}): choice fields need at least one option",
                spec.label
            )));
        }
        if !spec.field_type.is_choice() && !spec.options.is_empty() {
            return Err(FormsmithError::InvalidInput(format!(
                "field {i} ({}): options are only valid on select/checkbox fields",
                spec.label
            )));
        }
        fields.push(FormField {
            field_id: Uuid::new_v4(),
            ordinal: i as i32,
            label: spec.label.trim().to_string(),
            field_type: spec.field_type,
            required: spec.required,
            options: spec.options.clone(),
        });
    }
    Ok(fields)
}

/// Validate submitted answers against the field definitions.
///
/// Returns the `(field_id, upload_id)` pairs referenced by `file`
/// answers — the caller checks those against storage, since upload
/// existence is not a pure question.
pub fn check_answers(
    fields: &[FormField],
    answers: &Value,
) -> Result<Vec<(Uuid, Uuid)>, FormsmithError> {
    let Some(map) = answers.as_object() else {
        return Err(FormsmithError::InvalidInput(
            "answers must be a JSON object keyed by field id".into(),
        ));
    };

    let mut violations = Vec::new();
    let mut file_refs = Vec::new();

    // Unknown keys are rejected outright — they are builder bugs, not
    // respondent mistakes.
    for key in map.keys() {
        let known = Uuid::parse_str(key)
            .ok()
            .is_some_and(|id| fields.iter().any(|f| f.field_id == id));
        if !known {
            return Err(FormsmithError::InvalidInput(format!(
                "unknown field id in answers: {key}"
            )));
        }
    }

    for field in fields {
        let value = map.get(&field.field_id.to_string());
        let missing = match value {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(Value::Array(a)) => a.is_empty(),
            _ => false,
        };
        if missing {
            if field.required {
                violations.push(violation(field, "answer is required"));
            }
            continue;
        }
        let value = value.expect("present by missing check");

        match field.field_type {
            FieldType::Text | FieldType::Paragraph => {
                if !value.is_string() {
                    violations.push(violation(field, "expected a string"));
                }
            }
            FieldType::Number => {
                if !value.is_number() {
                    violations.push(violation(field, "expected a number"));
                }
            }
            FieldType::Date => match value.as_str() {
                Some(s) if NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() => {}
                _ => violations.push(violation(field, "expected a YYYY-MM-DD date string")),
            },
            FieldType::Select => match value.as_str() {
                Some(s) if field.options.iter().any(|o| o == s) => {}
                _ => violations.push(violation(field, "value is not one of the options")),
            },
            FieldType::Checkbox => match value.as_array() {
                Some(items)
                    if items.iter().all(|v| {
                        v.as_str()
                            .is_some_and(|s| field.options.iter().any(|o| o == s))
                    }) => {}
                _ => violations.push(violation(
                    field,
                    "expected an array of values drawn from the options",
                )),
            },
            FieldType::File => match value.as_str().and_then(|s| Uuid::parse_str(s).ok()) {
                Some(upload_id) => file_refs.push((field.field_id, upload_id)),
                None => violations.push(violation(field, "expected an upload id")),
            },
        }
    }

    if violations.is_empty() {
        Ok(file_refs)
    } else {
        Err(FormsmithError::ValidationFailed(violations))
    }
}

fn violation(field: &FormField, message: &str) -> FieldViolation {
    FieldViolation {
        field_id: field.field_id.to_string(),
        label: field.label.clone(),
        message: message.to_string(),
    }
}
