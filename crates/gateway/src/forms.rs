//! Unit input shared by the JSON API and the admin forms

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use unitforge_common::errors::AppError;
use validator::{Validate, ValidationError, ValidationErrors};

const MAX_LEN: u64 = 255;

/// Name, shortcut and optional explicit code of a unit
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UnitInput {
    #[validate(custom(function = "not_blank"), length(max = 255))]
    pub name: String,

    #[validate(custom(function = "not_blank"), length(max = 255))]
    pub shortcut: String,

    /// Ignored on edit
    #[validate(length(max = 255))]
    pub code: Option<String>,
}

impl UnitInput {
    /// Explicit code, with blank treated as absent
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("required").with_message(Cow::Borrowed("is required")));
    }
    Ok(())
}

/// One message per invalid field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Flatten validator output, sorted by field name
pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut out: Vec<FieldError> = errors
        .field_errors()
        .into_iter()
        .filter_map(|(field, errs)| {
            let err = errs.first()?;
            let message = match &err.message {
                Some(message) => message.to_string(),
                None if err.code == "length" => format!("must be at most {} characters", MAX_LEN),
                None => "is invalid".to_string(),
            };
            Some(FieldError {
                field: field.to_string(),
                message,
            })
        })
        .collect();
    out.sort_by(|a, b| a.field.cmp(&b.field));
    out
}

/// First field error as an API error
pub fn to_app_error(errors: &ValidationErrors) -> AppError {
    match field_errors(errors).into_iter().next() {
        Some(e) => AppError::Validation {
            message: format!("{} {}", e.field, e.message),
            field: Some(e.field),
        },
        None => AppError::Validation {
            message: "invalid input".to_string(),
            field: None,
        },
    }
}
