//! Field-level client errors shared by every service that validates input.

use serde::Serialize;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldErrorKind {
    Required,
    Invalid,
    NotFound,
    AlreadyExists,
    ConstraintViolated,
    EtagMismatch,
    InvalidState,
    Forbidden,
}

impl FieldErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            FieldErrorKind::Required => "REQUIRED",
            FieldErrorKind::Invalid => "INVALID",
            FieldErrorKind::NotFound => "NOT_FOUND",
            FieldErrorKind::AlreadyExists => "ALREADY_EXISTS",
            FieldErrorKind::ConstraintViolated => "CONSTRAINT_VIOLATED",
            FieldErrorKind::EtagMismatch => "ETAG_MISMATCH",
            FieldErrorKind::InvalidState => "INVALID_STATE",
            FieldErrorKind::Forbidden => "FORBIDDEN",
        }
    }
}

/// One failed input field. `field` uses the camelCase name of the input.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    #[serde(rename = "code")]
    pub kind: FieldErrorKind,
    pub message: String,
}

/// Error the caller can act on; never carries storage details.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ClientError {
    pub code: &'static str,
    pub message: String,
    pub fields: Vec<FieldError>,
}

impl ClientError {
    pub fn field(field: &str, kind: FieldErrorKind, message: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.push(field, kind, message);
        errors.into_client_error()
    }

    /// True when every field error has the given kind.
    pub fn is(&self, kind: FieldErrorKind) -> bool {
        !self.fields.is_empty() && self.fields.iter().all(|f| f.kind == kind)
    }
}

/// Accumulates field errors for one validation step.
#[derive(Clone, Debug, Default)]
pub struct ValidationErrors {
    fields: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, kind: FieldErrorKind, message: impl Into<String>) {
        self.fields.push(FieldError {
            field: field.to_string(),
            kind,
            message: message.into(),
        });
    }

    pub fn required(&mut self, field: &str) {
        self.push(field, FieldErrorKind::Required, format!("{field} is required"));
    }

    pub fn invalid(&mut self, field: &str, message: impl Into<String>) {
        self.push(field, FieldErrorKind::Invalid, message);
    }

    pub fn not_found(&mut self, field: &str, message: impl Into<String>) {
        self.push(field, FieldErrorKind::NotFound, message);
    }

    pub fn already_exists(&mut self, field: &str, message: impl Into<String>) {
        self.push(field, FieldErrorKind::AlreadyExists, message);
    }

    pub fn constraint_violated(&mut self, field: &str, message: impl Into<String>) {
        self.push(field, FieldErrorKind::ConstraintViolated, message);
    }

    pub fn etag_mismatch(&mut self, field: &str) {
        self.push(
            field,
            FieldErrorKind::EtagMismatch,
            "the record was modified by someone else; reload and retry",
        );
    }

    pub fn invalid_state(&mut self, field: &str, message: impl Into<String>) {
        self.push(field, FieldErrorKind::InvalidState, message);
    }

    pub fn forbidden(&mut self, field: &str, message: impl Into<String>) {
        self.push(field, FieldErrorKind::Forbidden, message);
    }

    pub fn append(&mut self, other: ValidationErrors) {
        self.fields.extend(other.fields);
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// `Ok(())` when nothing was recorded, otherwise the batch as one error.
    pub fn into_result(self) -> Result<(), ClientError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self.into_client_error())
        }
    }

    pub fn into_client_error(self) -> ClientError {
        let code = match self.fields.first() {
            Some(first) if self.fields.iter().all(|f| f.kind == first.kind) => first.kind.code(),
            Some(_) => "VALIDATION_FAILED",
            None => "INVALID_INPUT",
        };
        let message = match self.fields.as_slice() {
            [] => "invalid input".to_string(),
            [single] => single.message.clone(),
            many => format!("{} fields failed validation", many.len()),
        };
        ClientError {
            code,
            message,
            fields: self.fields,
        }
    }
}

impl From<ValidationErrors> for ClientError {
    fn from(value: ValidationErrors) -> Self {
        value.into_client_error()
    }
}
