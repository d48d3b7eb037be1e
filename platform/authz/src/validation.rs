//! Input checks and free-text cleanup, injected into the services.

use platform_api::ValidationErrors;
use uuid::Uuid;

use crate::config::AuthzConfig;

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '*' | '@' | '-')
}

#[derive(Clone, Debug)]
pub struct Validator {
    max_name_len: usize,
    max_text_len: usize,
}

impl Validator {
    pub fn new(config: &AuthzConfig) -> Self {
        Self {
            max_name_len: config.max_name_len,
            max_text_len: config.max_text_len,
        }
    }

    /// Resource, action, scope and subject identifiers.
    pub fn name(&self, errors: &mut ValidationErrors, field: &str, value: &str) {
        if value.is_empty() {
            errors.required(field);
        } else if value.chars().count() > self.max_name_len {
            errors.invalid(
                field,
                format!("{field} must be at most {} characters", self.max_name_len),
            );
        } else if !value.chars().all(is_name_char) {
            errors.invalid(field, format!("{field} contains unsupported characters"));
        }
    }

    pub fn optional_name(&self, errors: &mut ValidationErrors, field: &str, value: Option<&str>) {
        if let Some(value) = value {
            self.name(errors, field, value);
        }
    }

    pub fn id(&self, errors: &mut ValidationErrors, field: &str, value: Uuid) {
        if value.is_nil() {
            errors.required(field);
        }
    }

    pub fn text(&self, errors: &mut ValidationErrors, field: &str, value: Option<&str>) {
        if let Some(value) = value {
            if value.chars().count() > self.max_text_len {
                errors.invalid(
                    field,
                    format!("{field} must be at most {} characters", self.max_text_len),
                );
            }
        }
    }

    pub fn etag(&self, errors: &mut ValidationErrors, field: &str, value: &str) {
        if value.trim().is_empty() {
            errors.required(field);
        }
    }
}

/// Normalizes comments and attachment references before they are stored.
#[derive(Clone, Debug, Default)]
pub struct Sanitizer;

impl Sanitizer {
    /// Trims, strips control characters other than newline and tab, and
    /// turns blank input into `None`.
    pub fn text(&self, value: Option<String>) -> Option<String> {
        let cleaned: String = value?
            .chars()
            .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
            .collect();
        let trimmed = cleaned.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform_api::FieldErrorKind;

    fn validator() -> Validator {
        Validator::new(&AuthzConfig {
            max_name_len: 8,
            max_text_len: 5,
        })
    }

    #[test]
    fn names_follow_charset_and_length() {
        let v = validator();
        let mut errors = ValidationErrors::new();
        v.name(&mut errors, "actionName", "read:all");
        assert!(errors.is_empty());

        v.name(&mut errors, "actionName", "");
        v.name(&mut errors, "resourceName", "far-too-long");
        v.name(&mut errors, "subjectRef", "bad name");
        let err = errors.into_client_error();
        assert_eq!(err.fields.len(), 3);
        assert_eq!(err.fields[0].kind, FieldErrorKind::Required);
        assert_eq!(err.fields[1].kind, FieldErrorKind::Invalid);
        assert_eq!(err.fields[2].field, "subjectRef");
    }

    #[test]
    fn nil_ids_are_missing() {
        let mut errors = ValidationErrors::new();
        validator().id(&mut errors, "targetRef", Uuid::nil());
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn long_text_is_rejected() {
        let mut errors = ValidationErrors::new();
        validator().text(&mut errors, "comment", Some("abcdef"));
        validator().text(&mut errors, "comment", Some("abc"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn sanitizer_strips_controls_and_blanks() {
        let s = Sanitizer;
        assert_eq!(
            s.text(Some("  hi\u{0007} there\n\tok  ".into())),
            Some("hi there\n\tok".into())
        );
        assert_eq!(s.text(Some(" \u{0000} ".into())), None);
        assert_eq!(s.text(None), None);
    }
}
