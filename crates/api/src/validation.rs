//! Request validation with translated messages.
//!
//! The validator is an ordinary value built once at startup and carried in
//! the application services, so each router (and each test) can hold its own
//! rules and message table.

use std::collections::HashMap;

use validator::{Validate, ValidationErrors};

use keystone_core::DomainError;

/// Message templates keyed by validator error code.
///
/// `{field}`, `{min}` and `{max}` are substituted from the failing rule.
#[derive(Debug, Clone)]
pub struct RequestValidator {
    messages: HashMap<&'static str, &'static str>,
    fallback: &'static str,
}

impl Default for RequestValidator {
    fn default() -> Self {
        Self::english()
    }
}

impl RequestValidator {
    pub fn english() -> Self {
        let messages = HashMap::from([
            ("email", "{field} must be a valid email address"),
            ("length", "{field} must be between {min} and {max} characters"),
            ("length_min", "{field} must be at least {min} characters"),
            ("length_nonempty", "{field} must not be empty"),
            ("bcrypt_bytes", "{field} must be at most {max} bytes"),
            ("required", "{field} is required"),
        ]);

        Self {
            messages,
            fallback: "{field} is invalid",
        }
    }

    pub fn with_message(mut self, code: &'static str, template: &'static str) -> Self {
        self.messages.insert(code, template);
        self
    }

    pub fn validate<T: Validate>(&self, value: &T) -> Result<(), DomainError> {
        value
            .validate()
            .map_err(|errors| DomainError::validation(self.translate(&errors)))
    }

    /// One sentence per failing rule, ordered by field name.
    pub fn translate(&self, errors: &ValidationErrors) -> String {
        let mut lines: Vec<String> = Vec::new();

        for (field, field_errors) in errors.field_errors() {
            let field = field.to_string();
            for error in field_errors.iter() {
                let min = error.params.get("min").map(|v| v.to_string());
                let max = error.params.get("max").map(|v| v.to_string());

                let code = match (&*error.code, min.as_deref(), &max) {
                    ("length", Some("1"), None) => "length_nonempty",
                    ("length", _, None) => "length_min",
                    (code, _, _) => code,
                };
                let template = self.messages.get(code).copied().unwrap_or(self.fallback);

                lines.push(
                    template
                        .replace("{field}", &field)
                        .replace("{min}", min.as_deref().unwrap_or("?"))
                        .replace("{max}", max.as_deref().unwrap_or("?")),
                );
            }
        }

        lines.sort();
        lines.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::dto::{LoginRequest, RegisterRequest};

    fn register(name: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn valid_registration_passes() {
        let v = RequestValidator::english();
        assert!(v.validate(&register("Ann", "ann@x.com", "secret123")).is_ok());
    }

    #[test]
    fn messages_are_translated_and_ordered() {
        let v = RequestValidator::english();
        let err = v.validate(&register("", "nope", "123")).unwrap_err();

        let DomainError::Validation(msg) = err else {
            panic!("expected validation error");
        };
        assert_eq!(
            msg,
            "email must be a valid email address; \
             name must be between 1 and 100 characters; \
             password must be at least 6 characters"
        );
    }

    #[test]
    fn required_fields_read_as_not_empty() {
        let v = RequestValidator::english();
        let err = v
            .validate(&LoginRequest {
                email: String::new(),
                password: "x".to_string(),
            })
            .unwrap_err();

        assert_eq!(err, DomainError::validation("email must not be empty"));
    }

    #[test]
    fn password_limit_counts_bytes() {
        let v = RequestValidator::english();
        let at_limit = "é".repeat(36);
        assert!(v.validate(&register("Ann", "ann@x.com", &at_limit)).is_ok());

        let err = v
            .validate(&register("Ann", "ann@x.com", &format!("{at_limit}tail-one")))
            .unwrap_err();
        assert_eq!(err, DomainError::validation("password must be at most 72 bytes"));
    }

    #[test]
    fn templates_can_be_overridden() {
        let v = RequestValidator::english().with_message("email", "{field}: adresse invalide");
        let err = v.validate(&register("Ann", "nope", "secret123")).unwrap_err();
        assert_eq!(err, DomainError::validation("email: adresse invalide"));
    }
}
