use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ApiError;

/// Collects field-level validation errors; the first error per field wins.
#[derive(Debug, Default)]
pub struct Validator {
    pub errors: BTreeMap<String, String>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, key: &str, message: &str) {
        self.errors
            .entry(key.to_string())
            .or_insert_with(|| message.to_string());
    }

    pub fn check(&mut self, ok: bool, key: &str, message: &str) {
        if !ok {
            self.add_error(key, message);
        }
    }

    /// Turns collected errors into a 422 response error.
    pub fn finish(self) -> Result<(), ApiError> {
        if self.valid() {
            Ok(())
        } else {
            Err(ApiError::FailedValidation(self.errors))
        }
    }
}

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_error_per_field_is_kept() {
        let mut v = Validator::new();
        assert!(v.valid());
        v.add_error("email", "must be provided");
        v.add_error("email", "must be a valid email address");
        assert!(!v.valid());
        assert_eq!(v.errors["email"], "must be provided");
    }

    #[test]
    fn check_only_records_failures() {
        let mut v = Validator::new();
        v.check(true, "name", "must be provided");
        assert!(v.finish().is_ok());

        let mut v = Validator::new();
        v.check(false, "name", "must be provided");
        assert!(matches!(v.finish(), Err(ApiError::FailedValidation(e)) if e.contains_key("name")));
    }

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("mike@test.com"));
        assert!(!is_valid_email("mike@test"));
        assert!(!is_valid_email("mike test@test.com"));
        assert!(!is_valid_email(""));
    }
}
