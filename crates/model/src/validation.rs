//! `validateConfig()`'s return shape (spec.md §4.1): `{valid, errors[]}`.
//! Pure and side-effect free — every driver's `validate_config()` builds
//! one of these without touching a client or connection, and
//! `initialize()` fails fast when `valid` is `false` (spec.md §4.1 (a)).

use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        ValidationResult {
            valid: true,
            errors: Vec::new(),
        }
    }

    /// Builds the result from whatever errors were collected; `valid` is
    /// `true` only when the list is empty (spec.md §4.1: "Fails with
    /// collected list; never throws").
    pub fn from_errors(errors: Vec<String>) -> Self {
        ValidationResult {
            valid: errors.is_empty(),
            errors,
        }
    }

    pub fn push(&mut self, error: impl Into<String>) {
        self.valid = false;
        self.errors.push(error.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_has_no_errors() {
        let result = ValidationResult::ok();
        assert!(result.valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn pushing_an_error_flips_valid_to_false() {
        let mut result = ValidationResult::ok();
        result.push("batchConcurrency must be >= 1");
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
    }
}
