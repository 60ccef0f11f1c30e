//! Argument validation.
//!
//! Requests validate their inputs through the [`Validator`] trait before touching the
//! engine. [`NameValidator`] is the default implementation for table names:
//!
//! - not empty and at most [`TABLE_NAME_MAX_LENGTH`] characters
//! - first character is an ASCII letter or `_`
//! - remaining characters are ASCII letters, digits, `_` or `$`
use crate::Status;

pub const TABLE_NAME_MAX_LENGTH: usize = 255;

pub trait Validator: Send + Sync {
    fn validate_name(&self, name: &str) -> Result<(), Status>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NameValidator;

impl Validator for NameValidator {
    fn validate_name(&self, name: &str) -> Result<(), Status> {
        if name.is_empty() {
            return Err(Status::invalid_argument("table name should not be empty"));
        }

        if name.chars().count() > TABLE_NAME_MAX_LENGTH {
            return Err(Status::invalid_argument(format!(
                "invalid table name '{name}', length should be less than {TABLE_NAME_MAX_LENGTH}"
            )));
        }

        let mut chars = name.chars();
        if let Some(first) = chars.next() {
            if first != '_' && !first.is_ascii_alphabetic() {
                return Err(Status::invalid_argument(format!(
                    "invalid table name '{name}', the first character must be an underscore or letter"
                )));
            }
        }

        if chars.any(|c| c != '_' && c != '$' && !c.is_ascii_alphanumeric()) {
            return Err(Status::invalid_argument(format!(
                "invalid table name '{name}', only underscores, dollar signs, letters and numbers are allowed"
            )));
        }

        Ok(())
    }
}
