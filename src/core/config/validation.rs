//! Validation helper functions for configuration types.

use crate::core::errors::{LibsiftError, Result};

/// Validate that a usize value is greater than zero.
pub fn validate_positive_usize(value: usize, field: &str) -> Result<()> {
    if value == 0 {
        return Err(LibsiftError::validation_field(
            format!("{} must be greater than 0", field),
            field,
        ));
    }
    Ok(())
}

/// Validate that an f64 value is in the unit range [0.0, 1.0].
pub fn validate_unit_range(value: f64, field: &str) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(LibsiftError::validation_field(
            format!("{} must be between 0.0 and 1.0", field),
            field,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_range() {
        assert!(validate_unit_range(0.0, "t").is_ok());
        assert!(validate_unit_range(1.0, "t").is_ok());
        assert!(validate_unit_range(1.01, "t").is_err());
        assert!(validate_unit_range(f64::NAN, "t").is_err());
    }

    #[test]
    fn test_positive_values() {
        assert!(validate_positive_usize(1, "n").is_ok());
        assert!(validate_positive_usize(0, "n").is_err());
    }
}
