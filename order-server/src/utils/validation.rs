//! Input validation helpers
//!
//! Centralized text length constants and validation functions.

use rust_decimal::Decimal;

use crate::utils::AppError;

// ── Text length limits ──────────────────────────────────────────────

/// Menu item names
pub const MAX_NAME_LEN: usize = 200;

/// Menu category labels
pub const MAX_CATEGORY_LEN: usize = 100;

/// Email addresses (RFC 5321)
pub const MAX_EMAIL_LEN: usize = 254;

/// Passwords (before hashing)
pub const MAX_PASSWORD_LEN: usize = 128;

/// Free-text chat messages
pub const MAX_MESSAGE_LEN: usize = 500;

// ── Money limits ────────────────────────────────────────────────────

/// Menu item prices (1,000,000.00)
pub const MAX_PRICE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

// ── Validation helpers ──────────────────────────────────────────────

/// Validate that a required string is non-empty and within the length limit.
pub fn validate_required_text(value: &str, field: &str, max_len: usize) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} must not be empty")).with_detail("field", field));
    }
    if value.len() > max_len {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            value.len()
        ))
        .with_detail("field", field));
    }
    Ok(())
}

/// Validate that an optional string, if present, is non-empty and within the length limit.
pub fn validate_optional_text(
    value: &Option<String>,
    field: &str,
    max_len: usize,
) -> Result<(), AppError> {
    match value {
        Some(v) => validate_required_text(v, field, max_len),
        None => Ok(()),
    }
}

/// Validate a money amount is not negative and at most [`MAX_PRICE`].
pub fn validate_price(value: Decimal, field: &str) -> Result<(), AppError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(
            AppError::validation(format!("{field} must not be negative")).with_detail("field", field)
        );
    }
    if value > MAX_PRICE {
        return Err(AppError::validation(format!(
            "{field} exceeds maximum allowed ({MAX_PRICE}), got {value}"
        ))
        .with_detail("field", field));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ErrorCode;

    #[test]
    fn test_required_text() {
        assert!(validate_required_text("Mojito", "name", MAX_NAME_LEN).is_ok());

        let err = validate_required_text("   ", "name", MAX_NAME_LEN).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert_eq!(err.details.unwrap().get("field").unwrap(), "name");

        assert!(validate_required_text(&"x".repeat(101), "category", MAX_CATEGORY_LEN).is_err());
    }

    #[test]
    fn test_optional_text() {
        assert!(validate_optional_text(&None, "name", MAX_NAME_LEN).is_ok());
        assert!(validate_optional_text(&Some(String::new()), "name", MAX_NAME_LEN).is_err());
    }

    #[test]
    fn test_price() {
        assert!(validate_price(Decimal::ZERO, "price").is_ok());
        assert!(validate_price("9.50".parse().unwrap(), "price").is_ok());
        assert!(validate_price("-0.01".parse().unwrap(), "price").is_err());
        assert!(validate_price(MAX_PRICE, "price").is_ok());

        let err = validate_price(Decimal::MAX, "price").unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert_eq!(err.details.unwrap().get("field").unwrap(), "price");
    }
}
