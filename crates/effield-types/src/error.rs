// ─────────────────────────────────────────────────────────────────────
// Effective-Field Kernel — Error Hierarchy
// ─────────────────────────────────────────────────────────────────────

use thiserror::Error;

/// Root error type for all effective-field solver failures.
///
/// Degenerate-but-valid inputs (an isosurface level outside the field
/// range, an all-zero anisotropy source) are not errors: they produce
/// empty or zero results.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    /// Non-positive spacing or screening length, mismatched field shapes,
    /// out-of-range solver settings.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// ODE integrator could not reach the requested tolerance.
    #[error("integration failure: {0}")]
    IntegrationFailure(String),

    /// Numerical error (NaN/Inf produced where a finite value is required).
    #[error("numerical error: {0}")]
    Numerical(String),

    /// Configuration could not be parsed or failed validation.
    #[error("config error: {0}")]
    Config(String),
}

impl FieldError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }
}

pub type FieldResult<T> = Result<T, FieldError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_keeps_message() {
        let e = FieldError::IntegrationFailure("step size underflow at u=-2.3".into());
        assert_eq!(
            e.to_string(),
            "integration failure: step size underflow at u=-2.3"
        );
    }

    #[test]
    fn test_invalid_helper() {
        let e = FieldError::invalid("spacing must be > 0");
        assert!(matches!(e, FieldError::InvalidParameter(_)));
    }
}
