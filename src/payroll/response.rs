//! The uniform response envelope returned by payroll generation.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::models::Payslip;

/// Error body of a failed generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// The offending field, for validation errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorDetail {
    /// Creates a new error body.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            field: None,
        }
    }
}

impl From<&EngineError> for ErrorDetail {
    fn from(error: &EngineError) -> Self {
        let code = match error {
            EngineError::Validation { .. } => "VALIDATION_ERROR",
            EngineError::NotFound { .. } => "NOT_FOUND",
            EngineError::FormulaNotFound { .. } | EngineError::FormulaOverrideNotFound { .. } => {
                "FORMULA_NOT_FOUND"
            }
            EngineError::FormulaIntegrity { .. } => "FORMULA_INTEGRITY",
            EngineError::ConfigNotFound { .. } | EngineError::ConfigParseError { .. } => {
                "CONFIG_ERROR"
            }
            EngineError::CalculationError { .. } => "CALCULATION_ERROR",
        };
        let mut detail = Self::new(code, error.to_string());
        if let EngineError::Validation { field, .. } = error {
            detail.field = Some(field.clone());
        }
        detail
    }
}

/// Result of one `generate_payroll` call.
///
/// Exactly one of `payslip` and `error` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollResponse {
    /// Whether generation succeeded.
    pub success: bool,
    /// The payslip, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payslip: Option<Payslip>,
    /// Why generation failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl PayrollResponse {
    /// A successful response carrying `payslip`.
    pub fn ok(payslip: Payslip) -> Self {
        Self {
            success: true,
            payslip: Some(payslip),
            error: None,
        }
    }

    /// A failed response describing `error`.
    pub fn failed(error: &EngineError) -> Self {
        Self {
            success: false,
            payslip: None,
            error: Some(error.into()),
        }
    }

    /// The failure message, if generation failed.
    pub fn detail(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }

    /// The failure code, if generation failed.
    pub fn error_code(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.code.as_str())
    }
}
