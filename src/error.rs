//! Error types for the payroll engine.
//!
//! This module provides strongly-typed errors using the `thiserror` crate
//! for all error conditions that can occur while resolving formulas,
//! computing deductions and persisting payslips.

use chrono::NaiveDate;
use thiserror::Error;

use crate::models::{FormulaCategory, FormulaType};

/// The main error type for the payroll engine.
///
/// The variants fall into three groups that callers treat differently:
/// validation failures are recovered and reported, missing formulas are fatal
/// for one payslip, and integrity failures indicate broken configuration.
///
/// # Example
///
/// ```
/// use payroll_engine::error::EngineError;
///
/// let error = EngineError::ConfigNotFound {
///     path: "/missing/formulas".to_string(),
/// };
/// assert_eq!(error.to_string(), "Configuration file not found: /missing/formulas");
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration file was not found at the specified path.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Configuration file could not be parsed.
    #[error("Failed to parse configuration file '{path}': {message}")]
    ConfigParseError {
        /// The path to the file that failed to parse.
        path: String,
        /// A description of the parse error.
        message: String,
    },

    /// No formula is in effect for the requested type, category and date.
    #[error("No {formula_type} formula for category '{category}' in effect on {date}")]
    FormulaNotFound {
        /// The formula type that was requested.
        formula_type: FormulaType,
        /// The category that was requested.
        category: FormulaCategory,
        /// The date the formula had to be in effect on.
        date: NaiveDate,
    },

    /// A pinned formula id does not exist in the catalog.
    #[error("Pinned formula not found: {id}")]
    FormulaOverrideNotFound {
        /// The formula id that was pinned.
        id: String,
    },

    /// A formula is structurally broken (overlapping brackets, missing split, ...).
    #[error("Formula '{formula_id}' is misconfigured: {message}")]
    FormulaIntegrity {
        /// The id of the offending formula.
        formula_id: String,
        /// A description of the problem.
        message: String,
    },

    /// Input failed validation; reported to the caller, never fatal.
    #[error("Validation failed for '{field}': {message}")]
    Validation {
        /// The field or concern that failed validation.
        field: String,
        /// A description of what made the input invalid.
        message: String,
    },

    /// A referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of record (e.g. "employee", "payslip").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// A general calculation error occurred.
    #[error("Calculation error: {message}")]
    CalculationError {
        /// A description of the calculation error.
        message: String,
    },
}

impl EngineError {
    /// Shorthand for building a [`EngineError::Validation`].
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Shorthand for building a [`EngineError::FormulaIntegrity`].
    pub fn integrity(formula_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FormulaIntegrity {
            formula_id: formula_id.into(),
            message: message.into(),
        }
    }

    /// Returns true for errors that are expected outcomes of bad input rather
    /// than configuration faults.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::NotFound { .. })
    }
}

/// A type alias for Results that return EngineError.
pub type EngineResult<T> = Result<T, EngineError>;
