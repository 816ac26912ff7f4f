//! Configuration types for the payroll engine.
//!
//! This module contains the strongly-typed configuration structures that
//! are deserialized from YAML configuration files.

use std::path::PathBuf;

use serde::Deserialize;

use crate::models::Formula;

/// A formula seed file: a list of formula versions.
#[derive(Debug, Clone, Deserialize)]
pub struct FormulaSeedFile {
    /// The formulas defined by the file.
    pub formulas: Vec<Formula>,
}

fn default_max_future_months() -> u32 {
    12
}

fn default_batch_concurrency() -> usize {
    4
}

/// Runtime settings for the payroll engine.
///
/// Every field has a default so an empty file is a valid configuration.
///
/// # Example
///
/// ```
/// use payroll_engine::config::EngineSettings;
///
/// let settings: EngineSettings = serde_yaml::from_str("batch_concurrency: 16").unwrap();
/// assert_eq!(settings.batch_concurrency, 16);
/// assert_eq!(settings.max_future_months, 12);
/// assert!(settings.formula_dir.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSettings {
    /// How far ahead of today a payment period may be generated.
    #[serde(default = "default_max_future_months")]
    pub max_future_months: u32,
    /// Maximum number of employees processed concurrently in a batch.
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,
    /// Directory of formula seed files; the built-in tables when absent.
    #[serde(default)]
    pub formula_dir: Option<PathBuf>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_future_months: default_max_future_months(),
            batch_concurrency: default_batch_concurrency(),
            formula_dir: None,
        }
    }
}
