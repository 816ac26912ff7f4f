//! Configuration loading functionality.
//!
//! This module provides [`FormulaLoader`] for reading formula seed files and
//! the loader for [`EngineSettings`].

use std::fs;
use std::path::Path;

use crate::error::{EngineError, EngineResult};
use crate::models::Formula;

use super::types::{EngineSettings, FormulaSeedFile};

/// The seed files compiled into the binary.
const BUILTIN_SEEDS: [(&str, &str); 4] = [
    ("income.yaml", include_str!("../../config/formulas/income.yaml")),
    ("nssf.yaml", include_str!("../../config/formulas/nssf.yaml")),
    ("shif.yaml", include_str!("../../config/formulas/shif.yaml")),
    (
        "housing_levy.yaml",
        include_str!("../../config/formulas/housing_levy.yaml"),
    ),
];

/// Reads formula seed files.
///
/// # Directory Structure
///
/// A formula directory holds any number of YAML files, each with a top-level
/// `formulas` list:
/// ```text
/// config/formulas/
/// ├── income.yaml        # PAYE tables and deduction orders
/// ├── nssf.yaml          # Social security tiers
/// ├── shif.yaml          # NHIF / SHIF
/// └── housing_levy.yaml
/// ```
///
/// Files are read in name order so seeding is deterministic.
pub struct FormulaLoader;

impl FormulaLoader {
    /// Loads every `.yaml` file in `path`.
    ///
    /// Returns an error if the directory is missing, contains no seed files,
    /// or any file fails to parse.
    pub fn load_dir<P: AsRef<Path>>(path: P) -> EngineResult<Vec<Formula>> {
        let path = path.as_ref();
        let dir_str = path.display().to_string();

        if !path.exists() {
            return Err(EngineError::ConfigNotFound { path: dir_str });
        }

        let entries = fs::read_dir(path).map_err(|_| EngineError::ConfigNotFound {
            path: dir_str.clone(),
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|_| EngineError::ConfigNotFound {
                path: dir_str.clone(),
            })?;
            let file = entry.path();
            if file.extension().is_some_and(|ext| ext == "yaml" || ext == "yml") {
                files.push(file);
            }
        }
        files.sort();

        if files.is_empty() {
            return Err(EngineError::ConfigNotFound {
                path: format!("{} (no formula files found)", dir_str),
            });
        }

        let mut formulas = Vec::new();
        for file in files {
            formulas.extend(Self::load_file(&file)?);
        }
        Ok(formulas)
    }

    /// Loads a single seed file.
    pub fn load_file<P: AsRef<Path>>(path: P) -> EngineResult<Vec<Formula>> {
        let seed: FormulaSeedFile = load_yaml(path.as_ref())?;
        Ok(seed.formulas)
    }

    /// Parses seed formulas from YAML text; `origin` names the source in errors.
    pub fn parse(origin: &str, content: &str) -> EngineResult<Vec<Formula>> {
        serde_yaml::from_str::<FormulaSeedFile>(content)
            .map(|seed| seed.formulas)
            .map_err(|e| EngineError::ConfigParseError {
                path: origin.to_string(),
                message: e.to_string(),
            })
    }

    /// The built-in Kenyan statutory tables.
    pub fn builtin() -> EngineResult<Vec<Formula>> {
        let mut formulas = Vec::new();
        for (name, content) in BUILTIN_SEEDS {
            formulas.extend(Self::parse(&format!("builtin:{}", name), content)?);
        }
        Ok(formulas)
    }
}

impl EngineSettings {
    /// Loads settings from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        load_yaml(path.as_ref())
    }
}

/// Loads and parses a YAML file.
pub(crate) fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> EngineResult<T> {
    let path_str = path.display().to_string();

    let content = fs::read_to_string(path).map_err(|_| EngineError::ConfigNotFound {
        path: path_str.clone(),
    })?;

    serde_yaml::from_str(&content).map_err(|e| EngineError::ConfigParseError {
        path: path_str,
        message: e.to_string(),
    })
}
