//! The formula catalog: versioned, date-effective statutory formulas.
//!
//! The catalog is filled once at startup (see [`FormulaCatalog::seed`]) and is
//! read-only afterwards, so lookups from concurrent payroll workers only ever
//! take the read side of its lock.

use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use crate::models::{Formula, FormulaCategory, FormulaType};

/// Outcome of seeding the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Ids of formulas that were inserted.
    pub inserted: Vec<String>,
    /// Ids of formulas that already existed and were left untouched.
    pub skipped: Vec<String>,
}

/// Stores formula versions and resolves the one in effect for a date.
///
/// # Example
///
/// ```
/// use payroll_engine::catalog::FormulaCatalog;
/// use payroll_engine::config::FormulaLoader;
/// use payroll_engine::models::{FormulaCategory, FormulaType};
/// use chrono::NaiveDate;
///
/// let catalog = FormulaCatalog::new();
/// catalog.seed(FormulaLoader::builtin().unwrap()).unwrap();
///
/// let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
/// let nssf = catalog
///     .resolve(FormulaType::Deduction, &FormulaCategory::SocialSecurityFund, date, None)
///     .unwrap();
/// assert_eq!(nssf.version, "2025-02");
/// ```
#[derive(Debug, Default)]
pub struct FormulaCatalog {
    formulas: RwLock<Vec<Arc<Formula>>>,
}

impl FormulaCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of formulas stored.
    pub fn len(&self) -> usize {
        self.formulas.read().len()
    }

    /// Returns true when nothing has been seeded yet.
    pub fn is_empty(&self) -> bool {
        self.formulas.read().is_empty()
    }

    /// Looks up a formula by id.
    pub fn get(&self, id: &str) -> Option<Arc<Formula>> {
        self.formulas.read().iter().find(|f| f.id == id).cloned()
    }

    /// All versions of a type and category, oldest first.
    pub fn versions(&self, formula_type: FormulaType, category: &FormulaCategory) -> Vec<Arc<Formula>> {
        let mut versions: Vec<Arc<Formula>> = self
            .formulas
            .read()
            .iter()
            .filter(|f| f.formula_type == formula_type && &f.category == category)
            .cloned()
            .collect();
        versions.sort_by_key(|f| f.effective_from);
        versions
    }

    /// Every formula in the catalog, grouped by type and category.
    pub fn all(&self) -> Vec<Arc<Formula>> {
        let mut all: Vec<Arc<Formula>> = self.formulas.read().iter().cloned().collect();
        all.sort_by(|a, b| {
            (a.formula_type as u8, a.category.as_str(), a.effective_from).cmp(&(
                b.formula_type as u8,
                b.category.as_str(),
                b.effective_from,
            ))
        });
        all
    }

    /// Inserts a single formula.
    ///
    /// Fails with `FormulaIntegrity` if the formula is structurally invalid,
    /// its id already exists, or it collides with another version of the same
    /// type and category (same version label, same effective date, or a
    /// second current row).
    pub fn insert(&self, formula: Formula) -> EngineResult<()> {
        let mut formulas = self.formulas.write();
        Self::check_insert(&formulas, &formula)?;
        formulas.push(Arc::new(formula));
        Ok(())
    }

    /// Installs seed formulas, skipping ids that are already present.
    ///
    /// Seeding is all-or-nothing: if any new formula is invalid, nothing is
    /// inserted. Running the same seed twice is a no-op.
    pub fn seed(&self, seeds: impl IntoIterator<Item = Formula>) -> EngineResult<SeedReport> {
        let mut formulas = self.formulas.write();
        let mut staged: Vec<Arc<Formula>> = formulas.clone();
        let mut report = SeedReport::default();

        for formula in seeds {
            if staged.iter().any(|f| f.id == formula.id) {
                report.skipped.push(formula.id);
                continue;
            }
            Self::check_insert(&staged, &formula)?;
            report.inserted.push(formula.id.clone());
            staged.push(Arc::new(formula));
        }

        *formulas = staged;
        info!(
            inserted = report.inserted.len(),
            skipped = report.skipped.len(),
            total = formulas.len(),
            "Formula catalog seeded"
        );
        Ok(report)
    }

    /// Resolves the formula in effect for `formula_type`/`category` on `as_of`.
    ///
    /// Resolution order:
    /// 1. `override_id`, if given, is returned regardless of date. It must
    ///    exist and be of the requested type and category.
    /// 2. The matching formula with the latest `effective_from <= as_of`.
    /// 3. The matching formula flagged `is_current`.
    ///
    /// Fails with `FormulaNotFound` when none applies; there is no default
    /// for statutory values.
    pub fn resolve(
        &self,
        formula_type: FormulaType,
        category: &FormulaCategory,
        as_of: NaiveDate,
        override_id: Option<&str>,
    ) -> EngineResult<Arc<Formula>> {
        if let Some(id) = override_id {
            let formula = self
                .get(id)
                .ok_or_else(|| EngineError::FormulaOverrideNotFound { id: id.to_string() })?;
            if formula.formula_type != formula_type || &formula.category != category {
                return Err(EngineError::integrity(
                    id,
                    format!(
                        "pinned as {} formula for '{}' but it is a {} formula for '{}'",
                        formula_type, category, formula.formula_type, formula.category
                    ),
                ));
            }
            debug!(formula_id = %id, "Using pinned formula");
            return Ok(formula);
        }

        let formulas = self.formulas.read();
        let candidates = formulas
            .iter()
            .filter(|f| f.formula_type == formula_type && &f.category == category);

        let dated = candidates
            .clone()
            .filter(|f| f.effective_from <= as_of)
            .max_by_key(|f| f.effective_from);

        if let Some(formula) = dated {
            return Ok(Arc::clone(formula));
        }

        candidates
            .clone()
            .find(|f| f.is_current)
            .map(|f| {
                debug!(
                    formula_id = %f.id,
                    as_of = %as_of,
                    "No formula effective on date, falling back to current"
                );
                Arc::clone(f)
            })
            .ok_or_else(|| EngineError::FormulaNotFound {
                formula_type,
                category: category.clone(),
                date: as_of,
            })
    }

    fn check_insert(existing: &[Arc<Formula>], formula: &Formula) -> EngineResult<()> {
        formula.validate()?;

        if existing.iter().any(|f| f.id == formula.id) {
            return Err(EngineError::integrity(&formula.id, "duplicate formula id"));
        }

        for other in existing
            .iter()
            .filter(|f| f.formula_type == formula.formula_type && f.category == formula.category)
        {
            if other.version == formula.version {
                return Err(EngineError::integrity(
                    &formula.id,
                    format!("version {} already defined by '{}'", formula.version, other.id),
                ));
            }
            if other.effective_from == formula.effective_from {
                return Err(EngineError::integrity(
                    &formula.id,
                    format!(
                        "effective date {} already taken by '{}'",
                        formula.effective_from, other.id
                    ),
                ));
            }
            if other.is_current && formula.is_current {
                return Err(EngineError::integrity(
                    &formula.id,
                    format!("'{}' is already the current formula", other.id),
                ));
            }
        }

        Ok(())
    }
}
