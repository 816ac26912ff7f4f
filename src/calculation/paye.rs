//! PAYE (Pay As You Earn) income tax with personal relief.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::catalog::FormulaCatalog;
use crate::error::EngineResult;
use crate::models::{AuditStep, FormulaCategory, FormulaType};

use super::bracket::apply_brackets;

/// The result of a PAYE calculation. Amounts are unrounded.
#[derive(Debug, Clone)]
pub struct PayeResult {
    /// The income formula used.
    pub formula_id: String,
    /// The version of the income formula used.
    pub formula_version: String,
    /// Tax on taxable pay before relief.
    pub paye: Decimal,
    /// The personal relief configured on the formula.
    pub personal_relief: Decimal,
    /// The relief actually applied: `min(personal_relief, paye)`.
    pub relief: Decimal,
    /// Tax withheld: `max(0, paye - personal_relief)`.
    pub net_paye: Decimal,
    /// The audit step recording this calculation.
    pub audit_step: AuditStep,
}

/// Computes PAYE on `taxable` pay.
///
/// The income formula for `category` is resolved as of `as_of` (or taken from
/// `override_id`), its brackets are applied marginally, and the formula's
/// personal relief is subtracted. Relief never makes the tax negative.
///
/// # Examples
///
/// ```
/// use payroll_engine::calculation::calculate_paye;
/// use payroll_engine::catalog::FormulaCatalog;
/// use payroll_engine::config::FormulaLoader;
/// use payroll_engine::models::FormulaCategory;
/// use chrono::NaiveDate;
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
///
/// let catalog = FormulaCatalog::new();
/// catalog.seed(FormulaLoader::builtin().unwrap()).unwrap();
///
/// let result = calculate_paye(
///     &catalog,
///     Decimal::from_str("44681.14").unwrap(),
///     NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
///     &FormulaCategory::Primary,
///     None,
/// )
/// .unwrap();
/// assert_eq!(result.paye, Decimal::from_str("8187.692").unwrap());
/// assert_eq!(result.net_paye, Decimal::from_str("5787.692").unwrap());
/// ```
pub fn calculate_paye(
    catalog: &FormulaCatalog,
    taxable: Decimal,
    as_of: NaiveDate,
    category: &FormulaCategory,
    override_id: Option<&str>,
) -> EngineResult<PayeResult> {
    let formula = catalog.resolve(FormulaType::Income, category, as_of, override_id)?;
    let outcome = apply_brackets(taxable.max(Decimal::ZERO), &formula)?;

    let paye = outcome.total;
    let personal_relief = formula.relief();
    let relief = personal_relief.min(paye);
    let net_paye = (paye - personal_relief).max(Decimal::ZERO);

    let audit_step = AuditStep {
        step_number: 0,
        rule_id: "paye".to_string(),
        rule_name: "PAYE".to_string(),
        formula_ref: format!("{}@{}", formula.id, formula.version),
        input: serde_json::json!({
            "taxable_pay": taxable.normalize().to_string(),
            "category": category.as_str(),
            "as_of": as_of.to_string(),
            "pinned": override_id.is_some(),
        }),
        output: serde_json::json!({
            "paye": paye.normalize().to_string(),
            "personal_relief": personal_relief.normalize().to_string(),
            "relief_applied": relief.normalize().to_string(),
            "net_paye": net_paye.normalize().to_string(),
            "brackets_touched": outcome.slices.len(),
        }),
        reasoning: format!(
            "Tax on {} using {} v{} = {}; less relief {} = {}",
            taxable.normalize(),
            formula.id,
            formula.version,
            paye.normalize(),
            personal_relief.normalize(),
            net_paye.normalize()
        ),
    };

    Ok(PayeResult {
        formula_id: formula.id.clone(),
        formula_version: formula.version.clone(),
        paye,
        personal_relief,
        relief,
        net_paye,
        audit_step,
    })
}
