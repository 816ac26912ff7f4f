//! Contribution calculators and the strategy table that dispatches to them.
//!
//! Every statutory contribution follows the same shape: resolve the formula
//! in effect, run the brackets, divide by the split ratio. The calculators in
//! this module and its siblings differ only in how they report the result.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::FormulaCatalog;
use crate::error::{EngineError, EngineResult};
use crate::models::{AuditStep, Component, Formula};

use super::bracket::{BracketOutcome, apply_brackets};
use super::housing_levy::HousingLevyCalculator;
use super::nssf::NssfCalculator;
use super::shif::ShifCalculator;

/// Inputs shared by every contribution calculation.
#[derive(Debug, Clone, Copy)]
pub struct ContributionContext<'a> {
    /// The catalog formulas are resolved from.
    pub catalog: &'a FormulaCatalog,
    /// The amount the contribution is charged on (gross pay).
    pub amount: Decimal,
    /// The date the formula must be in effect on.
    pub as_of: NaiveDate,
    /// An explicit formula pin, if the run supplies one.
    pub override_id: Option<&'a str>,
}

/// The share of a contribution attributable to one tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierContribution {
    /// Tier number, starting at 1.
    pub tier: u32,
    /// The part of the amount that fell in this tier.
    pub pensionable: Decimal,
    /// Employee share for the tier.
    pub employee: Decimal,
    /// Employer share for the tier.
    pub employer: Decimal,
}

/// The result of one contribution calculation. Amounts are unrounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionResult {
    /// The component computed.
    pub component: Component,
    /// The formula used.
    pub formula_id: String,
    /// The version of the formula used.
    pub formula_version: String,
    /// Employee share.
    pub employee_contribution: Decimal,
    /// Employer share.
    pub employer_contribution: Decimal,
    /// Relief granted against the contribution (zero for most components).
    pub relief: Decimal,
    /// Per-tier breakdown, for tiered contributions.
    pub tiers: Vec<TierContribution>,
    /// The audit step recording the calculation.
    pub audit_step: AuditStep,
}

/// A calculator for one deduction component.
pub trait ContributionCalculator: Send + Sync {
    /// The component this calculator produces.
    fn component(&self) -> Component;

    /// Computes the contribution for `ctx`.
    fn calculate(&self, ctx: &ContributionContext<'_>) -> EngineResult<ContributionResult>;
}

/// Resolves the formula for `component` and applies its brackets.
pub(crate) fn resolve_and_apply(
    component: &Component,
    ctx: &ContributionContext<'_>,
) -> EngineResult<(std::sync::Arc<Formula>, BracketOutcome)> {
    let (formula_type, category) = component.formula_key();
    let formula = ctx
        .catalog
        .resolve(formula_type, &category, ctx.as_of, ctx.override_id)?;
    if formula.split_ratio.is_none() {
        return Err(EngineError::integrity(
            &formula.id,
            format!("{} contributions require a split ratio", component),
        ));
    }
    let outcome = apply_brackets(ctx.amount, &formula)?;
    Ok((formula, outcome))
}

/// Builds the audit step for a contribution.
pub(crate) fn contribution_step(
    rule_name: &str,
    component: &Component,
    formula: &Formula,
    ctx: &ContributionContext<'_>,
    outcome: &BracketOutcome,
) -> AuditStep {
    AuditStep {
        step_number: 0,
        rule_id: component.to_string(),
        rule_name: rule_name.to_string(),
        formula_ref: format!("{}@{}", formula.id, formula.version),
        input: serde_json::json!({
            "amount": ctx.amount.normalize().to_string(),
            "as_of": ctx.as_of.to_string(),
            "pinned": ctx.override_id.is_some(),
        }),
        output: serde_json::json!({
            "total": outcome.total.normalize().to_string(),
            "employee": outcome.employee_amount.normalize().to_string(),
            "employer": outcome.employer_amount.normalize().to_string(),
            "brackets_touched": outcome.slices.len(),
            "minimum_applied": outcome.minimum_applied,
        }),
        reasoning: format!(
            "{} on {} using {} v{}: total {} split {}/{} = employee {} / employer {}",
            rule_name,
            ctx.amount.normalize(),
            formula.id,
            formula.version,
            outcome.total.normalize(),
            outcome.split.employee_percentage.normalize(),
            outcome.split.employer_percentage.normalize(),
            outcome.employee_amount.normalize(),
            outcome.employer_amount.normalize()
        ),
    }
}

/// Computes a contribution with no component-specific reporting.
pub(crate) fn simple_contribution(
    rule_name: &str,
    component: Component,
    ctx: &ContributionContext<'_>,
) -> EngineResult<ContributionResult> {
    let (formula, outcome) = resolve_and_apply(&component, ctx)?;
    let audit_step = contribution_step(rule_name, &component, &formula, ctx, &outcome);
    Ok(ContributionResult {
        component,
        formula_id: formula.id.clone(),
        formula_version: formula.version.clone(),
        employee_contribution: outcome.employee_amount,
        employer_contribution: outcome.employer_amount,
        relief: Decimal::ZERO,
        tiers: Vec::new(),
        audit_step,
    })
}

/// A deduction defined purely as data: a deduction formula whose category is
/// the component name.
#[derive(Debug, Clone)]
pub struct CustomDeductionCalculator {
    name: String,
}

impl CustomDeductionCalculator {
    /// Creates a calculator for the named custom deduction.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl ContributionCalculator for CustomDeductionCalculator {
    fn component(&self) -> Component {
        Component::Custom(self.name.clone())
    }

    fn calculate(&self, ctx: &ContributionContext<'_>) -> EngineResult<ContributionResult> {
        simple_contribution(&format!("Custom deduction ({})", self.name), self.component(), ctx)
    }
}

/// Strategy table mapping components to their calculators.
///
/// Custom components without a registered calculator are computed from
/// their data-defined formula.
pub struct CalculatorTable {
    calculators: HashMap<Component, Box<dyn ContributionCalculator>>,
}

impl CalculatorTable {
    /// An empty table.
    pub fn empty() -> Self {
        Self {
            calculators: HashMap::new(),
        }
    }

    /// The statutory calculators: NSSF, SHIF/NHIF and the housing levy.
    pub fn statutory() -> Self {
        let mut table = Self::empty();
        table.register(Box::new(NssfCalculator));
        table.register(Box::new(ShifCalculator));
        table.register(Box::new(HousingLevyCalculator));
        table
    }

    /// Registers (or replaces) the calculator for its component.
    pub fn register(&mut self, calculator: Box<dyn ContributionCalculator>) {
        self.calculators.insert(calculator.component(), calculator);
    }

    /// Returns true if a calculator is registered for `component`.
    pub fn contains(&self, component: &Component) -> bool {
        self.calculators.contains_key(component)
    }

    /// Computes `component` for `ctx`.
    pub fn calculate(
        &self,
        component: &Component,
        ctx: &ContributionContext<'_>,
    ) -> EngineResult<ContributionResult> {
        if let Some(calculator) = self.calculators.get(component) {
            return calculator.calculate(ctx);
        }

        match component {
            Component::Custom(name) => CustomDeductionCalculator::new(name.clone()).calculate(ctx),
            Component::Paye => Err(EngineError::CalculationError {
                message: "PAYE is computed on taxable pay, not as a phase deduction".to_string(),
            }),
            Component::Nssf | Component::Shif | Component::HousingLevy => {
                Err(EngineError::CalculationError {
                    message: format!("no calculator registered for {}", component),
                })
            }
        }
    }
}

impl Default for CalculatorTable {
    fn default() -> Self {
        Self::statutory()
    }
}

impl std::fmt::Debug for CalculatorTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&Component> = self.calculators.keys().collect();
        keys.sort();
        f.debug_struct("CalculatorTable").field("components", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FormulaLoader;
    use crate::models::{FormulaCategory, FormulaItem, FormulaType, SplitRatio};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn catalog() -> FormulaCatalog {
        let catalog = FormulaCatalog::new();
        catalog.seed(FormulaLoader::builtin().unwrap()).unwrap();
        catalog
    }

    fn ctx<'a>(catalog: &'a FormulaCatalog, amount: &str) -> ContributionContext<'a> {
        ContributionContext {
            catalog,
            amount: dec(amount),
            as_of: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            override_id: None,
        }
    }

    fn sacco_formula() -> Formula {
        Formula {
            id: "sacco-2024".to_string(),
            formula_type: FormulaType::Deduction,
            category: FormulaCategory::Other("sacco".to_string()),
            version: "2024".to_string(),
            effective_from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            is_current: true,
            personal_relief: None,
            deduction_order: None,
            method: Default::default(),
            minimum_contribution: None,
            items: vec![FormulaItem::percentage(dec("0"), None, dec("5"))],
            split_ratio: Some(SplitRatio::employee_only()),
        }
    }

    #[test]
    fn test_statutory_table_has_three_calculators() {
        let table = CalculatorTable::statutory();
        assert!(table.contains(&Component::Nssf));
        assert!(table.contains(&Component::Shif));
        assert!(table.contains(&Component::HousingLevy));
        assert!(!table.contains(&Component::Paye));
    }

    #[test]
    fn test_table_dispatches_housing_levy() {
        let catalog = catalog();
        let result = CalculatorTable::statutory()
            .calculate(&Component::HousingLevy, &ctx(&catalog, "49784"))
            .unwrap();
        assert_eq!(result.component, Component::HousingLevy);
        assert_eq!(result.employee_contribution, dec("746.76"));
        assert_eq!(result.employer_contribution, dec("746.76"));
        assert_eq!(result.formula_id, "housing-levy-2023-07");
    }

    #[test]
    fn test_custom_component_uses_data_defined_formula() {
        let catalog = catalog();
        catalog.insert(sacco_formula()).unwrap();
        let component = Component::Custom("sacco".to_string());
        let result = CalculatorTable::statutory()
            .calculate(&component, &ctx(&catalog, "40000"))
            .unwrap();
        assert_eq!(result.employee_contribution, dec("2000"));
        assert_eq!(result.employer_contribution, Decimal::ZERO);
        assert_eq!(result.audit_step.rule_id, "sacco");
    }

    #[test]
    fn test_custom_component_without_formula_is_not_found() {
        let catalog = catalog();
        let component = Component::Custom("welfare".to_string());
        let result = CalculatorTable::statutory().calculate(&component, &ctx(&catalog, "40000"));
        assert!(matches!(result, Err(EngineError::FormulaNotFound { .. })));
    }

    #[test]
    fn test_paye_is_not_a_table_component() {
        let catalog = catalog();
        let result = CalculatorTable::statutory().calculate(&Component::Paye, &ctx(&catalog, "1"));
        assert!(matches!(result, Err(EngineError::CalculationError { .. })));
    }

    #[test]
    fn test_empty_table_rejects_statutory_component() {
        let catalog = catalog();
        let result = CalculatorTable::empty().calculate(&Component::Nssf, &ctx(&catalog, "1"));
        assert!(matches!(result, Err(EngineError::CalculationError { .. })));
    }

    #[test]
    fn test_audit_step_records_formula_and_split() {
        let catalog = catalog();
        let result = CalculatorTable::statutory()
            .calculate(&Component::HousingLevy, &ctx(&catalog, "49784"))
            .unwrap();
        let step = &result.audit_step;
        assert_eq!(step.formula_ref, "housing-levy-2023-07@2023-07");
        assert_eq!(step.input["amount"].as_str().unwrap(), "49784");
        assert_eq!(step.output["employee"].as_str().unwrap(), "746.76");
        assert!(step.reasoning.contains("split 50/50"));
    }
}
