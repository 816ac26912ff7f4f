//! The dynamic deduction engine.
//!
//! The income formula in effect for a period declares which components are
//! deducted in which phase. This module reads that ordering, runs each
//! component through the [`CalculatorTable`] and accumulates phase totals.
//!
//! ## Phases
//!
//! Phases always apply in the order `before_tax`, `after_tax`, `after_paye`,
//! `final`; components within a phase apply in their declared order. Income
//! formulas that predate declared orders fall back to the legacy ordering
//! (NSSF, SHIF/NHIF and housing levy, all before tax). That is the only
//! fallback: a missing formula for a listed component is an error.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::FormulaCatalog;
use crate::error::EngineResult;
use crate::models::{
    AuditStep, AuditWarning, Component, DeductionOrder, DeductionPhase, EmployeeSnapshot,
    FormulaCategory, FormulaOverrides, FormulaType, PaymentPeriod,
};

use super::contributions::{CalculatorTable, ContributionContext, TierContribution};

/// Where the deduction ordering came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSource {
    /// Declared by the income formula.
    Declared,
    /// The income formula declares none; the legacy ordering was used.
    LegacyFallback,
}

/// One component as applied by the engine. Amounts are unrounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedDeduction {
    /// The component.
    pub component: Component,
    /// The phase it was applied in.
    pub phase: DeductionPhase,
    /// Employee share, deducted from pay.
    pub employee_amount: Decimal,
    /// Employer share, paid on top of gross.
    pub employer_amount: Decimal,
    /// Per-tier breakdown, for tiered components.
    pub tiers: Vec<TierContribution>,
    /// The formula used.
    pub formula_id: String,
    /// The version of the formula used.
    pub formula_version: String,
}

/// A component listed in the ordering but not applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedDeduction {
    /// The component.
    pub component: Component,
    /// The phase it was listed in.
    pub phase: DeductionPhase,
    /// Why it was skipped.
    pub reason: String,
}

/// The deductions for one employee and period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeductionBreakdown {
    /// The income formula whose ordering was followed.
    pub income_formula_id: String,
    /// The version of that income formula.
    pub income_formula_version: String,
    /// The income category resolved from the employee's tax mode.
    pub income_category: FormulaCategory,
    /// Where the ordering came from.
    pub order_source: OrderSource,
    /// Applied components in application order.
    pub applied: Vec<AppliedDeduction>,
    /// Components disabled for this employee.
    pub skipped: Vec<SkippedDeduction>,
    /// Employee total deducted before tax.
    pub before_tax: Decimal,
    /// Employee total deducted after tax.
    pub after_tax: Decimal,
    /// Employee total deducted after PAYE.
    pub after_paye: Decimal,
    /// Employee total deducted in the final phase.
    pub final_phase: Decimal,
    /// Audit steps in application order.
    pub audit_steps: Vec<AuditStep>,
    /// Warnings raised while applying the ordering.
    pub warnings: Vec<AuditWarning>,
}

impl DeductionBreakdown {
    /// The employee total for `phase`.
    pub fn phase_total(&self, phase: DeductionPhase) -> Decimal {
        match phase {
            DeductionPhase::BeforeTax => self.before_tax,
            DeductionPhase::AfterTax => self.after_tax,
            DeductionPhase::AfterPaye => self.after_paye,
            DeductionPhase::Final => self.final_phase,
        }
    }

    /// The applied deduction for `component`, if any.
    pub fn find(&self, component: &Component) -> Option<&AppliedDeduction> {
        self.applied.iter().find(|d| &d.component == component)
    }

    fn add(&mut self, phase: DeductionPhase, amount: Decimal) {
        match phase {
            DeductionPhase::BeforeTax => self.before_tax += amount,
            DeductionPhase::AfterTax => self.after_tax += amount,
            DeductionPhase::AfterPaye => self.after_paye += amount,
            DeductionPhase::Final => self.final_phase += amount,
        }
    }
}

/// Applies deduction formulas in the order the income formula declares.
#[derive(Debug, Clone)]
pub struct DeductionEngine {
    catalog: Arc<FormulaCatalog>,
    calculators: Arc<CalculatorTable>,
}

impl DeductionEngine {
    /// Creates an engine with the statutory calculators.
    pub fn new(catalog: Arc<FormulaCatalog>) -> Self {
        Self::with_calculators(catalog, Arc::new(CalculatorTable::statutory()))
    }

    /// Creates an engine with a custom calculator table.
    pub fn with_calculators(catalog: Arc<FormulaCatalog>, calculators: Arc<CalculatorTable>) -> Self {
        Self {
            catalog,
            calculators,
        }
    }

    /// The catalog formulas are resolved from.
    pub fn catalog(&self) -> &Arc<FormulaCatalog> {
        &self.catalog
    }

    /// Computes every deduction for `employee` on `gross_pay` in `period`.
    ///
    /// Formulas are resolved as of the last day of the period, so a table
    /// that takes effect during a month governs that month's payroll.
    ///
    /// # Errors
    ///
    /// - `Validation` if the employee has no salary details.
    /// - `FormulaNotFound` / `FormulaOverrideNotFound` if the income formula
    ///   or any listed component has no formula.
    /// - `FormulaIntegrity` if a formula is misconfigured or a pin names a
    ///   formula of the wrong kind.
    pub fn calculate_deductions_in_order(
        &self,
        gross_pay: Decimal,
        employee: &EmployeeSnapshot,
        period: PaymentPeriod,
        overrides: &FormulaOverrides,
    ) -> EngineResult<DeductionBreakdown> {
        let details = employee.require_salary_details()?;
        let as_of = period.last_day();
        let income_category = details.income_tax.category();

        let income = self.catalog.resolve(
            FormulaType::Income,
            &income_category,
            as_of,
            overrides.income.as_deref(),
        )?;

        let (order, order_source) = match &income.deduction_order {
            Some(order) => (order.clone(), OrderSource::Declared),
            None => (DeductionOrder::legacy(), OrderSource::LegacyFallback),
        };

        let mut breakdown = DeductionBreakdown {
            income_formula_id: income.id.clone(),
            income_formula_version: income.version.clone(),
            income_category,
            order_source,
            applied: Vec::new(),
            skipped: Vec::new(),
            before_tax: Decimal::ZERO,
            after_tax: Decimal::ZERO,
            after_paye: Decimal::ZERO,
            final_phase: Decimal::ZERO,
            audit_steps: Vec::new(),
            warnings: Vec::new(),
        };

        if order_source == OrderSource::LegacyFallback {
            warn!(
                employee_id = %employee.id,
                period = %period,
                income_formula = %income.id,
                "Income formula declares no deduction order, using legacy ordering"
            );
            breakdown.warnings.push(AuditWarning {
                code: "LEGACY_DEDUCTION_ORDER".to_string(),
                message: format!(
                    "Income formula {} v{} declares no deduction order; NSSF, SHIF/NHIF and housing levy were deducted before tax",
                    income.id, income.version
                ),
                severity: "medium".to_string(),
            });
        }

        breakdown.audit_steps.push(AuditStep {
            step_number: 0,
            rule_id: "deduction_order".to_string(),
            rule_name: "Deduction Order".to_string(),
            formula_ref: format!("{}@{}", income.id, income.version),
            input: serde_json::json!({
                "category": breakdown.income_category.as_str(),
                "as_of": as_of.to_string(),
            }),
            output: serde_json::json!({
                "source": match order_source {
                    OrderSource::Declared => "declared",
                    OrderSource::LegacyFallback => "legacy_fallback",
                },
                "before_tax": order.before_tax.iter().map(Component::as_str).collect::<Vec<_>>(),
                "after_tax": order.after_tax.iter().map(Component::as_str).collect::<Vec<_>>(),
                "after_paye": order.after_paye.iter().map(Component::as_str).collect::<Vec<_>>(),
                "final": order.final_phase.iter().map(Component::as_str).collect::<Vec<_>>(),
            }),
            reasoning: format!(
                "Deduction order from {} v{} ({})",
                income.id,
                income.version,
                match order_source {
                    OrderSource::Declared => "declared",
                    OrderSource::LegacyFallback => "legacy fallback",
                }
            ),
        });

        for (phase, component) in order.iter() {
            let disabled = match component {
                Component::Nssf => !details.deduct_nssf,
                Component::Shif => !details.deduct_shif_or_nhif,
                _ => false,
            };
            if disabled {
                debug!(employee_id = %employee.id, component = %component, "Component disabled for employee");
                breakdown.skipped.push(SkippedDeduction {
                    component: component.clone(),
                    phase,
                    reason: format!("{} deduction disabled for employee", component),
                });
                continue;
            }

            let ctx = ContributionContext {
                catalog: &self.catalog,
                amount: gross_pay,
                as_of,
                override_id: overrides.for_component(component),
            };
            let result = self.calculators.calculate(component, &ctx)?;

            breakdown.add(phase, result.employee_contribution);
            let mut step = result.audit_step;
            step.reasoning = format!("[{}] {}", phase, step.reasoning);
            breakdown.audit_steps.push(step);
            breakdown.applied.push(AppliedDeduction {
                component: result.component,
                phase,
                employee_amount: result.employee_contribution,
                employer_amount: result.employer_contribution,
                tiers: result.tiers,
                formula_id: result.formula_id,
                formula_version: result.formula_version,
            });
        }

        Ok(breakdown)
    }
}
