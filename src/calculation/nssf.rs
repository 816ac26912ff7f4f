//! NSSF (National Social Security Fund) contributions.
//!
//! NSSF is charged on pensionable pay in two tiers with the same rate: tier I
//! up to the lower earnings limit, tier II from there to the upper earnings
//! limit. Pay above the upper limit is not pensionable. Employee and employer
//! contribute equally; statutory returns report each tier separately.

use crate::error::EngineResult;
use crate::models::Component;

use super::contributions::{
    ContributionCalculator, ContributionContext, ContributionResult, TierContribution,
    contribution_step, resolve_and_apply,
};

/// Calculator for tiered NSSF contributions.
#[derive(Debug, Clone, Copy, Default)]
pub struct NssfCalculator;

impl ContributionCalculator for NssfCalculator {
    fn component(&self) -> Component {
        Component::Nssf
    }

    /// Computes NSSF with per-tier reporting.
    ///
    /// Each bracket of the formula is a tier; the result carries one
    /// [`TierContribution`] per tier the pay reached.
    fn calculate(&self, ctx: &ContributionContext<'_>) -> EngineResult<ContributionResult> {
        let component = Component::Nssf;
        let (formula, outcome) = resolve_and_apply(&component, ctx)?;

        let tiers = outcome
            .slices
            .iter()
            .map(|slice| {
                let (employee, employer) = outcome.share(slice.charge);
                TierContribution {
                    tier: slice.index as u32 + 1,
                    pensionable: slice.portion,
                    employee,
                    employer,
                }
            })
            .collect();

        let audit_step = contribution_step("NSSF", &component, &formula, ctx, &outcome);

        Ok(ContributionResult {
            component,
            formula_id: formula.id.clone(),
            formula_version: formula.version.clone(),
            employee_contribution: outcome.employee_amount,
            employer_contribution: outcome.employer_amount,
            relief: rust_decimal::Decimal::ZERO,
            tiers,
            audit_step,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FormulaCatalog;
    use crate::config::FormulaLoader;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn catalog() -> FormulaCatalog {
        let catalog = FormulaCatalog::new();
        catalog.seed(FormulaLoader::builtin().unwrap()).unwrap();
        catalog
    }

    fn calculate(catalog: &FormulaCatalog, amount: &str, as_of: NaiveDate) -> ContributionResult {
        NssfCalculator
            .calculate(&ContributionContext {
                catalog,
                amount: dec(amount),
                as_of,
                override_id: None,
            })
            .unwrap()
    }

    fn march_2025() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    #[test]
    fn test_2025_tiers_for_scenario_gross() {
        let catalog = catalog();
        let result = calculate(&catalog, "49784", march_2025());

        assert_eq!(result.formula_id, "nssf-2025-02");
        assert_eq!(result.tiers.len(), 2);
        assert_eq!(result.tiers[0].tier, 1);
        assert_eq!(result.tiers[0].employee, dec("480"));
        assert_eq!(result.tiers[1].tier, 2);
        assert_eq!(result.tiers[1].pensionable, dec("41784"));
        assert_eq!(result.tiers[1].employee, dec("2507.04"));
        assert_eq!(result.employee_contribution, dec("2987.04"));
        assert_eq!(result.employer_contribution, dec("2987.04"));
    }

    #[test]
    fn test_pay_below_lower_limit_only_tier_1() {
        let catalog = catalog();
        let result = calculate(&catalog, "5000", march_2025());
        assert_eq!(result.tiers.len(), 1);
        assert_eq!(result.employee_contribution, dec("300"));
    }

    #[test]
    fn test_pay_above_upper_limit_is_capped() {
        let catalog = catalog();
        let result = calculate(&catalog, "150000", march_2025());
        assert_eq!(result.employee_contribution, dec("4320"));
        assert_eq!(result.tiers[1].pensionable, dec("64000"));
    }

    #[test]
    fn test_2024_limits_apply_before_february_2025() {
        let catalog = catalog();
        let result = calculate(&catalog, "49784", NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(result.formula_id, "nssf-2024-02");
        assert_eq!(result.tiers[0].employee, dec("420"));
        assert_eq!(result.tiers[1].employee, dec("1740"));
        assert_eq!(result.employee_contribution, dec("2160"));
    }

    #[test]
    fn test_pinned_formula_overrides_date() {
        let catalog = catalog();
        let result = NssfCalculator
            .calculate(&ContributionContext {
                catalog: &catalog,
                amount: dec("49784"),
                as_of: march_2025(),
                override_id: Some("nssf-2014-01"),
            })
            .unwrap();
        assert_eq!(result.employee_contribution, dec("1080"));
        assert!(result.audit_step.input["pinned"].as_bool().unwrap());
    }
}
