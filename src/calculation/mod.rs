//! Calculation logic for the payroll engine.
//!
//! This module contains the pure calculation steps of a payroll run: the
//! generic bracket routine, the contribution calculators built on it (NSSF,
//! SHIF/NHIF, housing levy, data-defined custom deductions), PAYE with
//! personal relief, gross pay derivation per employment type, and the
//! deduction engine that applies contributions in the phase order an income
//! formula declares.
//!
//! Nothing here touches storage or the employee directory; every function
//! works on value types and the formula catalog.

mod bracket;
mod contributions;
mod deductions;
mod earnings;
mod housing_levy;
mod nssf;
mod paye;
mod shif;

pub use bracket::{BracketOutcome, BracketSlice, apply_brackets, split_amount};
pub use contributions::{
    CalculatorTable, ContributionCalculator, ContributionContext, ContributionResult,
    CustomDeductionCalculator, TierContribution,
};
pub use deductions::{
    AppliedDeduction, DeductionBreakdown, DeductionEngine, OrderSource, SkippedDeduction,
};
pub use earnings::{EarningsResult, derive_earnings};
pub use housing_levy::HousingLevyCalculator;
pub use nssf::NssfCalculator;
pub use paye::{PayeResult, calculate_paye};
pub use shif::ShifCalculator;
