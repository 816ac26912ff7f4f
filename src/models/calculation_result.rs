//! Calculation result models for the payroll engine.
//!
//! This module contains the audit trace types that record every decision made
//! while computing a payslip, the earnings breakdown, and the per-component
//! deduction lines that end up on the payslip.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::{Component, DeductionPhase};

/// Rounds a monetary amount to cents, half away from zero.
///
/// Bracket arithmetic is carried out unrounded; this is applied only when a
/// value is stored on a payslip.
///
/// # Example
///
/// ```
/// use payroll_engine::models::round_money;
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
///
/// assert_eq!(round_money(Decimal::from_str("3704.442").unwrap()), Decimal::from_str("3704.44").unwrap());
/// assert_eq!(round_money(Decimal::from_str("0.125").unwrap()), Decimal::from_str("0.13").unwrap());
/// ```
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// A single step in the audit trace recording a calculation decision.
///
/// Each step captures the input, output, and reasoning for a rule application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStep {
    /// The sequential step number.
    pub step_number: u32,
    /// The unique identifier of the rule that was applied.
    pub rule_id: String,
    /// The human-readable name of the rule.
    pub rule_name: String,
    /// The formula (id and version) the rule was computed from, if any.
    pub formula_ref: String,
    /// The input data for this step.
    pub input: serde_json::Value,
    /// The output data from this step.
    pub output: serde_json::Value,
    /// Human-readable explanation of the decision.
    pub reasoning: String,
}

/// A warning generated during calculation.
///
/// Warnings indicate conditions that don't prevent calculation but may
/// require attention, such as a formula falling back to the legacy ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditWarning {
    /// A code identifying the type of warning.
    pub code: String,
    /// A human-readable description of the warning.
    pub message: String,
    /// The severity level (e.g., "low", "medium", "high").
    pub severity: String,
}

/// The complete audit trace for a payslip calculation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditTrace {
    /// The sequence of calculation steps.
    pub steps: Vec<AuditStep>,
    /// Any warnings generated during calculation.
    pub warnings: Vec<AuditWarning>,
}

impl AuditTrace {
    /// The number to give the next step appended to this trace.
    pub fn next_step_number(&self) -> u32 {
        self.steps.len() as u32 + 1
    }

    /// Appends steps, renumbering them to follow the existing ones.
    pub fn extend_steps(&mut self, steps: impl IntoIterator<Item = AuditStep>) {
        for mut step in steps {
            step.step_number = self.next_step_number();
            self.steps.push(step);
        }
    }
}

/// Gross pay derived for one employee and period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Earnings {
    /// Salary, fee, or daily rate times days present.
    pub basic_pay: Decimal,
    /// Recurring allowances.
    pub allowances: Decimal,
    /// One-off payments in the period.
    pub other_payments: Decimal,
    /// Total earnings subject to deductions.
    pub gross_pay: Decimal,
}

/// One deduction as it appears on a payslip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeductionLine {
    /// The component deducted.
    pub component: Component,
    /// The phase it was deducted in.
    pub phase: DeductionPhase,
    /// Employee share, rounded to cents.
    pub employee_amount: Decimal,
    /// Employer share, rounded to cents.
    pub employer_amount: Decimal,
    /// The formula the amount was computed from.
    pub formula_id: String,
}
