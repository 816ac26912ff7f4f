//! Bracket calculation over a formula's ordered rows.
//!
//! This is the single routine behind every statutory amount: progressive
//! income tax, tiered pension contributions, flat-rate health tables and
//! percentage levies all reduce to walking a formula's brackets.
//!
//! ## Semantics
//!
//! **Marginal** formulas charge each bracket's rate on the slice of the
//! amount that falls inside it: `max(0, min(amount, amount_to) - amount_from)`.
//! Amounts above a closed top row are not charged further, which is how
//! capped contributions such as NSSF tier II work.
//!
//! **Banded** formulas charge only the bracket containing the amount, using
//! its fixed amount (or its rate on the whole amount).
//!
//! No rounding happens here; callers round when a value is stored.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::EngineResult;
use crate::models::{CalculationMethod, Formula, SplitRatio};

/// The portion of an amount charged within one bracket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketSlice {
    /// Zero-based index of the bracket in the formula.
    pub index: usize,
    /// Lower bound of the bracket.
    pub amount_from: Decimal,
    /// Upper bound of the bracket, `None` when open-ended.
    pub amount_to: Option<Decimal>,
    /// The part of the amount that fell inside the bracket.
    pub portion: Decimal,
    /// The charge for this bracket.
    pub charge: Decimal,
}

/// The result of applying a formula's brackets to an amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketOutcome {
    /// The blended total across all brackets.
    pub total: Decimal,
    /// Employee share of the total.
    pub employee_amount: Decimal,
    /// Employer share of the total.
    pub employer_amount: Decimal,
    /// Per-bracket detail, in bracket order.
    pub slices: Vec<BracketSlice>,
    /// True when the formula's minimum contribution raised the total.
    pub minimum_applied: bool,
    /// The split ratio used to divide the total.
    pub split: SplitRatio,
}

impl BracketOutcome {
    /// Divides `amount` using the same split ratio as the total.
    pub fn share(&self, amount: Decimal) -> (Decimal, Decimal) {
        split_amount(amount, &self.split)
    }
}

/// Divides `total` into employee and employer portions.
///
/// `employee = total * employee_percentage / 100` and
/// `employer = total * employer_percentage / 100`.
pub fn split_amount(total: Decimal, split: &SplitRatio) -> (Decimal, Decimal) {
    (
        total * split.employee_percentage / Decimal::ONE_HUNDRED,
        total * split.employer_percentage / Decimal::ONE_HUNDRED,
    )
}

/// Applies a formula's brackets to `amount`.
///
/// The formula is validated first; overlapping, unsorted or otherwise broken
/// brackets fail with `FormulaIntegrity` rather than producing a number.
/// Without a split ratio the whole total is the employee amount.
///
/// # Examples
///
/// ```
/// use payroll_engine::calculation::apply_brackets;
/// use payroll_engine::models::{Formula, FormulaCategory, FormulaItem, FormulaType};
/// use chrono::NaiveDate;
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
///
/// let d = |s: &str| Decimal::from_str(s).unwrap();
/// let paye = Formula {
///     id: "paye".to_string(),
///     formula_type: FormulaType::Income,
///     category: FormulaCategory::Primary,
///     version: "2024-12".to_string(),
///     effective_from: NaiveDate::from_ymd_opt(2024, 12, 27).unwrap(),
///     is_current: true,
///     personal_relief: Some(d("2400")),
///     deduction_order: None,
///     method: Default::default(),
///     minimum_contribution: None,
///     items: vec![
///         FormulaItem::percentage(d("0"), Some(d("24000")), d("10")),
///         FormulaItem::percentage(d("24000"), Some(d("32333")), d("25")),
///         FormulaItem::percentage(d("32333"), None, d("30")),
///     ],
///     split_ratio: None,
/// };
///
/// let outcome = apply_brackets(d("44681.14"), &paye).unwrap();
/// assert_eq!(outcome.total, d("8187.692"));
/// assert_eq!(outcome.slices.len(), 3);
/// ```
pub fn apply_brackets(amount: Decimal, formula: &Formula) -> EngineResult<BracketOutcome> {
    formula.validate()?;

    let slices = match formula.method {
        CalculationMethod::Marginal => marginal_slices(amount, formula),
        CalculationMethod::Banded => banded_slice(amount, formula).into_iter().collect(),
    };

    let mut total: Decimal = slices.iter().map(|s| s.charge).sum();
    let mut minimum_applied = false;
    if let Some(minimum) = formula.minimum_contribution {
        if amount > Decimal::ZERO && total < minimum {
            total = minimum;
            minimum_applied = true;
        }
    }

    let split = formula.split_ratio.unwrap_or_else(SplitRatio::employee_only);
    let (employee_amount, employer_amount) = split_amount(total, &split);

    Ok(BracketOutcome {
        total,
        employee_amount,
        employer_amount,
        slices,
        minimum_applied,
        split,
    })
}

fn marginal_slices(amount: Decimal, formula: &Formula) -> Vec<BracketSlice> {
    let mut slices = Vec::new();

    for (index, item) in formula.items.iter().enumerate() {
        if amount <= item.amount_from {
            break;
        }

        let upper = item.amount_to.map_or(amount, |to| amount.min(to));
        let portion = (upper - item.amount_from).max(Decimal::ZERO);
        let charge = portion * item.deduct_percentage / Decimal::ONE_HUNDRED
            + item.deduct_amount.unwrap_or(Decimal::ZERO);

        slices.push(BracketSlice {
            index,
            amount_from: item.amount_from,
            amount_to: item.amount_to,
            portion,
            charge,
        });

        // The amount ends inside this bracket.
        if item.amount_to.is_none_or(|to| amount <= to) {
            break;
        }
    }

    slices
}

fn banded_slice(amount: Decimal, formula: &Formula) -> Option<BracketSlice> {
    if amount <= Decimal::ZERO {
        return None;
    }

    formula
        .items
        .iter()
        .enumerate()
        .find(|(_, item)| item.contains(amount))
        .map(|(index, item)| BracketSlice {
            index,
            amount_from: item.amount_from,
            amount_to: item.amount_to,
            portion: amount,
            charge: item
                .deduct_amount
                .unwrap_or(amount * item.deduct_percentage / Decimal::ONE_HUNDRED),
        })
}
