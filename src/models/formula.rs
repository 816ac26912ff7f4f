//! Formula models: versioned statutory calculation definitions.
//!
//! A [`Formula`] is an effective-dated, immutable snapshot of one statutory
//! calculation (income tax, a social-security fund, a levy). Its brackets are
//! [`FormulaItem`]s, its employee/employer division is a [`SplitRatio`], and
//! income formulas additionally declare the [`DeductionOrder`] in which
//! contributions are taken from pay.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// The broad kind of statutory formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormulaType {
    /// Income tax (PAYE) formulas.
    Income,
    /// Payroll deductions such as pension or health contributions.
    Deduction,
    /// Levies charged on gross pay.
    Levy,
}

impl fmt::Display for FormulaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormulaType::Income => "income",
            FormulaType::Deduction => "deduction",
            FormulaType::Levy => "levy",
        };
        f.write_str(name)
    }
}

/// The category of a formula within its type.
///
/// Known statutory categories have their own variant; anything else is kept
/// by name so that custom deductions can be defined purely as data.
///
/// # Example
///
/// ```
/// use payroll_engine::models::FormulaCategory;
///
/// let category: FormulaCategory = "social_security_fund".parse().unwrap();
/// assert_eq!(category, FormulaCategory::SocialSecurityFund);
/// assert_eq!("nhif".parse::<FormulaCategory>().unwrap(), FormulaCategory::Shif);
/// assert_eq!(
///     "sacco".parse::<FormulaCategory>().unwrap(),
///     FormulaCategory::Other("sacco".to_string())
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FormulaCategory {
    /// Primary employment income tax.
    Primary,
    /// Secondary employment income tax.
    Secondary,
    /// National Social Security Fund.
    SocialSecurityFund,
    /// Social Health Insurance Fund (formerly NHIF).
    Shif,
    /// Affordable housing levy.
    HousingLevy,
    /// Any other data-defined category.
    Other(String),
}

impl FormulaCategory {
    /// Returns the canonical name of the category.
    pub fn as_str(&self) -> &str {
        match self {
            FormulaCategory::Primary => "primary",
            FormulaCategory::Secondary => "secondary",
            FormulaCategory::SocialSecurityFund => "social_security_fund",
            FormulaCategory::Shif => "shif",
            FormulaCategory::HousingLevy => "housing_levy",
            FormulaCategory::Other(name) => name,
        }
    }
}

impl From<String> for FormulaCategory {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "primary" => FormulaCategory::Primary,
            "secondary" => FormulaCategory::Secondary,
            "social_security_fund" | "nssf" => FormulaCategory::SocialSecurityFund,
            "shif" | "nhif" => FormulaCategory::Shif,
            "housing_levy" => FormulaCategory::HousingLevy,
            other => FormulaCategory::Other(other.to_string()),
        }
    }
}

impl From<FormulaCategory> for String {
    fn from(value: FormulaCategory) -> Self {
        value.as_str().to_string()
    }
}

impl FromStr for FormulaCategory {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(FormulaCategory::from(s.to_string()))
    }
}

impl fmt::Display for FormulaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the brackets of a formula are applied to an amount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationMethod {
    /// Each bracket charges its rate on the slice of the amount inside it.
    #[default]
    Marginal,
    /// Only the bracket containing the amount applies (flat-rate tables).
    Banded,
}

/// A single bracket row of a formula.
///
/// Bounds are half-open: `[amount_from, amount_to)`. An `amount_to` of
/// `None` marks the open-ended top row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaItem {
    /// Lower bound of the bracket (inclusive).
    pub amount_from: Decimal,
    /// Upper bound of the bracket (exclusive); `None` when open-ended.
    #[serde(default)]
    pub amount_to: Option<Decimal>,
    /// Percentage charged on the portion of the amount in this bracket.
    #[serde(default)]
    pub deduct_percentage: Decimal,
    /// Fixed charge for this bracket, used by flat-rate tables.
    #[serde(default)]
    pub deduct_amount: Option<Decimal>,
}

impl FormulaItem {
    /// Creates a percentage bracket.
    pub fn percentage(amount_from: Decimal, amount_to: Option<Decimal>, rate: Decimal) -> Self {
        Self {
            amount_from,
            amount_to,
            deduct_percentage: rate,
            deduct_amount: None,
        }
    }

    /// Creates a fixed-amount bracket.
    pub fn fixed(amount_from: Decimal, amount_to: Option<Decimal>, amount: Decimal) -> Self {
        Self {
            amount_from,
            amount_to,
            deduct_percentage: Decimal::ZERO,
            deduct_amount: Some(amount),
        }
    }

    /// Returns true if `amount` falls inside this bracket.
    pub fn contains(&self, amount: Decimal) -> bool {
        amount >= self.amount_from && self.amount_to.is_none_or(|to| amount < to)
    }
}

/// Division of a computed contribution between employee and employer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitRatio {
    /// Share of the total borne by the employee, in percent.
    pub employee_percentage: Decimal,
    /// Share of the total borne by the employer, in percent.
    pub employer_percentage: Decimal,
}

impl SplitRatio {
    /// The whole contribution is borne by the employee.
    pub fn employee_only() -> Self {
        Self {
            employee_percentage: Decimal::ONE_HUNDRED,
            employer_percentage: Decimal::ZERO,
        }
    }

    /// Employee and employer contribute equally.
    pub fn matched() -> Self {
        Self {
            employee_percentage: Decimal::new(50, 0),
            employer_percentage: Decimal::new(50, 0),
        }
    }
}

/// One of the four ordered buckets a deduction can be taken in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeductionPhase {
    /// Deducted from gross pay before taxable pay is derived.
    BeforeTax,
    /// Deducted after taxable pay is derived.
    AfterTax,
    /// Deducted after PAYE has been withheld.
    AfterPaye,
    /// Deducted last, after every statutory deduction.
    Final,
}

impl DeductionPhase {
    /// All phases in application order.
    pub const ALL: [DeductionPhase; 4] = [
        DeductionPhase::BeforeTax,
        DeductionPhase::AfterTax,
        DeductionPhase::AfterPaye,
        DeductionPhase::Final,
    ];

    /// Returns the snake_case name of the phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeductionPhase::BeforeTax => "before_tax",
            DeductionPhase::AfterTax => "after_tax",
            DeductionPhase::AfterPaye => "after_paye",
            DeductionPhase::Final => "final",
        }
    }
}

impl fmt::Display for DeductionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payroll component that can appear in a deduction order.
///
/// # Example
///
/// ```
/// use payroll_engine::models::Component;
///
/// assert_eq!("nhif".parse::<Component>().unwrap(), Component::Shif);
/// assert_eq!(Component::HousingLevy.to_string(), "housing_levy");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Component {
    /// National Social Security Fund contribution.
    Nssf,
    /// SHIF (or legacy NHIF) health contribution.
    Shif,
    /// Affordable housing levy.
    HousingLevy,
    /// Income tax. Never a phase component; computed on taxable pay.
    Paye,
    /// A data-defined deduction resolved by its category name.
    Custom(String),
}

impl Component {
    /// Returns the canonical name of the component.
    pub fn as_str(&self) -> &str {
        match self {
            Component::Nssf => "nssf",
            Component::Shif => "shif",
            Component::HousingLevy => "housing_levy",
            Component::Paye => "paye",
            Component::Custom(name) => name,
        }
    }

    /// The formula type and category this component is computed from.
    ///
    /// PAYE maps to the primary income category; callers needing the
    /// secondary table pick the category from the employee's tax mode.
    pub fn formula_key(&self) -> (FormulaType, FormulaCategory) {
        match self {
            Component::Nssf => (FormulaType::Deduction, FormulaCategory::SocialSecurityFund),
            Component::Shif => (FormulaType::Deduction, FormulaCategory::Shif),
            Component::HousingLevy => (FormulaType::Levy, FormulaCategory::HousingLevy),
            Component::Paye => (FormulaType::Income, FormulaCategory::Primary),
            Component::Custom(name) => (FormulaType::Deduction, FormulaCategory::from(name.clone())),
        }
    }
}

impl From<String> for Component {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "nssf" => Component::Nssf,
            "shif" | "nhif" => Component::Shif,
            "housing_levy" => Component::HousingLevy,
            "paye" => Component::Paye,
            other => Component::Custom(other.to_string()),
        }
    }
}

impl From<Component> for String {
    fn from(value: Component) -> Self {
        value.as_str().to_string()
    }
}

impl FromStr for Component {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Component::from(s.to_string()))
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The phase→components ordering declared by an income formula.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeductionOrder {
    /// Components deducted before tax.
    #[serde(default)]
    pub before_tax: Vec<Component>,
    /// Components deducted after tax.
    #[serde(default)]
    pub after_tax: Vec<Component>,
    /// Components deducted after PAYE.
    #[serde(default)]
    pub after_paye: Vec<Component>,
    /// Components deducted last.
    #[serde(default, rename = "final")]
    pub final_phase: Vec<Component>,
}

impl DeductionOrder {
    /// The ordering used for formula versions that predate declared orders:
    /// NSSF, SHIF/NHIF and the housing levy, all before tax.
    pub fn legacy() -> Self {
        Self {
            before_tax: vec![Component::Nssf, Component::Shif, Component::HousingLevy],
            ..Self::default()
        }
    }

    /// Returns the components listed for `phase`.
    pub fn components(&self, phase: DeductionPhase) -> &[Component] {
        match phase {
            DeductionPhase::BeforeTax => &self.before_tax,
            DeductionPhase::AfterTax => &self.after_tax,
            DeductionPhase::AfterPaye => &self.after_paye,
            DeductionPhase::Final => &self.final_phase,
        }
    }

    /// Iterates `(phase, component)` pairs in application order.
    pub fn iter(&self) -> impl Iterator<Item = (DeductionPhase, &Component)> {
        DeductionPhase::ALL
            .into_iter()
            .flat_map(move |phase| self.components(phase).iter().map(move |c| (phase, c)))
    }
}

/// An effective-dated statutory formula.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Formula {
    /// Stable identifier, used to pin a formula for reproducible runs.
    pub id: String,
    /// The formula type.
    #[serde(rename = "type")]
    pub formula_type: FormulaType,
    /// The formula category.
    pub category: FormulaCategory,
    /// Version label, monotonic per type and category.
    pub version: String,
    /// First date this formula applies to.
    pub effective_from: NaiveDate,
    /// Marks the fallback formula for its type and category.
    #[serde(default)]
    pub is_current: bool,
    /// Monthly personal relief (income formulas only).
    #[serde(default)]
    pub personal_relief: Option<Decimal>,
    /// Declared deduction ordering (income formulas only).
    #[serde(default)]
    pub deduction_order: Option<DeductionOrder>,
    /// How the brackets are applied.
    #[serde(default)]
    pub method: CalculationMethod,
    /// Floor on the blended total for any positive amount.
    #[serde(default)]
    pub minimum_contribution: Option<Decimal>,
    /// Bracket rows, ascending and contiguous.
    pub items: Vec<FormulaItem>,
    /// Employee/employer division of the total.
    #[serde(default)]
    pub split_ratio: Option<SplitRatio>,
}

impl Formula {
    /// Returns true if this formula charges employee and employer shares.
    pub fn requires_split(&self) -> bool {
        self.formula_type != FormulaType::Income
    }

    /// The personal relief, or zero when none is configured.
    pub fn relief(&self) -> Decimal {
        self.personal_relief.unwrap_or(Decimal::ZERO)
    }

    /// Checks the structural invariants of the formula.
    ///
    /// Brackets must be non-empty, ascending, contiguous and non-overlapping,
    /// with only the last row open-ended. Rates must lie in `0..=100`, the
    /// split ratio must sum to 100, contribution formulas must carry a split
    /// ratio, and a deduction order must not list PAYE or repeat a component.
    pub fn validate(&self) -> EngineResult<()> {
        let fail = |message: String| Err(EngineError::integrity(&self.id, message));

        if self.items.is_empty() {
            return fail("formula has no brackets".to_string());
        }

        let last = self.items.len() - 1;
        for (index, item) in self.items.iter().enumerate() {
            if item.amount_from < Decimal::ZERO {
                return fail(format!("bracket {index} starts below zero"));
            }
            match item.amount_to {
                Some(to) if to <= item.amount_from => {
                    return fail(format!(
                        "bracket {index} is empty or inverted ({} to {})",
                        item.amount_from, to
                    ));
                }
                None if index != last => {
                    return fail(format!("bracket {index} is open-ended but not the last row"));
                }
                _ => {}
            }
            if item.deduct_percentage < Decimal::ZERO
                || item.deduct_percentage > Decimal::ONE_HUNDRED
            {
                return fail(format!(
                    "bracket {index} rate {} is outside 0..=100",
                    item.deduct_percentage
                ));
            }
            if item.deduct_amount.is_some_and(|a| a < Decimal::ZERO) {
                return fail(format!("bracket {index} has a negative fixed amount"));
            }
            if index > 0 {
                // Every row before the last is closed, checked above.
                let previous_to = self.items[index - 1].amount_to.unwrap_or(Decimal::MAX);
                if item.amount_from < previous_to {
                    return fail(format!("bracket {index} overlaps bracket {}", index - 1));
                }
                if item.amount_from > previous_to {
                    return fail(format!(
                        "gap between bracket {} and bracket {index}",
                        index - 1
                    ));
                }
            }
        }

        match (&self.split_ratio, self.requires_split()) {
            (Some(split), _) => {
                if split.employee_percentage < Decimal::ZERO
                    || split.employer_percentage < Decimal::ZERO
                    || split.employee_percentage + split.employer_percentage
                        != Decimal::ONE_HUNDRED
                {
                    return fail(format!(
                        "split ratio {}/{} does not sum to 100",
                        split.employee_percentage, split.employer_percentage
                    ));
                }
            }
            (None, true) => return fail("contribution formula has no split ratio".to_string()),
            (None, false) => {}
        }

        if self.personal_relief.is_some() && self.formula_type != FormulaType::Income {
            return fail("personal relief is only valid on income formulas".to_string());
        }

        if let Some(order) = &self.deduction_order {
            let mut seen: Vec<&Component> = Vec::new();
            for (phase, component) in order.iter() {
                if *component == Component::Paye {
                    return fail(format!("PAYE cannot be listed in the {phase} phase"));
                }
                if let Component::Custom(name) = component {
                    let category = FormulaCategory::from(name.clone());
                    if !matches!(category, FormulaCategory::Other(_)) {
                        return fail(format!(
                            "custom component '{name}' aliases the statutory category '{category}'"
                        ));
                    }
                }
                if seen.contains(&component) {
                    return fail(format!("component '{component}' is listed more than once"));
                }
                seen.push(component);
            }
        }

        Ok(())
    }
}
