//! Employee snapshot and related HR value types.
//!
//! These are plain value types handed to the engine by the HR directory.
//! Calculators only ever see these snapshots, never storage records.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::PaymentPeriod;
use crate::models::FormulaCategory;

/// Represents the type of employment arrangement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentType {
    /// Permanent or fixed-term staff paid a monthly salary.
    Salaried,
    /// Casual staff paid a daily rate for each day present.
    Casual,
    /// Consultants paid a base fee plus one-off payments.
    Consultant,
}

impl EmploymentType {
    /// Returns the snake_case name of the employment type.
    pub fn as_str(&self) -> &'static str {
        match self {
            EmploymentType::Salaried => "salaried",
            EmploymentType::Casual => "casual",
            EmploymentType::Consultant => "consultant",
        }
    }
}

/// Which income-tax table applies to the employee.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncomeTaxMode {
    /// Main employment; personal relief applies.
    #[default]
    Primary,
    /// Secondary employment.
    Secondary,
}

impl IncomeTaxMode {
    /// The income formula category for this mode.
    pub fn category(&self) -> FormulaCategory {
        match self {
            IncomeTaxMode::Primary => FormulaCategory::Primary,
            IncomeTaxMode::Secondary => FormulaCategory::Secondary,
        }
    }
}

/// A recurring monthly allowance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allowance {
    /// Name of the allowance (e.g. "transport").
    pub name: String,
    /// Monthly amount.
    pub amount: Decimal,
}

fn default_true() -> bool {
    true
}

/// Pay configuration for an employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryDetails {
    /// Monthly salary, or the base fee for consultants.
    #[serde(default)]
    pub monthly_salary: Option<Decimal>,
    /// Daily rate for casual employees.
    #[serde(default)]
    pub daily_rate: Option<Decimal>,
    /// Recurring allowances added to gross pay.
    #[serde(default)]
    pub allowances: Vec<Allowance>,
    /// Whether SHIF (or legacy NHIF) is deducted.
    #[serde(default = "default_true")]
    pub deduct_shif_or_nhif: bool,
    /// Whether NSSF is deducted.
    #[serde(default = "default_true")]
    pub deduct_nssf: bool,
    /// Which income-tax table applies.
    #[serde(default)]
    pub income_tax: IncomeTaxMode,
}

impl SalaryDetails {
    /// Sum of all recurring allowances.
    pub fn allowances_total(&self) -> Decimal {
        self.allowances.iter().map(|a| a.amount).sum()
    }
}

/// A snapshot of an employee as seen by the payroll engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeSnapshot {
    /// Unique identifier for the employee.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// The type of employment arrangement.
    pub employment_type: EmploymentType,
    /// Pay configuration; absent until HR captures it.
    #[serde(default)]
    pub salary_details: Option<SalaryDetails>,
}

impl EmployeeSnapshot {
    /// Returns the salary details or a validation error when missing.
    pub fn require_salary_details(&self) -> crate::error::EngineResult<&SalaryDetails> {
        self.salary_details.as_ref().ok_or_else(|| {
            crate::error::EngineError::validation(
                "salary_details",
                format!("employee {} has no salary details", self.id),
            )
        })
    }
}

/// An employment contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    /// First day of the contract.
    pub start_date: NaiveDate,
    /// Last day of the contract; `None` for open-ended contracts.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl Contract {
    /// Returns true if the contract is active at any point of the period.
    ///
    /// # Example
    ///
    /// ```
    /// use payroll_engine::models::{Contract, PaymentPeriod};
    /// use chrono::NaiveDate;
    ///
    /// let contract = Contract {
    ///     start_date: NaiveDate::from_ymd_opt(2025, 3, 20).unwrap(),
    ///     end_date: None,
    /// };
    /// assert!(contract.covers(&"2025-03".parse::<PaymentPeriod>().unwrap()));
    /// assert!(!contract.covers(&"2025-02".parse::<PaymentPeriod>().unwrap()));
    /// ```
    pub fn covers(&self, period: &PaymentPeriod) -> bool {
        self.start_date <= period.last_day()
            && self.end_date.is_none_or(|end| end >= period.first_day())
    }
}

/// A one-off payment (bonus, reimbursement) in a payment period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneOffPayment {
    /// Description of the payment.
    pub description: String,
    /// Amount paid.
    pub amount: Decimal,
}

/// An outstanding salary advance recovered in installments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryAdvance {
    /// Identifier of the advance.
    pub id: String,
    /// Amount still owed.
    pub balance: Decimal,
    /// Amount to recover each period.
    pub installment: Decimal,
}

impl SalaryAdvance {
    /// The amount due this period: the installment, capped at the balance.
    pub fn amount_due(&self) -> Decimal {
        self.installment.min(self.balance).max(Decimal::ZERO)
    }
}
