//! Gross pay derivation per employment type.
//!
//! - Salaried: monthly salary plus allowances.
//! - Casual: daily rate times days present, plus allowances.
//! - Consultant: base fee plus the period's one-off payments, plus allowances.

use rust_decimal::Decimal;

use crate::error::{EngineError, EngineResult};
use crate::models::{AuditStep, Earnings, EmployeeSnapshot, EmploymentType, OneOffPayment};

/// The result of deriving earnings, including the audit step.
#[derive(Debug, Clone)]
pub struct EarningsResult {
    /// The derived earnings.
    pub earnings: Earnings,
    /// The audit step recording the derivation.
    pub audit_step: AuditStep,
}

fn non_negative(field: &str, amount: Decimal) -> EngineResult<Decimal> {
    if amount < Decimal::ZERO {
        return Err(EngineError::validation(
            field,
            format!("must not be negative, got {}", amount),
        ));
    }
    Ok(amount)
}

/// Derives basic pay, allowances, other payments and gross pay.
///
/// `present_days` is only read for casual employees and `one_off_payments`
/// only for consultants.
///
/// # Errors
///
/// Returns a `Validation` error when the salary details are missing, the
/// rate the employment type needs is absent, or any amount is negative.
///
/// # Examples
///
/// ```
/// use payroll_engine::calculation::derive_earnings;
/// use payroll_engine::models::{EmployeeSnapshot, EmploymentType, SalaryDetails};
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
///
/// let employee = EmployeeSnapshot {
///     id: "emp_010".to_string(),
///     name: "Otieno".to_string(),
///     employment_type: EmploymentType::Casual,
///     salary_details: Some(SalaryDetails {
///         monthly_salary: None,
///         daily_rate: Some(Decimal::from_str("1200").unwrap()),
///         allowances: vec![],
///         deduct_shif_or_nhif: true,
///         deduct_nssf: true,
///         income_tax: Default::default(),
///     }),
/// };
///
/// let result = derive_earnings(&employee, 18, &[]).unwrap();
/// assert_eq!(result.earnings.gross_pay, Decimal::from_str("21600").unwrap());
/// ```
pub fn derive_earnings(
    employee: &EmployeeSnapshot,
    present_days: u32,
    one_off_payments: &[OneOffPayment],
) -> EngineResult<EarningsResult> {
    let details = employee.require_salary_details()?;

    for allowance in &details.allowances {
        non_negative(&format!("allowances.{}", allowance.name), allowance.amount)?;
    }
    let allowances = details.allowances_total();

    let (basic_pay, other_payments, basis) = match employee.employment_type {
        EmploymentType::Salaried => {
            let salary = details.monthly_salary.ok_or_else(|| {
                EngineError::validation(
                    "monthly_salary",
                    format!("salaried employee {} has no monthly salary", employee.id),
                )
            })?;
            let salary = non_negative("monthly_salary", salary)?;
            (salary, Decimal::ZERO, format!("salary {}", salary.normalize()))
        }
        EmploymentType::Casual => {
            let rate = details.daily_rate.ok_or_else(|| {
                EngineError::validation(
                    "daily_rate",
                    format!("casual employee {} has no daily rate", employee.id),
                )
            })?;
            let rate = non_negative("daily_rate", rate)?;
            let basic = rate * Decimal::from(present_days);
            (
                basic,
                Decimal::ZERO,
                format!("{} days x {}", present_days, rate.normalize()),
            )
        }
        EmploymentType::Consultant => {
            let fee = details.monthly_salary.ok_or_else(|| {
                EngineError::validation(
                    "monthly_salary",
                    format!("consultant {} has no base fee", employee.id),
                )
            })?;
            let fee = non_negative("monthly_salary", fee)?;
            let mut other = Decimal::ZERO;
            for payment in one_off_payments {
                other += non_negative(
                    &format!("one_off_payments.{}", payment.description),
                    payment.amount,
                )?;
            }
            (
                fee,
                other,
                format!(
                    "fee {} + {} one-off payment(s) {}",
                    fee.normalize(),
                    one_off_payments.len(),
                    other.normalize()
                ),
            )
        }
    };

    let gross_pay = basic_pay + allowances + other_payments;

    let audit_step = AuditStep {
        step_number: 0,
        rule_id: "earnings".to_string(),
        rule_name: "Gross Pay".to_string(),
        formula_ref: String::new(),
        input: serde_json::json!({
            "employment_type": employee.employment_type.as_str(),
            "present_days": present_days,
            "one_off_payments": one_off_payments.len(),
        }),
        output: serde_json::json!({
            "basic_pay": basic_pay.normalize().to_string(),
            "allowances": allowances.normalize().to_string(),
            "other_payments": other_payments.normalize().to_string(),
            "gross_pay": gross_pay.normalize().to_string(),
        }),
        reasoning: format!(
            "{} + allowances {} = gross {}",
            basis,
            allowances.normalize(),
            gross_pay.normalize()
        ),
    };

    Ok(EarningsResult {
        earnings: Earnings {
            basic_pay,
            allowances,
            other_payments,
            gross_pay,
        },
        audit_step,
    })
}
