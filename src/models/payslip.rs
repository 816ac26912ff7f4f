//! Payslip and payslip audit models.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AuditTrace, DeductionLine, EmploymentType, PaymentPeriod};

/// Generation state of a payslip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayrollStatus {
    /// Accepted for generation; amounts are still zero.
    Queued,
    /// Being computed.
    Processing,
    /// Amounts computed and persisted.
    Complete,
    /// Superseded by a rerun or nulled.
    Expired,
}

/// Review state of a payslip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Not yet submitted for review.
    #[default]
    Draft,
    /// Awaiting approval.
    Pending,
    /// Approved for payment.
    Approved,
    /// Sent back for correction.
    Rejected,
}

impl fmt::Display for PayrollStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PayrollStatus::Queued => "queued",
            PayrollStatus::Processing => "processing",
            PayrollStatus::Complete => "complete",
            PayrollStatus::Expired => "expired",
        };
        f.write_str(name)
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApprovalStatus::Draft => "draft",
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// A payslip: the persisted result of one payroll generation.
///
/// Uniquely keyed by `(employee_id, payment_period)`. All monetary fields are
/// rounded to cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payslip {
    /// Identifier, stable across regenerations of the same key.
    pub id: Uuid,
    /// The employee paid.
    pub employee_id: String,
    /// The month paid.
    pub payment_period: PaymentPeriod,
    /// Employment type at generation time.
    pub employment_type: EmploymentType,
    /// Generation state.
    pub payroll_status: PayrollStatus,
    /// Review state.
    pub approval_status: ApprovalStatus,

    /// Salary, fee, or daily rate times days present.
    pub basic_pay: Decimal,
    /// Recurring allowances.
    pub allowances: Decimal,
    /// One-off payments.
    pub other_payments: Decimal,
    /// Total earnings.
    pub gross_pay: Decimal,
    /// Gross pay less before-tax deductions.
    pub taxable_pay: Decimal,
    /// Income tax before relief.
    pub paye: Decimal,
    /// Personal relief applied against PAYE.
    pub personal_relief: Decimal,
    /// PAYE withheld: `max(0, paye - relief)`.
    pub net_paye: Decimal,

    /// NSSF employee contribution.
    pub nssf_employee: Decimal,
    /// NSSF tier I employee contribution.
    pub nssf_tier_1_employee: Decimal,
    /// NSSF tier II employee contribution.
    pub nssf_tier_2_employee: Decimal,
    /// NSSF employer contribution.
    pub nssf_employer: Decimal,
    /// SHIF/NHIF employee contribution.
    pub shif_employee: Decimal,
    /// SHIF/NHIF employer contribution.
    pub shif_employer: Decimal,
    /// Housing levy employee contribution.
    pub housing_levy_employee: Decimal,
    /// Housing levy employer contribution.
    pub housing_levy_employer: Decimal,
    /// Salary advance recovered this period.
    pub advance_recovery: Decimal,

    /// Total deducted before tax.
    pub deductions_before_tax: Decimal,
    /// Total deducted after tax.
    pub deductions_after_tax: Decimal,
    /// Total deducted after PAYE.
    pub deductions_after_paye: Decimal,
    /// Total deducted last.
    pub deductions_final: Decimal,
    /// Take-home pay.
    pub net_pay: Decimal,

    /// Every deduction taken, in application order.
    pub deduction_lines: Vec<DeductionLine>,
    /// Formula ids used, keyed by component name (plus "income").
    pub formulas: BTreeMap<String, String>,
    /// Step-by-step record of the calculation.
    pub trace: AuditTrace,

    /// When the payslip row was first created.
    pub created_at: DateTime<Utc>,
    /// When the payslip row was last written.
    pub updated_at: DateTime<Utc>,
}

impl Payslip {
    /// A zero-amount payslip in the queued state.
    pub fn queued(
        employee_id: &str,
        employment_type: EmploymentType,
        payment_period: PaymentPeriod,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            employee_id: employee_id.to_string(),
            payment_period,
            employment_type,
            payroll_status: PayrollStatus::Queued,
            approval_status: ApprovalStatus::Draft,
            basic_pay: Decimal::ZERO,
            allowances: Decimal::ZERO,
            other_payments: Decimal::ZERO,
            gross_pay: Decimal::ZERO,
            taxable_pay: Decimal::ZERO,
            paye: Decimal::ZERO,
            personal_relief: Decimal::ZERO,
            net_paye: Decimal::ZERO,
            nssf_employee: Decimal::ZERO,
            nssf_tier_1_employee: Decimal::ZERO,
            nssf_tier_2_employee: Decimal::ZERO,
            nssf_employer: Decimal::ZERO,
            shif_employee: Decimal::ZERO,
            shif_employer: Decimal::ZERO,
            housing_levy_employee: Decimal::ZERO,
            housing_levy_employer: Decimal::ZERO,
            advance_recovery: Decimal::ZERO,
            deductions_before_tax: Decimal::ZERO,
            deductions_after_tax: Decimal::ZERO,
            deductions_after_paye: Decimal::ZERO,
            deductions_final: Decimal::ZERO,
            net_pay: Decimal::ZERO,
            deduction_lines: Vec::new(),
            formulas: BTreeMap::new(),
            trace: AuditTrace::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true once amounts have been computed.
    pub fn is_complete(&self) -> bool {
        self.payroll_status == PayrollStatus::Complete
    }

    /// Returns true while a generation job is outstanding for this row.
    pub fn is_pending_generation(&self) -> bool {
        matches!(
            self.payroll_status,
            PayrollStatus::Queued | PayrollStatus::Processing
        )
    }

    /// Sum of all four phase totals.
    pub fn total_deductions(&self) -> Decimal {
        self.deductions_before_tax
            + self.deductions_after_tax
            + self.deductions_after_paye
            + self.deductions_final
    }

    /// Total employer cost: gross pay plus employer contributions.
    pub fn employer_cost(&self) -> Decimal {
        self.gross_pay
            + self
                .deduction_lines
                .iter()
                .map(|line| line.employer_amount)
                .sum::<Decimal>()
    }
}

/// The transition recorded by a payslip audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// The payslip row was created.
    Created,
    /// The payslip was recomputed and returned to draft.
    Draft,
    /// The payslip was submitted for approval.
    Submitted,
    /// The payslip was approved.
    Approved,
    /// The payslip was rejected.
    Rejected,
    /// The payslip was voided.
    Nulled,
    /// An outstanding generation was superseded.
    Expired,
}

/// An immutable record of a payslip state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayslipAudit {
    /// Identifier of the audit entry.
    pub id: Uuid,
    /// The payslip concerned.
    pub payslip_id: Uuid,
    /// The employee the payslip belongs to.
    pub employee_id: String,
    /// The month of the payslip.
    pub payment_period: PaymentPeriod,
    /// What happened.
    pub action: AuditAction,
    /// Who did it.
    pub actor: String,
    /// Optional free-text note (e.g. rejection reason).
    pub note: Option<String>,
    /// Payroll status after the transition.
    pub payroll_status: PayrollStatus,
    /// Approval status after the transition.
    pub approval_status: ApprovalStatus,
    /// When it happened.
    pub recorded_at: DateTime<Utc>,
}

impl PayslipAudit {
    /// Records `action` on `payslip` as it stands after the transition.
    pub fn record(
        payslip: &Payslip,
        action: AuditAction,
        actor: &str,
        note: Option<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            payslip_id: payslip.id,
            employee_id: payslip.employee_id.clone(),
            payment_period: payslip.payment_period,
            action,
            actor: actor.to_string(),
            note,
            payroll_status: payslip.payroll_status,
            approval_status: payslip.approval_status,
            recorded_at,
        }
    }
}
