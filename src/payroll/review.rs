//! The payslip approval workflow.
//!
//! ```text
//! draft --submit--> pending --approve--> approved
//!                      \----reject----> rejected
//! any --nullify--> payroll_status expired
//! ```
//!
//! Submit, approve and reject need a complete payslip. Every transition
//! appends a [`PayslipAudit`] entry in the same transaction as the update.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::{ApprovalStatus, AuditAction, PayrollStatus, Payslip, PayslipAudit};

use super::generator::Clock;
use super::store::PayslipStore;

/// Moves payslips through review.
pub struct PayslipReview {
    store: Arc<PayslipStore>,
    clock: Arc<dyn Clock>,
}

impl PayslipReview {
    /// Creates a review service over `store`.
    pub fn new(store: Arc<PayslipStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Submits a draft payslip for approval.
    pub fn submit(&self, payslip_id: Uuid, actor: &str, note: Option<String>) -> EngineResult<Payslip> {
        self.transition(payslip_id, actor, note, AuditAction::Submitted, |payslip| {
            require_complete(payslip)?;
            require_approval(payslip, ApprovalStatus::Draft, "submit")?;
            payslip.approval_status = ApprovalStatus::Pending;
            Ok(())
        })
    }

    /// Approves a pending payslip.
    pub fn approve(&self, payslip_id: Uuid, actor: &str, note: Option<String>) -> EngineResult<Payslip> {
        self.transition(payslip_id, actor, note, AuditAction::Approved, |payslip| {
            require_complete(payslip)?;
            require_approval(payslip, ApprovalStatus::Pending, "approve")?;
            payslip.approval_status = ApprovalStatus::Approved;
            Ok(())
        })
    }

    /// Rejects a pending payslip.
    pub fn reject(&self, payslip_id: Uuid, actor: &str, note: Option<String>) -> EngineResult<Payslip> {
        self.transition(payslip_id, actor, note, AuditAction::Rejected, |payslip| {
            require_complete(payslip)?;
            require_approval(payslip, ApprovalStatus::Pending, "reject")?;
            payslip.approval_status = ApprovalStatus::Rejected;
            Ok(())
        })
    }

    /// Voids a payslip, whatever its state.
    pub fn nullify(&self, payslip_id: Uuid, actor: &str, note: Option<String>) -> EngineResult<Payslip> {
        self.transition(payslip_id, actor, note, AuditAction::Nulled, |payslip| {
            if payslip.payroll_status == PayrollStatus::Expired {
                return Err(EngineError::validation(
                    "payroll_status",
                    format!("payslip {} is already void", payslip.id),
                ));
            }
            payslip.payroll_status = PayrollStatus::Expired;
            Ok(())
        })
    }

    fn transition(
        &self,
        payslip_id: Uuid,
        actor: &str,
        note: Option<String>,
        action: AuditAction,
        apply: impl FnOnce(&mut Payslip) -> EngineResult<()>,
    ) -> EngineResult<Payslip> {
        let payslip = self.store.transaction(|tx| {
            let mut payslip = tx.get_by_id(payslip_id).ok_or_else(|| EngineError::NotFound {
                entity: "payslip".to_string(),
                id: payslip_id.to_string(),
            })?;
            apply(&mut payslip)?;
            let now = self.clock.now();
            payslip.updated_at = now;
            tx.append_audit(PayslipAudit::record(&payslip, action, actor, note, now));
            tx.upsert(payslip.clone());
            Ok(payslip)
        })?;

        info!(
            payslip_id = %payslip.id,
            employee_id = %payslip.employee_id,
            period = %payslip.payment_period,
            action = ?action,
            actor,
            "Payslip review transition"
        );
        Ok(payslip)
    }
}

fn require_complete(payslip: &Payslip) -> EngineResult<()> {
    if !payslip.is_complete() {
        return Err(EngineError::validation(
            "payroll_status",
            format!(
                "payslip {} is {}; only complete payslips can be reviewed",
                payslip.id, payslip.payroll_status
            ),
        ));
    }
    Ok(())
}

fn require_approval(payslip: &Payslip, expected: ApprovalStatus, verb: &str) -> EngineResult<()> {
    if payslip.approval_status != expected {
        return Err(EngineError::validation(
            "approval_status",
            format!(
                "cannot {} payslip {} while it is {}",
                verb, payslip.id, payslip.approval_status
            ),
        ));
    }
    Ok(())
}
