//! Payroll generation for one employee and payment period.
//!
//! [`PayrollGenerator::generate_payroll`] is the single entry point. It
//! validates the request, derives gross pay, runs the deduction engine and
//! PAYE, computes net pay and persists the payslip, all inside one store
//! transaction. Every outcome, including failures, comes back as a
//! [`PayrollResponse`].
//!
//! ## Commands
//!
//! | Command   | No payslip     | Queued / processing / expired | Complete            |
//! |-----------|----------------|-------------------------------|---------------------|
//! | `queue`   | create queued  | returned unchanged            | returned unchanged  |
//! | `process` | compute        | compute                       | returned unchanged  |
//! | `rerun`   | compute        | expire, then compute          | compute             |
//!
//! A rerun refuses approved payslips; they must be nulled or rejected first.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, info_span, warn};

use crate::calculation::{
    AppliedDeduction, CalculatorTable, DeductionEngine, calculate_paye, derive_earnings,
};
use crate::catalog::FormulaCatalog;
use crate::config::EngineSettings;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    ApprovalStatus, AuditAction, AuditStep, Component, DeductionLine, DeductionPhase,
    EmployeeSnapshot, EmploymentType, FormulaOverrides, PaymentPeriod, PayrollStatus, Payslip,
    PayslipAudit, round_money,
};

use super::directory::EmployeeDirectory;
use super::response::PayrollResponse;
use super::store::{PayslipStore, StoreTransaction};

/// Actor recorded on audit entries written by the generator.
pub const GENERATOR_ACTOR: &str = "payroll";

/// Component name used for salary advance recovery lines.
pub const ADVANCE_RECOVERY_COMPONENT: &str = "salary_advance";

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock stopped at a fixed instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// What a generation request asks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayrollCommand {
    /// Create a queued placeholder payslip.
    Queue,
    /// Compute the payslip unless it is already complete.
    #[default]
    Process,
    /// Recompute the payslip even if it is complete.
    Rerun,
}

impl PayrollCommand {
    /// Returns the snake_case name of the command.
    pub fn as_str(&self) -> &'static str {
        match self {
            PayrollCommand::Queue => "queue",
            PayrollCommand::Process => "process",
            PayrollCommand::Rerun => "rerun",
        }
    }
}

impl fmt::Display for PayrollCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayrollCommand {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "queue" => Ok(PayrollCommand::Queue),
            "process" => Ok(PayrollCommand::Process),
            "rerun" => Ok(PayrollCommand::Rerun),
            other => Err(EngineError::validation(
                "command",
                format!("unknown command '{}', expected queue, process or rerun", other),
            )),
        }
    }
}

/// A request to generate one payslip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollRequest {
    /// The employee to pay.
    pub employee_id: String,
    /// The month to pay.
    pub payment_period: PaymentPeriod,
    /// Whether outstanding salary advances are recovered.
    #[serde(default)]
    pub recover_advances: bool,
    /// What to do.
    #[serde(default)]
    pub command: PayrollCommand,
    /// Formula pins.
    #[serde(default)]
    pub formula_overrides: FormulaOverrides,
}

/// Generates payslips.
pub struct PayrollGenerator {
    deductions: DeductionEngine,
    directory: Arc<dyn EmployeeDirectory>,
    store: Arc<PayslipStore>,
    clock: Arc<dyn Clock>,
    max_future_months: u32,
}

impl PayrollGenerator {
    /// Creates a generator using the system clock and statutory calculators.
    pub fn new(
        catalog: Arc<FormulaCatalog>,
        directory: Arc<dyn EmployeeDirectory>,
        store: Arc<PayslipStore>,
        settings: &EngineSettings,
    ) -> Self {
        Self {
            deductions: DeductionEngine::new(catalog),
            directory,
            store,
            clock: Arc::new(SystemClock),
            max_future_months: settings.max_future_months,
        }
    }

    /// Replaces the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the contribution calculators.
    pub fn with_calculators(mut self, calculators: Arc<CalculatorTable>) -> Self {
        self.deductions =
            DeductionEngine::with_calculators(Arc::clone(self.deductions.catalog()), calculators);
        self
    }

    /// The payslip store.
    pub fn store(&self) -> &Arc<PayslipStore> {
        &self.store
    }

    /// The employee directory.
    pub fn directory(&self) -> &Arc<dyn EmployeeDirectory> {
        &self.directory
    }

    /// The clock.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Generates the payslip for `employee_id` in `payment_period`.
    ///
    /// Never fails: errors, and panics raised by the directory or the
    /// calculators, are logged and returned as a failed response, and nothing
    /// is persisted for them.
    pub fn generate_payroll(
        &self,
        employee_id: &str,
        payment_period: PaymentPeriod,
        recover_advances: bool,
        command: PayrollCommand,
        formula_overrides: &FormulaOverrides,
    ) -> PayrollResponse {
        self.generate(&PayrollRequest {
            employee_id: employee_id.to_string(),
            payment_period,
            recover_advances,
            command,
            formula_overrides: formula_overrides.clone(),
        })
    }

    /// Generates the payslip described by `request`.
    pub fn generate(&self, request: &PayrollRequest) -> PayrollResponse {
        let span = info_span!(
            "generate_payroll",
            employee_id = %request.employee_id,
            period = %request.payment_period,
            command = %request.command,
        );
        let _enter = span.enter();
        let start_time = Instant::now();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run(request)))
            .unwrap_or_else(|payload| {
                Err(EngineError::CalculationError {
                    message: format!("payroll generation panicked: {}", panic_message(&*payload)),
                })
            });

        match outcome {
            Ok(payslip) => {
                info!(
                    payslip_id = %payslip.id,
                    status = %payslip.payroll_status,
                    gross_pay = %payslip.gross_pay,
                    net_pay = %payslip.net_pay,
                    duration_us = start_time.elapsed().as_micros(),
                    "Payroll generated"
                );
                PayrollResponse::ok(payslip)
            }
            Err(err) => {
                if err.is_recoverable() {
                    warn!(error = %err, "Payroll request rejected");
                } else {
                    error!(error = %err, "Payroll generation failed");
                }
                PayrollResponse::failed(&err)
            }
        }
    }

    fn run(&self, request: &PayrollRequest) -> EngineResult<Payslip> {
        let employee = self.directory.employee(&request.employee_id)?;
        self.validate(&employee, request.payment_period)?;

        self.store.transaction(|tx| {
            let existing = tx.get(&employee.id, request.payment_period);

            match (request.command, existing) {
                (PayrollCommand::Queue, Some(existing)) => Ok(existing),
                (PayrollCommand::Queue, None) => {
                    let payslip = Payslip::queued(
                        &employee.id,
                        employee.employment_type,
                        request.payment_period,
                        self.clock.now(),
                    );
                    self.record(tx, &payslip, AuditAction::Created);
                    tx.upsert(payslip.clone());
                    Ok(payslip)
                }
                (PayrollCommand::Process, Some(existing)) if existing.is_complete() => Ok(existing),
                (PayrollCommand::Process, existing) => self.compute(tx, existing, &employee, request),
                (PayrollCommand::Rerun, Some(existing)) => {
                    if existing.approval_status == ApprovalStatus::Approved
                        && existing.payroll_status != PayrollStatus::Expired
                    {
                        return Err(EngineError::validation(
                            "approval_status",
                            format!(
                                "payslip {} is approved; null or reject it before rerunning",
                                existing.id
                            ),
                        ));
                    }
                    let existing = if existing.is_pending_generation() {
                        let mut expired = existing;
                        expired.payroll_status = PayrollStatus::Expired;
                        self.record(tx, &expired, AuditAction::Expired);
                        expired
                    } else {
                        existing
                    };
                    self.compute(tx, Some(existing), &employee, request)
                }
                (PayrollCommand::Rerun, None) => self.compute(tx, None, &employee, request),
            }
        })
    }

    fn validate(&self, employee: &EmployeeSnapshot, period: PaymentPeriod) -> EngineResult<()> {
        employee.require_salary_details()?;

        if self.directory.active_contract(&employee.id, period).is_none() {
            return Err(EngineError::validation(
                "contract",
                format!("employee {} has no active contract for {}", employee.id, period),
            ));
        }

        let today = self.clock.now().date_naive();
        let latest = PaymentPeriod::containing(today)
            .plus_months(self.max_future_months)
            .ok_or_else(|| EngineError::validation("payment_period", "period out of range"))?;
        if period > latest {
            return Err(EngineError::validation(
                "payment_period",
                format!(
                    "{} is more than {} month(s) ahead; latest allowed is {}",
                    period, self.max_future_months, latest
                ),
            ));
        }

        Ok(())
    }

    fn record(&self, tx: &mut StoreTransaction<'_>, payslip: &Payslip, action: AuditAction) {
        tx.append_audit(PayslipAudit::record(
            payslip,
            action,
            GENERATOR_ACTOR,
            None,
            self.clock.now(),
        ));
    }

    fn compute(
        &self,
        tx: &mut StoreTransaction<'_>,
        existing: Option<Payslip>,
        employee: &EmployeeSnapshot,
        request: &PayrollRequest,
    ) -> EngineResult<Payslip> {
        let period = request.payment_period;
        let overrides = &request.formula_overrides;
        let now = self.clock.now();

        let present_days = match employee.employment_type {
            EmploymentType::Casual => self.directory.present_days(&employee.id, period),
            _ => 0,
        };
        let one_off_payments = match employee.employment_type {
            EmploymentType::Consultant => self.directory.one_off_payments(&employee.id, period),
            _ => Vec::new(),
        };

        let earnings = derive_earnings(employee, present_days, &one_off_payments)?;
        let gross = round_money(earnings.earnings.gross_pay);

        let breakdown =
            self.deductions
                .calculate_deductions_in_order(gross, employee, period, overrides)?;

        // Amounts are rounded once, per line, and every total below is summed
        // from the rounded lines so the stored payslip adds up to the cent.
        let mut lines: Vec<StoredDeduction> =
            breakdown.applied.iter().map(StoredDeduction::from).collect();
        let phase_total = |lines: &[StoredDeduction], phase: DeductionPhase| -> Decimal {
            lines
                .iter()
                .filter(|l| l.line.phase == phase)
                .map(|l| l.line.employee_amount)
                .sum()
        };
        let before_tax = phase_total(&lines, DeductionPhase::BeforeTax);
        let after_tax = phase_total(&lines, DeductionPhase::AfterTax);
        let after_paye = phase_total(&lines, DeductionPhase::AfterPaye);
        let final_phase = phase_total(&lines, DeductionPhase::Final);

        let taxable = gross - before_tax;
        let paye = calculate_paye(
            self.deductions.catalog(),
            taxable,
            period.last_day(),
            &breakdown.income_category,
            overrides.income.as_deref(),
        )?;
        let net_paye = round_money(paye.net_paye);

        let available = gross - before_tax - net_paye - after_tax - after_paye - final_phase;

        let mut recoveries: Vec<(String, Decimal)> = Vec::new();
        if request.recover_advances {
            let mut room = available.max(Decimal::ZERO);
            for advance in self.directory.outstanding_advances(&employee.id) {
                let amount = round_money(advance.amount_due().min(room));
                if amount <= Decimal::ZERO {
                    continue;
                }
                room -= amount;
                recoveries.push((advance.id, amount));
            }
        }
        let advance_recovery: Decimal = recoveries.iter().map(|(_, amount)| *amount).sum();
        lines.extend(recoveries.iter().map(|(advance_id, amount)| StoredDeduction {
            line: DeductionLine {
                component: Component::Custom(ADVANCE_RECOVERY_COMPONENT.to_string()),
                phase: DeductionPhase::Final,
                employee_amount: *amount,
                employer_amount: Decimal::ZERO,
                formula_id: advance_id.clone(),
            },
            tiers: Vec::new(),
        }));
        let net_pay = available - advance_recovery;

        let created = existing.is_none();
        let mut payslip = existing.unwrap_or_else(|| {
            Payslip::queued(&employee.id, employee.employment_type, period, now)
        });

        payslip.employment_type = employee.employment_type;
        payslip.payroll_status = PayrollStatus::Complete;
        payslip.approval_status = ApprovalStatus::Draft;
        payslip.basic_pay = round_money(earnings.earnings.basic_pay);
        payslip.allowances = round_money(earnings.earnings.allowances);
        payslip.other_payments = round_money(earnings.earnings.other_payments);
        payslip.gross_pay = gross;
        payslip.taxable_pay = taxable;
        payslip.paye = round_money(paye.paye);
        payslip.personal_relief = round_money(paye.personal_relief);
        payslip.net_paye = net_paye;

        let stored = |component: &Component| lines.iter().find(|l| &l.line.component == component);
        let shares = |component: &Component| {
            stored(component)
                .map(|l| (l.line.employee_amount, l.line.employer_amount))
                .unwrap_or((Decimal::ZERO, Decimal::ZERO))
        };
        (payslip.nssf_employee, payslip.nssf_employer) = shares(&Component::Nssf);
        (payslip.shif_employee, payslip.shif_employer) = shares(&Component::Shif);
        (payslip.housing_levy_employee, payslip.housing_levy_employer) =
            shares(&Component::HousingLevy);
        let nssf_tier = |index: usize| {
            stored(&Component::Nssf)
                .and_then(|l| l.tiers.get(index).copied())
                .unwrap_or(Decimal::ZERO)
        };
        payslip.nssf_tier_1_employee = nssf_tier(0);
        payslip.nssf_tier_2_employee = nssf_tier(1);
        payslip.advance_recovery = advance_recovery;

        payslip.deductions_before_tax = before_tax;
        payslip.deductions_after_tax = after_tax;
        payslip.deductions_after_paye = after_paye;
        payslip.deductions_final = final_phase + advance_recovery;
        payslip.net_pay = net_pay;

        payslip.deduction_lines = lines.into_iter().map(|l| l.line).collect();

        payslip.formulas.clear();
        payslip
            .formulas
            .insert("income".to_string(), breakdown.income_formula_id.clone());
        for deduction in &breakdown.applied {
            payslip
                .formulas
                .insert(deduction.component.to_string(), deduction.formula_id.clone());
        }

        payslip.trace = Default::default();
        payslip.trace.extend_steps([earnings.audit_step]);
        payslip.trace.extend_steps(breakdown.audit_steps.iter().cloned());
        payslip.trace.extend_steps([AuditStep {
            step_number: 0,
            rule_id: "taxable_pay".to_string(),
            rule_name: "Taxable Pay".to_string(),
            formula_ref: String::new(),
            input: serde_json::json!({
                "gross_pay": gross.normalize().to_string(),
                "deductions_before_tax": before_tax.normalize().to_string(),
            }),
            output: serde_json::json!({
                "taxable_pay": taxable.normalize().to_string(),
            }),
            reasoning: format!(
                "{} - {} = {}",
                gross.normalize(),
                before_tax.normalize(),
                taxable.normalize()
            ),
        }]);
        payslip.trace.extend_steps([paye.audit_step]);
        if !recoveries.is_empty() {
            payslip.trace.extend_steps([AuditStep {
                step_number: 0,
                rule_id: "advance_recovery".to_string(),
                rule_name: "Salary Advance Recovery".to_string(),
                formula_ref: String::new(),
                input: serde_json::json!({
                    "available": available.normalize().to_string(),
                    "advances": recoveries.iter().map(|(id, _)| id.clone()).collect::<Vec<_>>(),
                }),
                output: serde_json::json!({
                    "recovered": advance_recovery.normalize().to_string(),
                }),
                reasoning: format!(
                    "Recovered {} across {} advance(s), capped at net pay {}",
                    advance_recovery.normalize(),
                    recoveries.len(),
                    available.normalize()
                ),
            }]);
        }
        payslip.trace.extend_steps([AuditStep {
            step_number: 0,
            rule_id: "net_pay".to_string(),
            rule_name: "Net Pay".to_string(),
            formula_ref: String::new(),
            input: serde_json::json!({
                "gross_pay": gross.normalize().to_string(),
                "before_tax": before_tax.normalize().to_string(),
                "net_paye": net_paye.normalize().to_string(),
                "after_tax": after_tax.normalize().to_string(),
                "after_paye": after_paye.normalize().to_string(),
                "final": (final_phase + advance_recovery).normalize().to_string(),
            }),
            output: serde_json::json!({
                "net_pay": net_pay.to_string(),
            }),
            reasoning: format!(
                "{} - {} - {} - {} - {} - {} = {}",
                gross.normalize(),
                before_tax.normalize(),
                net_paye.normalize(),
                after_tax.normalize(),
                after_paye.normalize(),
                (final_phase + advance_recovery).normalize(),
                net_pay
            ),
        }]);
        payslip.trace.warnings = breakdown.warnings.clone();
        payslip.updated_at = now;

        self.record(
            tx,
            &payslip,
            if created {
                AuditAction::Created
            } else {
                AuditAction::Draft
            },
        );
        tx.upsert(payslip.clone());
        Ok(payslip)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// A deduction line as stored, with NSSF-style tier shares kept alongside.
struct StoredDeduction {
    line: DeductionLine,
    /// Rounded employee share per tier.
    tiers: Vec<Decimal>,
}

impl From<&AppliedDeduction> for StoredDeduction {
    /// Tiered components are rounded per tier so the tiers sum to the line,
    /// unless a minimum contribution lifted the total above its tiers.
    fn from(deduction: &AppliedDeduction) -> Self {
        let tiers_cover_total = !deduction.tiers.is_empty()
            && deduction.tiers.iter().map(|t| t.employee).sum::<Decimal>()
                == deduction.employee_amount;
        let (employee_amount, employer_amount, tiers) = if !tiers_cover_total {
            (
                round_money(deduction.employee_amount),
                round_money(deduction.employer_amount),
                Vec::new(),
            )
        } else {
            let tiers: Vec<Decimal> = deduction.tiers.iter().map(|t| round_money(t.employee)).collect();
            let employer: Decimal = deduction.tiers.iter().map(|t| round_money(t.employer)).sum();
            (tiers.iter().copied().sum::<Decimal>(), employer, tiers)
        };
        Self {
            line: DeductionLine {
                component: deduction.component.clone(),
                phase: deduction.phase,
                employee_amount,
                employer_amount,
                formula_id: deduction.formula_id.clone(),
            },
            tiers,
        }
    }
}
