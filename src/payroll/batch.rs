//! Batch payroll runs over many employees.
//!
//! Each employee is generated on its own blocking task, in its own store
//! transaction, with at most `concurrency` running at once. One employee
//! failing (or panicking) does not affect the others. Results come back in
//! the order of the request's employee ids.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::models::{FormulaOverrides, PaymentPeriod};

use super::generator::{PayrollCommand, PayrollGenerator, PayrollRequest};
use super::response::PayrollResponse;

/// A shared flag that stops a batch from scheduling further employees.
///
/// Employees already running finish, and their payslips stay committed.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Creates an unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once the flag has been set.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A batch of employees to pay for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    /// The employees, in the order results are reported.
    pub employee_ids: Vec<String>,
    /// The month to pay.
    pub payment_period: PaymentPeriod,
    /// Whether outstanding salary advances are recovered.
    #[serde(default)]
    pub recover_advances: bool,
    /// What to do for each employee.
    #[serde(default)]
    pub command: PayrollCommand,
    /// Formula pins applied to every employee.
    #[serde(default)]
    pub formula_overrides: FormulaOverrides,
}

/// How one employee in a batch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchItemStatus {
    /// The payslip was generated.
    Succeeded,
    /// Generation failed; nothing was persisted for the employee.
    Failed,
    /// The batch was cancelled before the employee was scheduled.
    Cancelled,
}

/// The result for one employee in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItemResult {
    /// The employee.
    pub employee_id: String,
    /// How it ended.
    pub status: BatchItemStatus,
    /// The generation response, when the employee ran to completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<PayrollResponse>,
    /// Failure or cancellation detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Counts of batch outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Employees paid.
    pub succeeded: usize,
    /// Employees that failed.
    pub failed: usize,
    /// Employees never scheduled.
    pub cancelled: usize,
}

impl BatchSummary {
    /// Tallies `results`.
    pub fn of(results: &[BatchItemResult]) -> Self {
        results.iter().fold(Self::default(), |mut summary, item| {
            match item.status {
                BatchItemStatus::Succeeded => summary.succeeded += 1,
                BatchItemStatus::Failed => summary.failed += 1,
                BatchItemStatus::Cancelled => summary.cancelled += 1,
            }
            summary
        })
    }
}

/// Runs payroll for many employees concurrently.
pub struct BatchRunner {
    generator: Arc<PayrollGenerator>,
    concurrency: usize,
}

impl BatchRunner {
    /// Creates a runner with at most `concurrency` employees in flight.
    pub fn new(generator: Arc<PayrollGenerator>, concurrency: usize) -> Self {
        Self {
            generator,
            concurrency: concurrency.max(1),
        }
    }

    /// The generator each employee runs through.
    pub fn generator(&self) -> &Arc<PayrollGenerator> {
        &self.generator
    }

    /// Runs the batch.
    ///
    /// Returns one result per requested employee, in request order.
    pub async fn run(&self, request: BatchRequest, cancel: &CancellationFlag) -> Vec<BatchItemResult> {
        let start_time = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut scheduled: Vec<(String, Option<JoinHandle<PayrollResponse>>)> =
            Vec::with_capacity(request.employee_ids.len());

        for employee_id in &request.employee_ids {
            if cancel.is_cancelled() {
                scheduled.push((employee_id.clone(), None));
                continue;
            }

            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                scheduled.push((employee_id.clone(), None));
                continue;
            };

            // The flag may have been set while waiting for a slot.
            if cancel.is_cancelled() {
                scheduled.push((employee_id.clone(), None));
                continue;
            }

            let generator = Arc::clone(&self.generator);
            let payroll_request = PayrollRequest {
                employee_id: employee_id.clone(),
                payment_period: request.payment_period,
                recover_advances: request.recover_advances,
                command: request.command,
                formula_overrides: request.formula_overrides.clone(),
            };
            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                generator.generate(&payroll_request)
            });
            scheduled.push((employee_id.clone(), Some(handle)));
        }

        let mut results = Vec::with_capacity(scheduled.len());
        for (employee_id, handle) in scheduled {
            let item = match handle {
                None => BatchItemResult {
                    employee_id,
                    status: BatchItemStatus::Cancelled,
                    response: None,
                    detail: Some("batch cancelled before the employee was scheduled".to_string()),
                },
                Some(handle) => match handle.await {
                    Ok(response) => BatchItemResult {
                        employee_id,
                        status: if response.success {
                            BatchItemStatus::Succeeded
                        } else {
                            BatchItemStatus::Failed
                        },
                        detail: response.detail().map(str::to_string),
                        response: Some(response),
                    },
                    Err(join_error) => {
                        warn!(employee_id = %employee_id, error = %join_error, "Payroll worker failed");
                        BatchItemResult {
                            employee_id,
                            status: BatchItemStatus::Failed,
                            response: None,
                            detail: Some(format!("worker failed: {}", join_error)),
                        }
                    }
                },
            };
            results.push(item);
        }

        let summary = BatchSummary::of(&results);
        info!(
            period = %request.payment_period,
            command = %request.command,
            employees = results.len(),
            succeeded = summary.succeeded,
            failed = summary.failed,
            cancelled = summary.cancelled,
            duration_ms = start_time.elapsed().as_millis(),
            "Batch payroll run finished"
        );
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(status: BatchItemStatus) -> BatchItemResult {
        BatchItemResult {
            employee_id: "emp".to_string(),
            status,
            response: None,
            detail: None,
        }
    }

    #[test]
    fn test_cancellation_flag_is_shared() {
        let flag = CancellationFlag::new();
        let clone = flag.clone();
        assert!(!flag.is_cancelled());
        clone.cancel();
        assert!(flag.is_cancelled());
    }

    #[test]
    fn test_summary_counts() {
        let summary = BatchSummary::of(&[
            item(BatchItemStatus::Succeeded),
            item(BatchItemStatus::Succeeded),
            item(BatchItemStatus::Failed),
            item(BatchItemStatus::Cancelled),
        ]);
        assert_eq!(
            summary,
            BatchSummary {
                succeeded: 2,
                failed: 1,
                cancelled: 1
            }
        );
    }

    #[test]
    fn test_batch_request_defaults() {
        let request: BatchRequest = serde_json::from_str(
            r#"{"employee_ids": ["a", "b"], "payment_period": "2025-03"}"#,
        )
        .unwrap();
        assert_eq!(request.command, PayrollCommand::Process);
        assert!(!request.recover_advances);
        assert!(request.formula_overrides.is_empty());
    }
}
