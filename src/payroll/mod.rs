//! Payroll generation, storage, review and batch runs.
//!
//! The calculation modules are pure; this module wires them to the employee
//! directory and the payslip store:
//!
//! - [`PayrollGenerator`]: one employee, one period, one transaction.
//! - [`BatchRunner`]: many employees concurrently, with cancellation.
//! - [`PayslipStore`]: payslips keyed by employee and period, plus the audit log.
//! - [`PayslipReview`]: the approval workflow.
//! - [`EmployeeDirectory`]: the HR data payroll consumes.

mod batch;
mod directory;
mod generator;
mod response;
mod review;
mod store;

pub use batch::{
    BatchItemResult, BatchItemStatus, BatchRequest, BatchRunner, BatchSummary, CancellationFlag,
};
pub use directory::{EmployeeDirectory, EmployeeRecord, InMemoryDirectory};
pub use generator::{
    ADVANCE_RECOVERY_COMPONENT, Clock, FixedClock, GENERATOR_ACTOR, PayrollCommand,
    PayrollGenerator, PayrollRequest, SystemClock,
};
pub use response::{ErrorDetail, PayrollResponse};
pub use review::PayslipReview;
pub use store::{PayslipStore, StoreTransaction};
