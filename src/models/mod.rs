//! Core data models for the payroll engine.
//!
//! This module contains all the domain models used throughout the engine.

mod calculation_result;
mod employee;
mod formula;
mod overrides;
mod payment_period;
mod payslip;

pub use calculation_result::{
    AuditStep, AuditTrace, AuditWarning, DeductionLine, Earnings, round_money,
};
pub use employee::{
    Allowance, Contract, EmployeeSnapshot, EmploymentType, IncomeTaxMode, OneOffPayment,
    SalaryAdvance, SalaryDetails,
};
pub use formula::{
    CalculationMethod, Component, DeductionOrder, DeductionPhase, Formula, FormulaCategory,
    FormulaItem, FormulaType, SplitRatio,
};
pub use overrides::FormulaOverrides;
pub use payment_period::PaymentPeriod;
pub use payslip::{ApprovalStatus, AuditAction, PayrollStatus, Payslip, PayslipAudit};
