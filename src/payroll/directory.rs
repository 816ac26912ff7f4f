//! The HR directory the payroll generator reads employees from.
//!
//! HR data entry, attendance and leave live outside the engine; the generator
//! only consumes them through [`EmployeeDirectory`]. [`InMemoryDirectory`] is
//! the implementation used by tests and the CLI, loadable from a YAML roster.

use std::collections::BTreeMap;
use std::path::Path;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::load_yaml;
use crate::error::{EngineError, EngineResult};
use crate::models::{Contract, EmployeeSnapshot, OneOffPayment, PaymentPeriod, SalaryAdvance};

/// Read access to HR data needed for payroll.
pub trait EmployeeDirectory: Send + Sync {
    /// The employee snapshot, or `NotFound`.
    fn employee(&self, employee_id: &str) -> EngineResult<EmployeeSnapshot>;

    /// The contract covering `period`, if any.
    fn active_contract(&self, employee_id: &str, period: PaymentPeriod) -> Option<Contract>;

    /// Days the employee was present during `period`.
    fn present_days(&self, employee_id: &str, period: PaymentPeriod) -> u32;

    /// One-off payments made during `period`.
    fn one_off_payments(&self, employee_id: &str, period: PaymentPeriod) -> Vec<OneOffPayment>;

    /// Salary advances with an outstanding balance.
    fn outstanding_advances(&self, employee_id: &str) -> Vec<SalaryAdvance>;

    /// Ids of every employee, in a stable order.
    fn employee_ids(&self) -> Vec<String>;
}

/// An employee together with the HR records payroll consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeRecord {
    /// The employee snapshot.
    #[serde(flatten)]
    pub employee: EmployeeSnapshot,
    /// Employment contracts.
    #[serde(default)]
    pub contracts: Vec<Contract>,
    /// Days present, per payment period.
    #[serde(default)]
    pub attendance: BTreeMap<PaymentPeriod, u32>,
    /// One-off payments, per payment period.
    #[serde(default)]
    pub one_off_payments: BTreeMap<PaymentPeriod, Vec<OneOffPayment>>,
    /// Salary advances.
    #[serde(default)]
    pub advances: Vec<SalaryAdvance>,
}

impl EmployeeRecord {
    /// A record with no contracts, attendance, payments or advances.
    pub fn new(employee: EmployeeSnapshot) -> Self {
        Self {
            employee,
            contracts: Vec::new(),
            attendance: BTreeMap::new(),
            one_off_payments: BTreeMap::new(),
            advances: Vec::new(),
        }
    }

    /// Adds a contract.
    pub fn with_contract(mut self, contract: Contract) -> Self {
        self.contracts.push(contract);
        self
    }

    /// Records days present in `period`.
    pub fn with_attendance(mut self, period: PaymentPeriod, days: u32) -> Self {
        self.attendance.insert(period, days);
        self
    }

    /// Adds a one-off payment in `period`.
    pub fn with_one_off_payment(mut self, period: PaymentPeriod, payment: OneOffPayment) -> Self {
        self.one_off_payments.entry(period).or_default().push(payment);
        self
    }

    /// Adds a salary advance.
    pub fn with_advance(mut self, advance: SalaryAdvance) -> Self {
        self.advances.push(advance);
        self
    }
}

#[derive(Debug, Deserialize)]
struct Roster {
    employees: Vec<EmployeeRecord>,
}

/// An [`EmployeeDirectory`] held in memory.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    records: RwLock<BTreeMap<String, EmployeeRecord>>,
}

impl InMemoryDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a roster file with a top-level `employees` list.
    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let roster: Roster = load_yaml(path.as_ref())?;
        Self::from_records(roster.employees)
    }

    /// Builds a directory from records; employee ids must be unique.
    pub fn from_records(records: impl IntoIterator<Item = EmployeeRecord>) -> EngineResult<Self> {
        let directory = Self::new();
        for record in records {
            if directory.contains(&record.employee.id) {
                return Err(EngineError::validation(
                    "employees",
                    format!("employee {} appears more than once", record.employee.id),
                ));
            }
            directory.upsert(record);
        }
        Ok(directory)
    }

    /// Inserts or replaces a record.
    pub fn upsert(&self, record: EmployeeRecord) {
        self.records
            .write()
            .insert(record.employee.id.clone(), record);
    }

    /// Returns true if the employee exists.
    pub fn contains(&self, employee_id: &str) -> bool {
        self.records.read().contains_key(employee_id)
    }

    /// Number of employees.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if the directory has no employees.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn with_record<T>(&self, employee_id: &str, f: impl FnOnce(&EmployeeRecord) -> T) -> Option<T> {
        self.records.read().get(employee_id).map(f)
    }
}

impl EmployeeDirectory for InMemoryDirectory {
    fn employee(&self, employee_id: &str) -> EngineResult<EmployeeSnapshot> {
        self.with_record(employee_id, |r| r.employee.clone())
            .ok_or_else(|| EngineError::NotFound {
                entity: "employee".to_string(),
                id: employee_id.to_string(),
            })
    }

    fn active_contract(&self, employee_id: &str, period: PaymentPeriod) -> Option<Contract> {
        self.with_record(employee_id, |r| {
            r.contracts.iter().find(|c| c.covers(&period)).cloned()
        })
        .flatten()
    }

    fn present_days(&self, employee_id: &str, period: PaymentPeriod) -> u32 {
        self.with_record(employee_id, |r| r.attendance.get(&period).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn one_off_payments(&self, employee_id: &str, period: PaymentPeriod) -> Vec<OneOffPayment> {
        self.with_record(employee_id, |r| {
            r.one_off_payments.get(&period).cloned().unwrap_or_default()
        })
        .unwrap_or_default()
    }

    fn outstanding_advances(&self, employee_id: &str) -> Vec<SalaryAdvance> {
        self.with_record(employee_id, |r| {
            r.advances
                .iter()
                .filter(|a| a.balance > rust_decimal::Decimal::ZERO)
                .cloned()
                .collect()
        })
        .unwrap_or_default()
    }

    fn employee_ids(&self) -> Vec<String> {
        self.records.read().keys().cloned().collect()
    }
}
