//! Transactional payslip storage.
//!
//! Payslips are keyed by `(employee_id, payment_period)`; writing a payslip
//! for an existing key replaces it. Every state transition also appends an
//! immutable [`PayslipAudit`] entry.
//!
//! Writes go through [`PayslipStore::transaction`]: the closure stages its
//! reads and writes, and they are committed together only when it returns
//! `Ok`. An error (or a panic) inside the closure leaves the store untouched.
//! Concurrent transactions on the same key resolve last-writer-wins.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::error::EngineResult;
use crate::models::{PaymentPeriod, Payslip, PayslipAudit};

type PayslipKey = (String, PaymentPeriod);

#[derive(Debug, Default)]
struct StoreState {
    payslips: HashMap<PayslipKey, Payslip>,
    audit_log: Vec<PayslipAudit>,
}

/// In-memory payslip store with all-or-nothing transactions.
#[derive(Debug, Default)]
pub struct PayslipStore {
    state: Mutex<StoreState>,
}

/// Staged reads and writes of one transaction.
#[derive(Debug)]
pub struct StoreTransaction<'a> {
    store: &'a PayslipStore,
    staged_payslips: HashMap<PayslipKey, Payslip>,
    staged_audit: Vec<PayslipAudit>,
}

impl StoreTransaction<'_> {
    /// The payslip for the key, seeing this transaction's own writes.
    pub fn get(&self, employee_id: &str, period: PaymentPeriod) -> Option<Payslip> {
        let key = (employee_id.to_string(), period);
        self.staged_payslips
            .get(&key)
            .cloned()
            .or_else(|| self.store.state.lock().payslips.get(&key).cloned())
    }

    /// The payslip with `id`, seeing this transaction's own writes.
    pub fn get_by_id(&self, id: Uuid) -> Option<Payslip> {
        self.staged_payslips
            .values()
            .find(|p| p.id == id)
            .cloned()
            .or_else(|| self.store.find(id))
    }

    /// Stages an insert-or-replace of the payslip under its key.
    pub fn upsert(&mut self, payslip: Payslip) {
        let key = (payslip.employee_id.clone(), payslip.payment_period);
        self.staged_payslips.insert(key, payslip);
    }

    /// Stages an audit entry.
    pub fn append_audit(&mut self, entry: PayslipAudit) {
        self.staged_audit.push(entry);
    }
}

impl PayslipStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `body` as one transaction.
    ///
    /// Staged writes are committed only if `body` returns `Ok`; the result of
    /// `body` is returned either way.
    pub fn transaction<T>(
        &self,
        body: impl FnOnce(&mut StoreTransaction<'_>) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let mut tx = StoreTransaction {
            store: self,
            staged_payslips: HashMap::new(),
            staged_audit: Vec::new(),
        };

        let value = body(&mut tx)?;

        let mut state = self.state.lock();
        let written = tx.staged_payslips.len();
        let audited = tx.staged_audit.len();
        state.payslips.extend(tx.staged_payslips);
        state.audit_log.extend(tx.staged_audit);
        debug!(payslips = written, audit_entries = audited, "Transaction committed");
        Ok(value)
    }

    /// The payslip for `(employee_id, period)`.
    pub fn get(&self, employee_id: &str, period: PaymentPeriod) -> Option<Payslip> {
        self.state
            .lock()
            .payslips
            .get(&(employee_id.to_string(), period))
            .cloned()
    }

    /// The payslip with `id`.
    pub fn find(&self, id: Uuid) -> Option<Payslip> {
        self.state
            .lock()
            .payslips
            .values()
            .find(|p| p.id == id)
            .cloned()
    }

    /// Every payslip for `period`, ordered by employee id.
    pub fn for_period(&self, period: PaymentPeriod) -> Vec<Payslip> {
        let mut payslips: Vec<Payslip> = self
            .state
            .lock()
            .payslips
            .values()
            .filter(|p| p.payment_period == period)
            .cloned()
            .collect();
        payslips.sort_by(|a, b| a.employee_id.cmp(&b.employee_id));
        payslips
    }

    /// Number of payslips stored.
    pub fn len(&self) -> usize {
        self.state.lock().payslips.len()
    }

    /// Returns true if no payslip is stored.
    pub fn is_empty(&self) -> bool {
        self.state.lock().payslips.is_empty()
    }

    /// Audit entries for one payslip, oldest first.
    pub fn audit_trail(&self, payslip_id: Uuid) -> Vec<PayslipAudit> {
        self.state
            .lock()
            .audit_log
            .iter()
            .filter(|entry| entry.payslip_id == payslip_id)
            .cloned()
            .collect()
    }

    /// Total number of audit entries.
    pub fn audit_len(&self) -> usize {
        self.state.lock().audit_log.len()
    }
}
