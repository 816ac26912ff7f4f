//! Statutory payroll engine.
//!
//! This crate turns an employee's gross pay into a net payslip by applying
//! versioned, date-effective, bracket-based statutory formulas: progressive
//! income tax (PAYE) with personal relief, tiered social security (NSSF),
//! health insurance (SHIF, formerly NHIF) and the housing levy, each split
//! between employee and employer.
//!
//! Formulas are data. They are loaded from YAML seed files into the
//! [`catalog::FormulaCatalog`], and the income formula in effect for a period
//! declares the phase order in which deductions are taken.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use payroll_engine::config::EngineSettings;
//! use payroll_engine::engine::Engine;
//! use payroll_engine::payroll::InMemoryDirectory;
//!
//! let engine = Engine::bootstrap(EngineSettings::default(), Arc::new(InMemoryDirectory::new())).unwrap();
//! assert_eq!(engine.catalog().len(), 10);
//! ```

#![warn(missing_docs)]

pub mod calculation;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod payroll;
