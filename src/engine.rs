//! Startup wiring.
//!
//! [`Engine::bootstrap`] loads the formula seeds, installs them in a fresh
//! catalog and builds the payroll services around it. Seeding happens exactly
//! once here, never lazily during a payroll run.

use std::sync::Arc;

use tracing::info;

use crate::catalog::{FormulaCatalog, SeedReport};
use crate::config::{EngineSettings, FormulaLoader};
use crate::error::EngineResult;
use crate::payroll::{
    BatchRunner, Clock, EmployeeDirectory, PayrollGenerator, PayslipReview, PayslipStore,
    SystemClock,
};

/// The assembled payroll engine.
pub struct Engine {
    settings: EngineSettings,
    catalog: Arc<FormulaCatalog>,
    store: Arc<PayslipStore>,
    generator: Arc<PayrollGenerator>,
    seed_report: SeedReport,
}

impl Engine {
    /// Seeds the catalog and builds the engine with the system clock.
    ///
    /// Formulas come from `settings.formula_dir`, or the built-in Kenyan
    /// tables when it is not set.
    pub fn bootstrap(
        settings: EngineSettings,
        directory: Arc<dyn EmployeeDirectory>,
    ) -> EngineResult<Self> {
        Self::bootstrap_with_clock(settings, directory, Arc::new(SystemClock))
    }

    /// Seeds the catalog and builds the engine with `clock`.
    pub fn bootstrap_with_clock(
        settings: EngineSettings,
        directory: Arc<dyn EmployeeDirectory>,
        clock: Arc<dyn Clock>,
    ) -> EngineResult<Self> {
        let formulas = match &settings.formula_dir {
            Some(dir) => FormulaLoader::load_dir(dir)?,
            None => FormulaLoader::builtin()?,
        };

        let catalog = Arc::new(FormulaCatalog::new());
        let seed_report = catalog.seed(formulas)?;
        let store = Arc::new(PayslipStore::new());
        let generator = Arc::new(
            PayrollGenerator::new(Arc::clone(&catalog), directory, Arc::clone(&store), &settings)
                .with_clock(clock),
        );

        info!(
            formulas = catalog.len(),
            source = %settings
                .formula_dir
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_else(|| "builtin".to_string()),
            batch_concurrency = settings.batch_concurrency,
            "Payroll engine ready"
        );

        Ok(Self {
            settings,
            catalog,
            store,
            generator,
            seed_report,
        })
    }

    /// The settings the engine was built with.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// The formula catalog.
    pub fn catalog(&self) -> &Arc<FormulaCatalog> {
        &self.catalog
    }

    /// The payslip store.
    pub fn store(&self) -> &Arc<PayslipStore> {
        &self.store
    }

    /// The payroll generator.
    pub fn generator(&self) -> &Arc<PayrollGenerator> {
        &self.generator
    }

    /// What startup seeding inserted.
    pub fn seed_report(&self) -> &SeedReport {
        &self.seed_report
    }

    /// A batch runner sized by `batch_concurrency`.
    pub fn batch_runner(&self) -> BatchRunner {
        BatchRunner::new(Arc::clone(&self.generator), self.settings.batch_concurrency)
    }

    /// The review workflow over the engine's store.
    pub fn review(&self) -> PayslipReview {
        PayslipReview::new(Arc::clone(&self.store), Arc::clone(self.generator.clock()))
    }
}
