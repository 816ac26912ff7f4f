//! Configuration loading for the payroll engine.
//!
//! Statutory formulas are data: they are loaded from YAML seed files (or the
//! built-in Kenyan tables) and installed into the
//! [`FormulaCatalog`](crate::catalog::FormulaCatalog) at startup.
//!
//! # Example
//!
//! ```no_run
//! use payroll_engine::config::{EngineSettings, FormulaLoader};
//!
//! let settings = EngineSettings::load("./config/settings.yaml").unwrap();
//! let formulas = FormulaLoader::load_dir("./config/formulas").unwrap();
//! println!("{} formulas, batches of {}", formulas.len(), settings.batch_concurrency);
//! ```

mod loader;
mod types;

pub use loader::FormulaLoader;
pub(crate) use loader::load_yaml;
pub use types::{EngineSettings, FormulaSeedFile};
