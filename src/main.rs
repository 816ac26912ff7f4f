//! # payroll CLI Entry Point
//!
//! Lists the seeded statutory formulas and runs payroll for employees from a
//! YAML roster. Responses are printed as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;

use payroll_engine::config::EngineSettings;
use payroll_engine::engine::Engine;
use payroll_engine::models::{FormulaOverrides, PaymentPeriod};
use payroll_engine::payroll::{
    BatchRequest, BatchSummary, CancellationFlag, EmployeeDirectory, InMemoryDirectory,
    PayrollCommand,
};

/// Statutory payroll engine.
#[derive(Parser, Debug)]
#[command(name = "payroll", version, about)]
struct Cli {
    /// Engine settings file; defaults apply when omitted.
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// List the formula versions in the catalog.
    Formulas,
    /// Generate the payslip for one employee.
    Generate {
        #[command(flatten)]
        run: RunArgs,
        /// The employee to pay.
        #[arg(long)]
        employee: String,
    },
    /// Generate payslips for every employee in the roster.
    Batch {
        #[command(flatten)]
        run: RunArgs,
        /// Override the configured batch concurrency.
        #[arg(long)]
        concurrency: Option<usize>,
    },
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Roster file with a top-level `employees` list.
    #[arg(long)]
    roster: PathBuf,
    /// Payment period, `YYYY-MM`.
    #[arg(long)]
    period: PaymentPeriod,
    /// queue, process or rerun.
    #[arg(long, default_value = "process")]
    command: PayrollCommand,
    /// Recover outstanding salary advances.
    #[arg(long)]
    recover_advances: bool,
    /// Pin a formula, e.g. `--pin nssf=nssf-2024-02`. Keys: income, nssf,
    /// shif (or nhif), housing_levy.
    #[arg(long = "pin", value_name = "KEY=ID")]
    pins: Vec<String>,
}

impl RunArgs {
    fn overrides(&self) -> anyhow::Result<FormulaOverrides> {
        let mut map = serde_json::Map::new();
        for pin in &self.pins {
            let Some((key, id)) = pin.split_once('=') else {
                bail!("invalid pin '{}', expected KEY=ID", pin);
            };
            map.insert(key.trim().to_string(), serde_json::Value::from(id.trim()));
        }
        serde_json::from_value(serde_json::Value::Object(map)).context("invalid formula pins")
    }
}

fn load_settings(path: Option<&PathBuf>) -> anyhow::Result<EngineSettings> {
    match path {
        Some(path) => EngineSettings::load(path)
            .with_context(|| format!("loading settings from {}", path.display())),
        None => Ok(EngineSettings::default()),
    }
}

fn bootstrap(
    settings: EngineSettings,
    roster: Option<&PathBuf>,
) -> anyhow::Result<(Engine, Arc<InMemoryDirectory>)> {
    let directory = match roster {
        Some(path) => InMemoryDirectory::load(path)
            .with_context(|| format!("loading roster from {}", path.display()))?,
        None => InMemoryDirectory::new(),
    };
    let directory = Arc::new(directory);
    let engine = Engine::bootstrap(settings, directory.clone())
        .context("seeding the formula catalog")?;
    Ok((engine, directory))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = load_settings(cli.settings.as_ref())?;

    match cli.command {
        Commands::Formulas => {
            let (engine, _) = bootstrap(settings, None)?;
            let mut formulas = engine.catalog().all();
            formulas.sort_by(|a, b| {
                (a.formula_type.to_string(), a.category.as_str(), a.effective_from).cmp(&(
                    b.formula_type.to_string(),
                    b.category.as_str(),
                    b.effective_from,
                ))
            });
            for formula in formulas {
                println!(
                    "{:<24} {:<10} {:<22} v{:<9} from {}{}",
                    formula.id,
                    formula.formula_type.to_string(),
                    formula.category.to_string(),
                    formula.version,
                    formula.effective_from,
                    if formula.is_current { "  (current)" } else { "" }
                );
            }
        }
        Commands::Generate { run, employee } => {
            let overrides = run.overrides()?;
            let (engine, _) = bootstrap(settings, Some(&run.roster))?;
            let response = engine.generator().generate_payroll(
                &employee,
                run.period,
                run.recover_advances,
                run.command,
                &overrides,
            );
            println!("{}", serde_json::to_string_pretty(&response)?);
            if !response.success {
                std::process::exit(1);
            }
        }
        Commands::Batch { run, concurrency } => {
            let overrides = run.overrides()?;
            if let Some(concurrency) = concurrency {
                settings.batch_concurrency = concurrency;
            }
            let (engine, directory) = bootstrap(settings, Some(&run.roster))?;

            let cancel = CancellationFlag::new();
            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted, cancelling remaining employees");
                    ctrl_c.cancel();
                }
            });

            let request = BatchRequest {
                employee_ids: directory.employee_ids(),
                payment_period: run.period,
                recover_advances: run.recover_advances,
                command: run.command,
                formula_overrides: overrides,
            };
            let results = engine.batch_runner().run(request, &cancel).await;
            let summary = BatchSummary::of(&results);
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "summary": summary,
                    "results": results,
                }))?
            );
            if summary.failed > 0 {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
