//! Salary Ledger - audited, row-locked salary updates.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use salary_ledger::audit::{AuditError, AuditLog, LogPurge, EMPLOYEE_ENTITY};
use salary_ledger::config::{ConfigError, ConfigLoader, LedgerConfig};
use salary_ledger::ledger::{
    BatchRaise, LedgerError, Money, RecordId, RecordStore, SalaryCoordinator, StoreError,
};

#[derive(Parser)]
#[command(
    name = "salary-ledger",
    about = "Audited, row-locked salary updates",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file to use instead of the default search paths.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set one record's salary.
    Update {
        /// Record id.
        id: RecordId,
        /// New salary, e.g. 6000.00.
        #[arg(allow_hyphen_values = true)]
        amount: Money,
    },
    /// Raise every salary in a company by a percentage.
    Raise {
        /// Company whose records are raised.
        company: String,
        /// Percentage, negative for a cut.
        #[arg(allow_negative_numbers = true)]
        percent: f64,
    },
    /// Delete audit entries.
    Purge {
        /// Delete entries older than this many days.
        #[arg(long, conflicts_with = "all", required_unless_present = "all")]
        older_than_days: Option<u32>,
        /// Delete every entry.
        #[arg(long)]
        all: bool,
    },
    /// Show audit entries.
    Log {
        /// Only entries for this record, oldest first.
        #[arg(long)]
        record: Option<RecordId>,
        /// Maximum number of recent entries when no record is given.
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Print JSON lines.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Audit(#[from] AuditError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("Failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            Self::Ledger(err) if !err.is_infrastructure() => ExitCode::from(1),
            _ => ExitCode::from(2),
        }
    }
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<LedgerConfig, ConfigError> {
    let loader = path.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    loader.load()
}

async fn open_coordinator(config: &LedgerConfig) -> Result<SalaryCoordinator, CliError> {
    let records = RecordStore::open(config.records_path()).await?;
    let audit = AuditLog::open(config.audit_path()).await?;
    Ok(
        SalaryCoordinator::new(records, audit, config.bounds.clone())?
            .with_lock_timeout(config.lock_timeout()),
    )
}

async fn run(command: Commands, config: &LedgerConfig) -> Result<(), CliError> {
    match command {
        Commands::Update { id, amount } => {
            let coordinator = open_coordinator(config).await?;
            let record = coordinator.update_salary(id, amount).await?;
            println!("{} {} salary {}", record.id, record.name, record.salary);
        }
        Commands::Raise { company, percent } => {
            let batch = BatchRaise::new(open_coordinator(config).await?);
            let report = batch.apply_group_raise(&company, percent).await?;
            for record in &report.updated {
                println!("updated {} {} salary {}", record.id, record.name, record.salary);
            }
            for failure in &report.failures {
                println!("skipped {} {}", failure.record_id, failure.reason);
            }
            println!(
                "{} of {} records updated",
                report.updated.len(),
                report.attempted()
            );
        }
        Commands::Purge {
            older_than_days,
            all,
        } => {
            let purge = LogPurge::new(AuditLog::open(config.audit_path()).await?);
            let removed = match older_than_days {
                Some(days) if !all => purge.purge_older_than_days(days).await?,
                _ => purge.purge_all().await?,
            };
            println!("{removed} audit entries removed");
        }
        Commands::Log {
            record,
            limit,
            json,
        } => {
            let audit = AuditLog::open(config.audit_path()).await?;
            let entries = match record {
                Some(id) => audit.entries_for(EMPLOYEE_ENTITY, id.to_string()).await?,
                None => audit.recent(limit).await?,
            };
            for entry in entries {
                if json {
                    println!("{}", serde_json::to_string(&entry)?);
                } else {
                    println!(
                        "{} {:<8} {} {}",
                        entry.created_at.to_rfc3339(),
                        entry.event_type,
                        entry.entity_id,
                        entry.message
                    );
                }
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match load_config(cli.config) {
        Ok(config) => run(cli.command, &config).await,
        Err(err) => Err(err.into()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            err.exit_code()
        }
    }
}
