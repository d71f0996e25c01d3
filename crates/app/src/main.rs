use std::{error::Error, path::PathBuf};

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use ledger::{Ledger, StateSnapshot};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};

mod settings;

#[derive(Parser, Debug)]
#[command(name = "gruzzolo")]
#[command(about = "Personal finance ledger with scheduled transactions")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Migrate, then materialize due schedules on an interval until Ctrl-C.
    Run,
    /// Run one catch-up pass and exit.
    CatchUp,
    /// Write the whole ledger to a JSON snapshot.
    Export(ExportArgs),
    /// Replace the whole ledger with a JSON snapshot.
    Import(ImportArgs),
    /// Verify stored wallet balances against the ledger.
    Check(CheckArgs),
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// Output file.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct ImportArgs {
    /// Snapshot file produced by `export`.
    #[arg(long)]
    file: PathBuf,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Rewrite stored balances from the ledger.
    #[arg(long)]
    repair: bool,
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

async fn run_pass(ledger: &Ledger) {
    match ledger.run_due_schedules(Utc::now()).await {
        Ok(Some(summary)) => {
            if summary.created > 0 || summary.failed > 0 {
                tracing::info!(
                    schedules = summary.schedules,
                    created = summary.created,
                    completed = summary.completed,
                    failed = summary.failed,
                    "catch-up pass finished"
                );
            }
        }
        Ok(None) => tracing::debug!("catch-up pass already running"),
        Err(err) => tracing::error!(%err, "catch-up pass failed"),
    }
}

async fn run_scheduler(
    ledger: &Ledger,
    interval_minutes: u64,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let period = std::time::Duration::from_secs(interval_minutes.max(1) * 60);
    let mut ticker = tokio::time::interval(period);

    tracing::info!(interval_minutes, "scheduler started");
    loop {
        tokio::select! {
            // The first tick completes immediately, so due schedules
            // catch up at startup.
            _ = ticker.tick() => run_pass(ledger).await,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "gruzzolo={level},ledger={level}",
            level = settings.app.level
        ))
        .init();

    let database_url = cli.database_url.clone().unwrap_or_else(|| {
        match &settings.database {
            Some(database) => format!("sqlite:{}?mode=rwc", database.path),
            None => "sqlite:./gruzzolo.db?mode=rwc".to_string(),
        }
    });

    let db = connect_db(&database_url).await?;
    let ledger = Ledger::builder().database(db).build().await?;

    match cli.command {
        Command::Run => {
            run_scheduler(&ledger, settings.scheduler.interval_minutes).await?;
        }
        Command::CatchUp => match ledger.run_due_schedules(Utc::now()).await? {
            Some(summary) => println!(
                "checked {} schedules: {} created, {} completed, {} failed",
                summary.schedules, summary.created, summary.completed, summary.failed
            ),
            None => println!("a catch-up pass is already running"),
        },
        Command::Export(args) => {
            let snapshot = ledger.export_state().await?;
            let json = serde_json::to_string_pretty(&snapshot)?;
            tokio::fs::write(&args.out, json).await?;
            println!(
                "exported {} transactions to {}",
                snapshot.transactions.len(),
                args.out.display()
            );
        }
        Command::Import(args) => {
            let json = tokio::fs::read_to_string(&args.file).await?;
            let snapshot: StateSnapshot = serde_json::from_str(&json)?;
            let transactions = snapshot.transactions.len();
            ledger.set_state(snapshot).await?;
            println!("imported {transactions} transactions");
        }
        Command::Check(args) => {
            let mismatches = ledger.verify_balances().await?;
            if mismatches.is_empty() {
                println!("all wallet balances match the ledger");
            } else {
                for mismatch in &mismatches {
                    eprintln!(
                        "wallet {}: stored {} but ledger sums to {}",
                        mismatch.wallet_id, mismatch.stored_minor, mismatch.computed_minor
                    );
                }
                if args.repair {
                    let repaired = ledger.recompute_balances().await?;
                    println!("repaired {} wallet balances", repaired.len());
                } else {
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
