//! `bloomledger` command-line entry point.
//!
//! Batch access to the engine over JSON files: rebuild daily revenue aggregates from
//! an order export, or replay order drafts against a stock snapshot.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use bloomledger_core::OperatorId;
use bloomledger_infra::EngineConfig;

mod commands;

#[derive(Parser)]
#[command(name = "bloomledger", about = "Inventory ledger and revenue reconciliation", version)]
struct Cli {
    /// Business-day offset from UTC in minutes (overrides BLOOMLEDGER_UTC_OFFSET_MINUTES)
    #[arg(long, global = true, allow_negative_numbers = true)]
    utc_offset_minutes: Option<i32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recompute DailyStat records for a date or an inclusive date range
    Reconcile {
        /// JSON array of order records
        #[arg(long)]
        orders: PathBuf,

        /// First date (YYYY-MM-DD)
        #[arg(long)]
        from: String,

        /// Last date (YYYY-MM-DD); defaults to --from
        #[arg(long)]
        to: Option<String>,
    },
    /// Place order drafts against a stock snapshot and print receipts and final stock
    Place {
        /// JSON array of stock rows
        #[arg(long)]
        stock: PathBuf,

        /// JSON array of order drafts
        #[arg(long)]
        drafts: PathBuf,

        /// Operator recorded on every ledger entry
        #[arg(long)]
        operator: String,
    },
}

fn main() -> anyhow::Result<()> {
    bloomledger_observability::init();

    let cli = Cli::parse();
    let mut config = EngineConfig::from_env();
    if let Some(minutes) = cli.utc_offset_minutes {
        config = config.with_utc_offset_minutes(minutes);
    }

    let output = match cli.command {
        Commands::Reconcile { orders, from, to } => {
            let orders = commands::read_json(&orders)?;
            let stats = commands::reconcile(orders, &from, to.as_deref(), &config)?;
            serde_json::to_string_pretty(&stats)?
        }
        Commands::Place {
            stock,
            drafts,
            operator,
        } => {
            let operator = OperatorId::parse(&operator).context("--operator")?;
            let rows = commands::read_json(&stock)?;
            let drafts = commands::read_json(&drafts)?;
            let run = commands::place(rows, drafts, operator, config)?;
            serde_json::to_string_pretty(&run)?
        }
    };

    println!("{output}");
    Ok(())
}
