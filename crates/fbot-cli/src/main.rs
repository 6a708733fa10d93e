//! fbot-cli entry point.
//!
//! Thin by design: parses arguments, loads configuration, wires an
//! in-memory broker and a `Runner`, then feeds it a bar file one bar at a
//! time. All per-bar logic lives in `fbot-runtime`; this binary owns none of
//! it.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use uuid::Uuid;

use fbot_broker::{BrokerAdapter, InMemoryBroker};
use fbot_runtime::Runner;
use fbot_schemas::{Bar, BrokerAccountSnapshot, Micros};

#[derive(Parser)]
#[command(name = "fbot", about = "single-instrument futures core runner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the per-bar pipeline over a file of newline-delimited JSON bars.
    Run {
        /// Layered YAML config files, later files override earlier ones.
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,
        /// Path to a file of one JSON-encoded `Bar` per line.
        #[arg(long = "bars")]
        bars_file: PathBuf,
        /// Starting account equity in USD.
        #[arg(long = "equity", default_value_t = 5_000.0)]
        equity_usd: f64,
        /// Exchange timezone for session-phase derivation.
        #[arg(long = "tz", default_value = "America/New_York")]
        session_tz: String,
        /// Where to write the append-only audit log.
        #[arg(long = "audit", default_value = "fbot-audit.jsonl")]
        audit_path: PathBuf,
        /// `observe` runs the full pipeline but never submits live orders;
        /// `live` arms the permission gate's execution-armed blocker.
        #[arg(long = "mode", default_value = "observe")]
        mode: RunModeArg,
    },
}

#[derive(Copy, Clone, clap::ValueEnum)]
enum RunModeArg {
    Observe,
    Live,
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Run { config_paths, bars_file, equity_usd, session_tz, audit_path, mode } => {
            run(config_paths, bars_file, equity_usd, session_tz, audit_path, mode)
        }
    }
}

fn run(
    config_paths: Vec<String>,
    bars_file: PathBuf,
    equity_usd: f64,
    session_tz: String,
    audit_path: PathBuf,
    mode: RunModeArg,
) -> Result<()> {
    let path_refs: Vec<&std::path::Path> = config_paths.iter().map(|p| std::path::Path::new(p.as_str())).collect();
    let loaded = fbot_config::load_layered_yaml(&path_refs).context("load config")?;
    let tz: chrono_tz::Tz = session_tz.parse().map_err(|_| anyhow::anyhow!("unrecognized timezone: {session_tz}"))?;

    let account = BrokerAccountSnapshot {
        equity: Micros::from_dollars(equity_usd),
        buying_power: Micros::from_dollars(equity_usd),
        margin_used: Micros::from_dollars(0.0),
    };
    let mut broker = InMemoryBroker::new(account);
    broker.connect()?;

    let audit = fbot_audit::AuditWriter::new(&audit_path, true)?;
    let run_id = Uuid::new_v4();
    let mut runner = Runner::new(loaded.config, run_id, "MES".to_string(), broker, audit, tz, equity_usd);
    if matches!(mode, RunModeArg::Live) {
        runner.arm();
    }

    let bars = load_bars_jsonl(&bars_file)?;
    info!(
        run_id = %run_id,
        config_hash = %loaded.config_hash,
        bars = bars.len(),
        execution_mode = ?runner.execution_mode(),
        "starting run"
    );

    for bar in &bars {
        runner.on_bar(bar, bar.ts_close_utc)?;
    }

    println!("run_id={run_id}");
    println!("config_hash={}", loaded.config_hash);
    println!("bars_processed={}", bars.len());
    println!("kill_switch_on={}", runner.kill_switch_on());
    println!("trades_opened_today={}", runner.trades_opened_today());

    Ok(())
}

fn load_bars_jsonl(path: &PathBuf) -> Result<Vec<Bar>> {
    let contents = fs::read_to_string(path).with_context(|| format!("read bars file: {}", path.display()))?;
    contents
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str::<Bar>(l).context("parse bar line"))
        .collect()
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
}
