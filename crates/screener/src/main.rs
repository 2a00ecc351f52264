//! Chan-Screener — batch structural screening over daily OHLCV files
//!
//! Usage:
//!   chan-screener screen --data-dir data/daily      — Screen every <SYMBOL>.json
//!   chan-screener analyze --file data/daily/X.json  — Print one symbol's structure
//!   chan-screener backtest --file data/daily/X.json — Walk-forward replay
//!   chan-screener presets                           — Dump preset configurations

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use engine::{
    assess, position_size, rank, walk_forward, AuctionInput, AuctionTape, BacktestConfig,
    BacktestEngine, EngineConfig, Preset, RawRow, ScoreRecord, Screener, Screening,
};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "chan-screener")]
#[command(about = "Structural pattern and multi-factor equity screener", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Screen every <SYMBOL>.json file in a directory
    Screen {
        /// Directory of per-symbol JSON row arrays (falls back to SCREENER_DATA_DIR)
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Preset: strict, relaxed, short_term (falls back to SCREENER_PRESET)
        #[arg(long)]
        preset: Option<String>,
        /// JSON file overriding preset fields
        #[arg(long)]
        config: Option<PathBuf>,
        /// JSON object mapping symbol to auction tape
        #[arg(long)]
        auction: Option<PathBuf>,
        /// Number of top results to print and export
        #[arg(long, default_value_t = 10)]
        top_n: usize,
        /// Optional JSON export path
        #[arg(long)]
        export: Option<PathBuf>,
        /// Account equity used for position sizing
        #[arg(long, default_value_t = 100_000.0)]
        equity: f64,
    },
    /// Print the structural analysis of one symbol
    Analyze {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        preset: Option<String>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Replay the screener over one symbol's history
    Backtest {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        preset: Option<String>,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Starting cash
        #[arg(long, default_value = "100000")]
        capital: Decimal,
        /// Position size as percentage of equity
        #[arg(long, default_value = "10")]
        position_pct: Decimal,
    },
    /// Print every preset configuration as JSON
    Presets,
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,engine=debug,chan_screener=debug")
    } else {
        EnvFilter::new("info,engine=info,chan_screener=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dotenvy::dotenv().ok();

    match cli.command {
        Commands::Screen {
            data_dir,
            preset,
            config,
            auction,
            top_n,
            export,
            equity,
        } => {
            let data_dir = data_dir.or_else(|| std::env::var("SCREENER_DATA_DIR").ok().map(PathBuf::from));
            let data_dir = match data_dir {
                Some(dir) => dir,
                None => bail!("no data directory: pass --data-dir or set SCREENER_DATA_DIR"),
            };
            let screener = load_screener(preset, config.as_deref())?;
            cmd_screen(screener, &data_dir, auction.as_deref(), top_n, export.as_deref(), equity).await?;
        }
        Commands::Analyze {
            file,
            preset,
            config,
        } => {
            let screener = load_screener(preset, config.as_deref())?;
            cmd_analyze(&screener, &file)?;
        }
        Commands::Backtest {
            file,
            preset,
            config,
            capital,
            position_pct,
        } => {
            let screener = load_screener(preset, config.as_deref())?;
            let backtest = BacktestConfig {
                initial_capital: capital,
                position_size_pct: position_pct,
            };
            cmd_backtest(&screener, &file, &backtest)?;
        }
        Commands::Presets => {
            cmd_presets()?;
        }
    }

    Ok(())
}

// ============================================================================
// Configuration and input loading
// ============================================================================

/// Preset from the flag, then SCREENER_PRESET, then strict. An override file
/// is merged field by field on top of the preset.
fn load_screener(preset: Option<String>, config_path: Option<&Path>) -> anyhow::Result<Screener> {
    let preset: Preset = match preset.or_else(|| std::env::var("SCREENER_PRESET").ok()) {
        Some(name) => name.parse().map_err(anyhow::Error::msg)?,
        None => Preset::Strict,
    };

    let mut config = preset.config();
    if let Some(path) = config_path {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let overlay: serde_json::Value = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config {}", path.display()))?;
        let mut base = serde_json::to_value(&config)?;
        merge_json(&mut base, overlay);
        config = serde_json::from_value::<EngineConfig>(base)
            .with_context(|| format!("applying config {}", path.display()))?;
    }

    info!(%preset, overridden = config_path.is_some(), "Engine configured");
    Ok(Screener::new(config)?)
}

fn merge_json(base: &mut serde_json::Value, overlay: serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base), serde_json::Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn load_rows(path: &Path) -> anyhow::Result<Vec<RawRow>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing rows in {}", path.display()))
}

fn symbol_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_uppercase())
        .unwrap_or_else(|| "UNKNOWN".to_string())
}

fn load_auctions(path: Option<&Path>) -> anyhow::Result<HashMap<String, AuctionInput>> {
    let Some(path) = path else {
        return Ok(HashMap::new());
    };
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let tapes: HashMap<String, AuctionTape> =
        serde_json::from_str(&raw).with_context(|| format!("parsing auctions in {}", path.display()))?;

    let mut inputs = HashMap::new();
    for (symbol, tape) in tapes {
        match assess(&tape) {
            Some(assessment) => {
                info!(
                    symbol = %symbol,
                    gap = ?assessment.gap,
                    strength = assessment.strength,
                    plan = assessment.plan.description(),
                    "Auction assessed"
                );
                inputs.insert(symbol.to_uppercase(), assessment.to_input());
            }
            None => warn!(symbol = %symbol, "Auction tape has no usable previous close"),
        }
    }
    Ok(inputs)
}

// ============================================================================
// Screen command
// ============================================================================

#[derive(Serialize)]
struct RankedPick<'a> {
    rank: usize,
    shares: u64,
    #[serde(flatten)]
    record: &'a ScoreRecord,
}

async fn cmd_screen(
    screener: Screener,
    data_dir: &Path,
    auction_path: Option<&Path>,
    top_n: usize,
    export: Option<&Path>,
    equity: f64,
) -> anyhow::Result<()> {
    println!("\n=== Chan-Screener v{} ===", APP_VERSION);

    let mut files: Vec<PathBuf> = std::fs::read_dir(data_dir)
        .with_context(|| format!("listing {}", data_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();

    let auctions = load_auctions(auction_path)?;
    println!(
        "Data: {} ({} symbols) | Auctions: {} | Top N: {}",
        data_dir.display(),
        files.len(),
        auctions.len(),
        top_n
    );
    println!();

    let screener = Arc::new(screener);
    let mut handles = Vec::with_capacity(files.len());
    for path in files {
        let symbol = symbol_of(&path);
        let auction = auctions.get(&symbol).copied();
        let screener = screener.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            let rows = load_rows(&path)?;
            let outcome = screener.screen(&symbol, &rows, auction.as_ref())?;
            anyhow::Ok(outcome)
        }));
    }

    let total = handles.len();
    let mut records: Vec<ScoreRecord> = Vec::new();
    let mut rejected = 0usize;
    let mut failed = 0usize;
    for handle in handles {
        match handle.await {
            Ok(Ok(Screening::Recommended(record))) => records.push(record),
            Ok(Ok(Screening::Rejected { .. })) => rejected += 1,
            Ok(Err(e)) => {
                warn!(error = %e, "Symbol skipped");
                failed += 1;
            }
            Err(e) => {
                warn!(error = %e, "Screening task failed");
                failed += 1;
            }
        }
    }

    rank(&mut records);
    let risk = &screener.config().risk;
    let picks: Vec<RankedPick> = records
        .iter()
        .take(top_n)
        .enumerate()
        .map(|(i, record)| RankedPick {
            rank: i + 1,
            shares: position_size(equity, record.entry_price, record.stop_loss, risk),
            record,
        })
        .collect();

    println!(
        "Screened {} symbols: {} recommended, {} rejected, {} failed",
        total,
        records.len(),
        rejected,
        failed
    );
    if picks.is_empty() {
        println!("No recommendations.");
    } else {
        println!(
            "\n{:<4} {:<10} {:>7} {:<10} {:<19} {:>9} {:>9} {:>9} {:>7}",
            "#", "Symbol", "Score", "Tier", "Signal", "Entry", "Stop", "Target", "Shares"
        );
        for pick in &picks {
            let r = pick.record;
            println!(
                "{:<4} {:<10} {:>7.3} {:<10} {:<19} {:>9.2} {:>9.2} {:>9.2} {:>7}",
                pick.rank,
                r.symbol,
                r.total_score,
                r.tier.to_string(),
                r.signal.to_string(),
                r.entry_price,
                r.stop_loss,
                r.take_profit,
                pick.shares
            );
        }
    }

    if let Some(path) = export {
        let json = build_export_json(&picks, total, top_n);
        std::fs::write(path, serde_json::to_string_pretty(&json)?)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("\nExported {} results to {}", picks.len(), path.display());
    }

    Ok(())
}

fn build_export_json(picks: &[RankedPick], screened: usize, top_n: usize) -> serde_json::Value {
    serde_json::json!({
        "generated_at": Utc::now().to_rfc3339(),
        "version": APP_VERSION,
        "screened": screened,
        "export_filters": {
            "top_n": top_n,
        },
        "results": picks,
    })
}

// ============================================================================
// Analyze command
// ============================================================================

fn cmd_analyze(screener: &Screener, file: &Path) -> anyhow::Result<()> {
    let symbol = symbol_of(file);
    let rows = load_rows(file)?;
    let series = engine::normalize(&symbol, &rows, screener.config().structure.min_candles)
        .with_context(|| format!("normalizing {}", file.display()))?;
    let analysis = screener.analyze(&series, None)?;
    let structure = &analysis.structure;

    println!("\n=== {} as of {} ===", symbol, analysis.as_of);
    println!(
        "Candles: {} ({} rows dropped) | Close: {:.2} | RSI: {:.1} | Vol ratio: {:.2}",
        series.len(),
        series.dropped_rows(),
        analysis.snapshot.close,
        analysis.snapshot.rsi,
        analysis.snapshot.volume_ratio
    );
    println!(
        "Fractals: {} | Segments: {} | Pivots: {} | Trend: {}",
        structure.fractals.len(),
        structure.segments.len(),
        structure.pivots.len(),
        structure.trend
    );

    for seg in structure.segments.iter().rev().take(5).rev() {
        println!(
            "  segment {:?} [{}..{}] {:.2} -> {:.2} ({} bars, {:.1}%)",
            seg.direction,
            seg.start_idx,
            seg.end_idx,
            seg.start_price,
            seg.end_price,
            seg.duration,
            seg.strength * 100.0
        );
    }
    for pivot in structure.recent_pivots(screener.config().structure.pivot_lookback) {
        println!(
            "  pivot [{}..{}] {:.2}-{:.2} center {:.2} bias {:?} breakout p={:.2}",
            pivot.start_idx,
            pivot.end_idx,
            pivot.low,
            pivot.high,
            pivot.center,
            pivot.direction_bias,
            pivot.breakout_probability
        );
    }

    let s = &analysis.scores;
    println!(
        "Signal: {} (confidence {:.2})",
        structure.signal.kind, structure.signal.confidence
    );
    println!(
        "Scores: technical {:.3} | volume {:.3} | momentum {:.3} | volatility {:.3} | total {:.3}",
        s.technical, s.volume, s.momentum, s.volatility, analysis.total_score
    );
    println!(
        "Levels: entry {:.2} | stop {:.2} | target {:.2} | R/R {:.1}",
        analysis.levels.entry,
        analysis.levels.stop_loss,
        analysis.levels.take_profit,
        analysis.levels.risk_reward_ratio
    );
    let c = &analysis.confirmation;
    let leader = c.leader.map_or_else(
        || "n/a".to_string(),
        |l| format!("{:+.1}% (activity {:.2})", l.return_pct, l.volume_activity),
    );
    println!(
        "Confirmations: uptrend {} | strength {} | volume factor {:.2} | pullback factor {:.2}",
        c.uptrend, leader, c.volume.volume_factor, c.volume.pullback_factor
    );
    match screener.decide(analysis.total_score) {
        Some(tier) => println!("Gate: passed ({tier})"),
        None => println!(
            "Gate: below {:.2}",
            screener.config().scoring.min_score
        ),
    }

    Ok(())
}

// ============================================================================
// Backtest command
// ============================================================================

fn cmd_backtest(screener: &Screener, file: &Path, config: &BacktestConfig) -> anyhow::Result<()> {
    let symbol = symbol_of(file);
    let rows = load_rows(file)?;
    let series = engine::normalize(&symbol, &rows, screener.config().structure.min_candles)
        .with_context(|| format!("normalizing {}", file.display()))?;

    let events = walk_forward(screener, &series)?;
    let result = BacktestEngine::run(config, &symbol, &events);

    println!("\n=== Backtest {} ({} candles) ===", symbol, series.len());
    println!(
        "Capital: {} -> {} ({}%)",
        result.initial_capital.round_dp(2),
        result.final_equity.round_dp(2),
        result.total_return_pct.round_dp(2)
    );
    println!(
        "Trades: {} | Wins: {} | Win rate: {}% | Profit factor: {}",
        result.total_trades,
        result.winning_trades,
        result.win_rate.round_dp(1),
        result.profit_factor.round_dp(2)
    );
    println!(
        "Max drawdown: {} ({}%)",
        result.max_drawdown.round_dp(2),
        result.max_drawdown_pct.round_dp(2)
    );
    for trade in &result.trades {
        println!(
            "  {} -> {}  {} -> {}  pnl {} ({}%) {:?}",
            trade.entry_time.date(),
            trade.exit_time.date(),
            trade.entry_price.round_dp(2),
            trade.exit_price.round_dp(2),
            trade.pnl.round_dp(2),
            trade.pnl_pct.round_dp(2),
            trade.exit_reason
        );
    }

    Ok(())
}

// ============================================================================
// Presets command
// ============================================================================

fn cmd_presets() -> anyhow::Result<()> {
    let presets: serde_json::Map<String, serde_json::Value> = Preset::ALL
        .iter()
        .map(|p| -> anyhow::Result<_> { Ok((p.name().to_string(), serde_json::to_value(p.config())?)) })
        .collect::<anyhow::Result<_>>()?;
    println!("{}", serde_json::to_string_pretty(&presets)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_json_overrides_nested_fields() {
        let mut base = serde_json::to_value(Preset::Relaxed.config()).unwrap();
        let overlay = serde_json::json!({ "scoring": { "min_score": 0.7 } });
        merge_json(&mut base, overlay);
        let config: EngineConfig = serde_json::from_value(base).unwrap();
        assert_eq!(config.scoring.min_score, 0.7);
        // untouched preset fields survive
        assert_eq!(config.structure.min_segment_bars, 3);
    }

    #[test]
    fn test_symbol_of_uses_file_stem() {
        assert_eq!(symbol_of(Path::new("data/sh600000.json")), "SH600000");
    }
}
