//! CLI definition and dispatch.

use chrono::{Datelike, NaiveDate};
use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

use crate::adapters::calendar_scheduler::CalendarScheduler;
use crate::adapters::csv_adapter::CsvHostAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::paper_book::PaperBook;
use crate::adapters::strategy_runner::StrategyRunner;
use crate::domain::config_validation::{
    parse_date, validate_replay_config, validate_strategy_config, validate_trend_config,
};
use crate::domain::error::FactorTraderError;
use crate::domain::factor::FactorSpec;
use crate::domain::hooks::{RebalanceReport, dedupe_universe, monthly_refresh, register_hooks};
use crate::domain::ohlcv::{BarField, BarSize};
use crate::domain::scoring::{FactorFailurePolicy, FactorOutcome};
use crate::domain::strategy::{
    DEFAULT_FACTOR_LOOKBACK, DEFAULT_LONG_WINDOW, DEFAULT_OBSERVATION,
    DEFAULT_REFRESH_TRADING_DAY, DEFAULT_SHORT_WINDOW, DEFAULT_TOP_N, EmptyCandidatePolicy,
    StrategyConfig, StrategyState, StrategyVariant, default_factors,
};
use crate::domain::trend_filter::{
    DEFAULT_DIVERGENCE_THRESHOLD, TrendFilter, TrendWindows, evaluate_signal,
};
use crate::ports::config_port::ConfigPort;
use crate::ports::market_data_port::MarketDataPort;

#[derive(Parser, Debug)]
#[command(
    name = "factortrend",
    about = "Multi-factor stock selection with a moving-average trend filter"
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay the strategy over the configured date range
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Write the weight journal as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run one scoring cycle and print the candidates
    Score {
        #[arg(short, long)]
        config: PathBuf,
        /// Scoring date (defaults to [replay] end_date)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Evaluate the trend filter for one instrument
    Signal {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        code: String,
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Evaluate exit conditions instead of entry conditions
        #[arg(long)]
        held: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Run { config, output } => run_replay(&config, output.as_deref()),
        Command::Score { config, date } => run_score(&config, date),
        Command::Signal {
            config,
            code,
            date,
            held,
        } => run_signal(&config, &code, date, held),
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, FactorTraderError> {
    FileConfigAdapter::from_file(path)
}

/// Validate the strategy sections and build a [`StrategyConfig`].
pub fn build_strategy_config(adapter: &dyn ConfigPort) -> Result<StrategyConfig, FactorTraderError> {
    validate_strategy_config(adapter)?;

    let index_id = adapter
        .get_string("strategy", "index")
        .map(|s| s.trim().to_string())
        .ok_or_else(|| FactorTraderError::ConfigMissing {
            section: "strategy".into(),
            key: "index".into(),
        })?;

    let variant = match adapter
        .get_string("strategy", "variant")
        .map(|s| s.trim().to_lowercase())
        .as_deref()
    {
        Some("trend") => StrategyVariant::TrendFiltered {
            filter: build_trend_filter(adapter)?,
            observation: adapter.get_int("trend", "observation", DEFAULT_OBSERVATION as i64)
                as usize,
        },
        _ => StrategyVariant::Simple,
    };

    let mut config = StrategyConfig::new(&index_id, variant);
    if let Some(name) = adapter.get_string("strategy", "name") {
        config.name = name;
    }
    config.factors = build_factor_specs(adapter);
    config.top_n = adapter.get_int("strategy", "top_n", DEFAULT_TOP_N as i64) as usize;
    config.factor_lookback = adapter.get_int(
        "strategy",
        "factor_lookback",
        DEFAULT_FACTOR_LOOKBACK as i64,
    ) as usize;
    config.refresh_trading_day = adapter.get_int(
        "strategy",
        "refresh_trading_day",
        DEFAULT_REFRESH_TRADING_DAY as i64,
    ) as u32;
    config.rebalance_day = adapter
        .get_string("strategy", "rebalance_day")
        .and_then(|s| s.trim().parse::<u32>().ok());
    config.factor_failure = adapter
        .get_string("strategy", "factor_failure")
        .and_then(|s| s.parse::<FactorFailurePolicy>().ok())
        .unwrap_or_default();
    config.empty_candidates = adapter
        .get_string("strategy", "empty_candidates")
        .and_then(|s| s.parse::<EmptyCandidatePolicy>().ok())
        .unwrap_or_default();
    config.initial_candidates = adapter
        .get_list("strategy", "initial_candidates")
        .unwrap_or_default();

    Ok(config)
}

/// `[factors] up/down`, or the default catalogue when neither is set.
pub fn build_factor_specs(adapter: &dyn ConfigPort) -> Vec<FactorSpec> {
    let up = adapter.get_list("factors", "up");
    let down = adapter.get_list("factors", "down");
    if up.is_none() && down.is_none() {
        return default_factors();
    }
    up.unwrap_or_default()
        .iter()
        .map(|name| FactorSpec::up(name))
        .chain(down.unwrap_or_default().iter().map(|name| FactorSpec::down(name)))
        .collect()
}

pub fn build_trend_filter(adapter: &dyn ConfigPort) -> Result<TrendFilter, FactorTraderError> {
    validate_trend_config(adapter)?;
    let windows = TrendWindows::new(
        adapter.get_int("trend", "short_window", DEFAULT_SHORT_WINDOW as i64) as usize,
        adapter.get_int("trend", "long_window", DEFAULT_LONG_WINDOW as i64) as usize,
    )?;
    let mut filter = TrendFilter::new(windows);
    filter.divergence_threshold = adapter.get_double(
        "trend",
        "divergence_threshold",
        DEFAULT_DIVERGENCE_THRESHOLD,
    );
    Ok(filter)
}

/// `[replay] data_dir`, relative paths resolved against the config file's directory.
pub fn resolve_data_dir(adapter: &dyn ConfigPort, config_path: &Path) -> Result<PathBuf, FactorTraderError> {
    let raw = adapter
        .get_string("replay", "data_dir")
        .ok_or_else(|| FactorTraderError::ConfigMissing {
            section: "replay".into(),
            key: "data_dir".into(),
        })?;
    let dir = PathBuf::from(raw.trim());
    if dir.is_absolute() {
        return Ok(dir);
    }
    Ok(config_path
        .parent()
        .map(|parent| parent.join(&dir))
        .unwrap_or(dir))
}

fn resolve_date(
    date: Option<NaiveDate>,
    adapter: &dyn ConfigPort,
) -> Result<NaiveDate, FactorTraderError> {
    match date {
        Some(d) => Ok(d),
        None => parse_date(adapter, "replay", "end_date"),
    }
}

fn run_replay(config_path: &Path, output_path: Option<&Path>) -> Result<(), FactorTraderError> {
    let adapter = load_config(config_path)?;
    let strategy = build_strategy_config(&adapter)?;
    validate_replay_config(&adapter)?;
    let start = parse_date(&adapter, "replay", "start_date")?;
    let end = parse_date(&adapter, "replay", "end_date")?;
    let host = CsvHostAdapter::new(resolve_data_dir(&adapter, config_path)?);

    let mut codes = dedupe_universe(host.get_index_members(&strategy.index_id)?);
    for code in &strategy.initial_candidates {
        if !codes.contains(code) {
            codes.push(code.clone());
        }
    }
    // month positions need the whole of start_date's month
    let month_start = start.with_day(1).unwrap_or(start);
    let calendar = host.trading_dates(&codes, month_start, end)?;
    let timeline: Vec<NaiveDate> = calendar.iter().copied().filter(|d| *d >= start).collect();
    if timeline.is_empty() {
        return Err(FactorTraderError::invalid_input(format!(
            "no trading dates between {} and {}",
            start, end
        )));
    }
    info!(strategy = %strategy.name, variant = strategy.variant.name(), dates = timeline.len(), "starting replay");

    let mut scheduler = CalendarScheduler::new();
    register_hooks(&strategy, &mut scheduler);

    let mut book = PaperBook::new();
    let mut runner = StrategyRunner::new(strategy, &host, &mut book);
    let fired = scheduler.run_from(&calendar, start, &mut runner)?;

    let name = runner.config().name.clone();
    let candidates = runner.state().candidates.clone();
    let refreshes = runner.refreshes().len();
    let reports = runner.rebalances().to_vec();
    drop(runner);

    println!("=== Replay: {} ===", name);
    println!("Period:           {} to {}", timeline[0], timeline[timeline.len() - 1]);
    println!("Trading dates:    {}", timeline.len());
    println!("Hook calls:       {}", fired);
    println!("Refreshes:        {}", refreshes);
    println!(
        "Rebalances:       {} ({} skipped)",
        reports.len(),
        reports.iter().filter(|r| r.skipped).count()
    );
    println!("Directives:       {}", book.journal().len());
    println!("Candidates:       {}", candidates.join(", "));

    if adapter.get_bool("replay", "print_directives", false) {
        println!("\n=== Directives ===");
        for report in &reports {
            for d in &report.directives {
                println!("  {} {:<14} {:.4} {}", report.date, d.code, d.weight, d.reason);
            }
        }
    }
    println!("\n=== Final Weights ===");
    for (code, weight) in book.weights() {
        println!("  {:<14} {:.4}", code, weight);
    }
    println!("  {:<14} {:.4}", "gross", book.gross_weight());

    if let Some(path) = output_path {
        write_journal(path, &reports)?;
        println!("\nJournal written to: {}", path.display());
    }
    Ok(())
}

/// Write every directive as `date,code,weight,reason`.
pub fn write_journal(path: &Path, reports: &[RebalanceReport]) -> Result<(), FactorTraderError> {
    let mut writer = csv::Writer::from_path(path).map_err(std::io::Error::from)?;
    writer
        .write_record(["date", "code", "weight", "reason"])
        .map_err(std::io::Error::from)?;
    for report in reports {
        for directive in &report.directives {
            writer
                .write_record([
                    report.date.to_string(),
                    directive.code.clone(),
                    format!("{:.6}", directive.weight),
                    directive.reason.to_string(),
                ])
                .map_err(std::io::Error::from)?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn run_score(config_path: &Path, date: Option<NaiveDate>) -> Result<(), FactorTraderError> {
    let adapter = load_config(config_path)?;
    let strategy = build_strategy_config(&adapter)?;
    let date = resolve_date(date, &adapter)?;
    let host = CsvHostAdapter::new(resolve_data_dir(&adapter, config_path)?);

    let mut state = StrategyState::new(&strategy);
    let report = monthly_refresh(&strategy, &mut state, &host, date)?;

    println!("=== Scoring {} on {} ===", strategy.index_id, date);
    println!("Universe:         {}", state.universe.len());
    for factor in &report.factors {
        let outcome = match &factor.outcome {
            FactorOutcome::Scored { ranked } => format!("{} ranked", ranked),
            FactorOutcome::Missing => "missing".to_string(),
            FactorOutcome::Failed { reason } => format!("failed ({})", reason),
        };
        println!("  {:<40} {}", factor.spec.to_string(), outcome);
    }

    println!("\n=== Candidates (top {}) ===", strategy.top_n);
    if report.candidates.is_empty() {
        println!("  (none)");
    }
    for (i, code) in report.candidates.iter().enumerate() {
        let total = report.table.total(code).unwrap_or(0.0);
        println!("  {:>3}. {:<14} {:.0}", i + 1, code, total);
    }
    Ok(())
}

fn run_signal(
    config_path: &Path,
    code: &str,
    date: Option<NaiveDate>,
    held: bool,
) -> Result<(), FactorTraderError> {
    let adapter = load_config(config_path)?;
    let filter = build_trend_filter(&adapter)?;
    let observation = adapter.get_int("trend", "observation", DEFAULT_OBSERVATION as i64) as usize;
    let date = resolve_date(date, &adapter)?;
    let host = CsvHostAdapter::new(resolve_data_dir(&adapter, config_path)?);

    let prices = host.get_price_history(code, observation, BarSize::Day, BarField::Close, date)?;
    let eval = evaluate_signal(&prices, &filter, held);

    println!(
        "=== {} on {} ({}) ===",
        code,
        date,
        if held { "held" } else { "not held" }
    );
    println!("Signal:           {}", eval.signal);
    if let Some(gap) = eval.insufficient {
        println!(
            "History:          {} bars, {} required",
            gap.bars, gap.required
        );
    }
    if let Some(ma) = eval.snapshot {
        println!("Price:            {:.4}", ma.price);
        println!(
            "SMA({}):          {:.4} (prev {:.4})",
            filter.windows.short(),
            ma.short,
            ma.prev_short
        );
        println!("SMA({}):          {:.4}", filter.windows.long(), ma.long);
        if let Some(ratio) = ma.divergence_ratio() {
            println!("Divergence:       {:.2}%", ratio * 100.0);
        }
    }
    if !eval.sell_triggers.is_empty() {
        println!("Triggers:         {:?}", eval.sell_triggers);
    }
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), FactorTraderError> {
    let adapter = load_config(config_path)?;
    let strategy = build_strategy_config(&adapter)?;
    let has_replay = adapter.get_string("replay", "data_dir").is_some()
        || adapter.get_string("replay", "start_date").is_some()
        || adapter.get_string("replay", "end_date").is_some();
    if has_replay {
        validate_replay_config(&adapter)?;
    }

    println!("Strategy:         {}", strategy.name);
    println!("Index:            {}", strategy.index_id);
    println!("Variant:          {}", strategy.variant.name());
    println!("Top N:            {}", strategy.top_n);
    println!(
        "Factors:          {}",
        strategy
            .factors
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    if let StrategyVariant::TrendFiltered {
        filter,
        observation,
    } = strategy.variant
    {
        println!(
            "Trend:            SMA({}) / SMA({}), {} bars, threshold {}",
            filter.windows.short(),
            filter.windows.long(),
            observation,
            filter.divergence_threshold
        );
    }
    println!("\nConfiguration is valid.");
    Ok(())
}
