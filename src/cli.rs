//! CLI definition and dispatch.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::console_sink::ConsoleSink;
use crate::adapters::csv_adapter::CsvMarketData;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::account::Account;
use crate::domain::config_validation::{
    parse_time, read_count, read_currency, read_distance, read_granularities, read_parsed,
    read_required, read_time, validate_simulation_config, validate_strategy_config,
};
use crate::domain::error::FxsimError;
use crate::domain::granularity::Granularity;
use crate::domain::sim_loop::{RunSummary, SimLoop, SimulationConfig};
use crate::domain::strategy::{LadderConfig, LadderStrategy};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;

#[derive(Parser, Debug)]
#[command(name = "fxsim", about = "Leveraged currency trading simulator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a simulation
    Run {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a simulation configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show instruments and candle coverage in a data directory
    Info {
        #[arg(short, long)]
        data: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Print epoch-anchored period boundaries
    Periods {
        #[arg(short, long)]
        granularity: Granularity,
        #[arg(short = 'n', long, default_value_t = 1)]
        size: u32,
        #[arg(long, value_parser = parse_time_arg)]
        from: DateTime<Utc>,
        #[arg(long, value_parser = parse_time_arg)]
        to: DateTime<Utc>,
    },
}

fn parse_time_arg(value: &str) -> Result<DateTime<Utc>, String> {
    parse_time(value)
        .ok_or_else(|| format!("invalid time {value}, expected YYYY-MM-DD HH:MM:SS or RFC 3339"))
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Run {
            config,
            data,
            dry_run,
        } => run_simulation(&config, &data, dry_run),
        Command::Validate { config } => run_validate(&config),
        Command::Info { data, symbol } => run_info(&data, symbol.as_deref()),
        Command::Periods {
            granularity,
            size,
            from,
            to,
        } => run_periods(granularity, size, from, to),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, FxsimError> {
    let adapter = FileConfigAdapter::from_file(path)?;
    tracing::debug!("loaded config from {}", adapter.source());
    Ok(adapter)
}

pub fn build_simulation_config(adapter: &dyn ConfigPort) -> Result<SimulationConfig, FxsimError> {
    Ok(SimulationConfig {
        balance: adapter.get_double("simulation", "balance", 0.0),
        currency: read_currency(adapter)?,
        symbols: adapter.get_list("simulation", "symbols"),
        granularities: read_granularities(adapter)?,
        time_step: read_required(adapter, "simulation", "time_step")?.parse()?,
        time_from: read_time(adapter, "simulation", "time_from")?,
        time_to: read_time(adapter, "simulation", "time_to")?,
        output_every: read_count(adapter, "output", "every")?,
    })
}

pub fn build_strategy(adapter: &dyn ConfigPort) -> Result<LadderConfig, FxsimError> {
    Ok(LadderConfig {
        instrument: read_required(adapter, "strategy", "instrument")?,
        lot: read_parsed(adapter, "strategy", "lot")?,
        count: read_count(adapter, "strategy", "count")?,
        direction: read_parsed(adapter, "strategy", "direction")?,
        take_profit: read_distance(adapter, "take_profit")?,
        stop_loss: read_distance(adapter, "stop_loss")?,
        max_running: read_count(adapter, "strategy", "max_running")?,
    })
}

/// Load data through `data_port`, run the ladder strategy over it and write
/// tick telemetry to `out`.
pub fn run_pipeline<W: Write>(
    data_port: &dyn MarketDataPort,
    simulation: &SimulationConfig,
    strategy: LadderConfig,
    out: W,
) -> Result<(RunSummary, Account), FxsimError> {
    let instruments = data_port.instrument_data(
        &simulation.symbols,
        &simulation.granularities,
        simulation.time_from,
        simulation.time_to,
    )?;

    let mut sim = SimLoop::new(Account::new(simulation.balance, simulation.currency));
    for data in instruments {
        sim.add_instrument(data)?;
    }
    sim.add_controller(Box::new(LadderStrategy::new(strategy)));

    let mut sink = ConsoleSink::new(out, simulation.output_every);
    let summary = sim.run(
        simulation.time_step,
        simulation.time_from,
        simulation.time_to,
        &mut sink,
        None,
    )?;
    sink.finish()?;
    Ok((summary, sim.into_account()))
}

fn load_validated(config_path: &Path) -> Result<FileConfigAdapter, FxsimError> {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;
    validate_simulation_config(&adapter)?;
    validate_strategy_config(&adapter)?;
    Ok(adapter)
}

fn run_simulation(config_path: &Path, data_dir: &Path, dry_run: bool) -> Result<(), FxsimError> {
    let adapter = load_validated(config_path)?;
    let simulation = build_simulation_config(&adapter)?;
    let strategy = build_strategy(&adapter)?;

    if dry_run {
        print_plan(&simulation, &strategy);
        eprintln!("\nDry run complete: configuration is valid");
        return Ok(());
    }

    let data_port = CsvMarketData::new(data_dir.to_path_buf());
    let stdout = io::stdout();
    let (summary, account) = run_pipeline(&data_port, &simulation, strategy, stdout.lock())?;

    let currency = account.currency();
    eprintln!("\n=== Simulation Results ===");
    eprintln!("Steps:            {}", summary.steps);
    eprintln!("Failed ticks:     {}", summary.failed_ticks);
    if summary.cancelled {
        eprintln!("Cancelled:        yes");
    }
    eprintln!("Balance:          {} {}", currency.format(account.balance()), currency);
    eprintln!("Equity:           {} {}", currency.format(account.equity()), currency);
    eprintln!("Running:          {}", account.count_running());
    eprintln!("Closed:           {}", account.count_closed());
    Ok(())
}

fn print_plan(simulation: &SimulationConfig, strategy: &LadderConfig) {
    eprintln!("\nSimulation:");
    eprintln!(
        "  balance:        {} {}",
        simulation.currency.format(simulation.balance),
        simulation.currency
    );
    eprintln!("  symbols:        {}", simulation.symbols.join(", "));
    let granularities: Vec<String> = simulation
        .granularities
        .iter()
        .map(|g| g.to_string())
        .collect();
    eprintln!("  granularities:  {}", granularities.join(", "));
    eprintln!("  step:           {}", simulation.time_step);
    eprintln!("  window:         {} .. {}", simulation.time_from, simulation.time_to);

    eprintln!("\nStrategy:");
    eprintln!(
        "  {} {} x{} {} (max {} running)",
        strategy.direction, strategy.lot, strategy.count, strategy.instrument, strategy.max_running
    );
    let distance = |d: Option<f64>| d.map_or_else(|| "none".to_string(), |d| d.to_string());
    eprintln!("  take profit:    {}", distance(strategy.take_profit));
    eprintln!("  stop loss:      {}", distance(strategy.stop_loss));
}

fn run_validate(config_path: &Path) -> Result<(), FxsimError> {
    let adapter = load_validated(config_path)?;
    let simulation = build_simulation_config(&adapter)?;
    let strategy = build_strategy(&adapter)?;
    print_plan(&simulation, &strategy);
    eprintln!("\nConfiguration is valid");
    Ok(())
}

fn run_info(data_dir: &Path, symbol: Option<&str>) -> Result<(), FxsimError> {
    let data_port = CsvMarketData::new(data_dir.to_path_buf());
    let symbols = match symbol {
        Some(s) => vec![data_port.instrument_meta(s)?.name],
        None => data_port.list_symbols()?,
    };

    if symbols.is_empty() {
        eprintln!("No instruments found in {}", data_dir.display());
        return Ok(());
    }

    let mut out = io::stdout().lock();
    for name in &symbols {
        let meta = data_port.instrument_meta(name)?;
        writeln!(
            out,
            "{} ({}) margin rate {} pip {}",
            meta.name, meta.display_name, meta.margin_rate, meta.pip_size
        )?;
        for granularity in data_port.available_granularities(name) {
            let timeframe = data_port.read_timeframe(name, granularity, None, None)?;
            match (timeframe.start(), timeframe.end()) {
                (Some(start), Some(end)) => writeln!(
                    out,
                    "  {:<4} {:>8} rows  {} .. {}",
                    granularity,
                    timeframe.len(),
                    start,
                    end
                )?,
                _ => writeln!(out, "  {:<4} (empty)", granularity)?,
            }
        }
    }
    eprintln!("{} instruments found", symbols.len());
    Ok(())
}

fn run_periods(
    granularity: Granularity,
    size: u32,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<(), FxsimError> {
    let mut out = io::stdout().lock();
    let mut count = 0usize;
    for (start, end) in granularity.range_periods(size, from, to)? {
        writeln!(
            out,
            "{}  {}",
            start.format("%Y-%m-%d %H:%M:%S"),
            end.format("%Y-%m-%d %H:%M:%S")
        )?;
        count += 1;
    }
    eprintln!("{count} periods of {size} x {granularity}");
    Ok(())
}
