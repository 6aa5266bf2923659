use std::io::Read;
use std::process;

use clap::Parser;
use commands::Commands;
use drivers::bootstrap::build_registry;
use engine_core::registry::DriverRegistry;
use model::{event::EventTuple, route::Destination};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};

use crate::{env::EnvManager, error::CliError, event_input::EventInput, shutdown::ShutdownCoordinator};

mod commands;
mod config;
mod env;
mod error;
mod event_input;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(name = "s3db-replicator", version = "0.1.0", about = "Change-data-capture replication fan-out engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, help = "Load environment variables from this .env file before running")]
    env_file: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let exit_code = match run_cli().await {
        Ok(()) => 0,
        Err(CliError::ShutdownRequested) => {
            info!("shut down gracefully");
            130
        }
        Err(e) => {
            tracing::error!("{e}");
            1
        }
    };

    process::exit(exit_code);
}

async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();
    init_env(cli.env_file.as_deref())?;

    let cancel = CancellationToken::new();
    let shutdown = ShutdownCoordinator::new(cancel.clone());
    shutdown.register_handlers();

    match cli.command {
        Commands::Validate { config } => validate(&config),
        Commands::TestConnection { config, driver } => test_connection(&config, &driver).await,
        Commands::Status { config, driver } => status(&config, &driver).await,
        Commands::Replicate { config, driver, event } => replicate_one(&config, &driver, &event).await,
        Commands::Serve { config } => serve(&config, cancel).await,
    }
}

fn init_env(env_file: Option<&str>) -> Result<(), CliError> {
    let mut env_manager = EnvManager::new();
    if let Some(path) = env_file {
        info!("loading environment variables from {path}");
        env_manager.load_from_file(path)?;
    }
    for (key, value) in env_manager.all() {
        if std::env::var(key).is_err() {
            // SAFETY: single-threaded at this point in startup, before any
            // driver or tokio worker reads the process environment.
            unsafe { std::env::set_var(key, value) };
        }
    }
    Ok(())
}

fn load_registry(config_path: &str) -> Result<DriverRegistry, CliError> {
    let raw = config::load(config_path)?;
    let engine_config = raw.into_engine_config()?;
    Ok(build_registry(engine_config))
}

fn validate(config_path: &str) -> Result<(), CliError> {
    let registry = load_registry(config_path)?;
    let mut report = serde_json::Map::new();
    let mut any_invalid = false;

    for name in registry.available_drivers() {
        let driver = registry.build(&name)?;
        let result = driver.validate_config();
        any_invalid |= !result.valid;
        report.insert(name, serde_json::to_value(&result).map_err(CliError::JsonSerialize)?);
    }

    output::print_json(&serde_json::Value::Object(report))?;
    if any_invalid {
        process::exit(1);
    }
    Ok(())
}

async fn test_connection(config_path: &str, driver_name: &str) -> Result<(), CliError> {
    let registry = load_registry(config_path)?;
    let mut driver = registry.build(driver_name)?;
    driver.initialize(Vec::new()).await?;
    let reachable = driver.test_connection().await?;
    output::print_json(&serde_json::json!({ "driver": driver_name, "reachable": reachable }))
}

async fn status(config_path: &str, driver_name: &str) -> Result<(), CliError> {
    let registry = load_registry(config_path)?;
    let mut driver = registry.build(driver_name)?;
    driver.initialize(Vec::new()).await?;
    output::print_json(&driver.status())
}

fn read_event_document(source: &str) -> Result<String, CliError> {
    if source == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        std::fs::read_to_string(source).map_err(CliError::Io)
    }
}

async fn replicate_one(config_path: &str, driver_name: &str, event_source: &str) -> Result<(), CliError> {
    let registry = load_registry(config_path)?;
    let mut driver = registry.build(driver_name)?;
    driver.initialize(Vec::new()).await?;

    let document = read_event_document(event_source)?;
    let input: EventInput = serde_json::from_str(&document)?;
    let event: EventTuple = input.into();

    let result = driver.replicate(&event).await?;
    output::print_json(&result)
}

#[derive(serde::Deserialize)]
struct ServeLine {
    driver: String,
    event: EventInput,
}

/// Reads newline-delimited `{"driver": ..., "event": {...}}` records from
/// stdin, initializing each named driver on first use and reusing it for
/// the rest of the stream (SPEC_FULL.md §9's long-running process mode).
async fn serve(config_path: &str, cancel: CancellationToken) -> Result<(), CliError> {
    let registry = load_registry(config_path)?;
    let mut drivers = std::collections::HashMap::new();

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => return Err(CliError::ShutdownRequested),
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let parsed: ServeLine = match serde_json::from_str(&line) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("skipping malformed input line: {e}");
                continue;
            }
        };

        if !drivers.contains_key(&parsed.driver) {
            let mut driver = registry.build(&parsed.driver)?;
            driver.initialize(Vec::<Destination>::new()).await?;
            drivers.insert(parsed.driver.clone(), driver);
        }
        let driver = drivers.get(&parsed.driver).expect("just inserted");

        let event: EventTuple = parsed.event.into();
        let result = driver.replicate(&event).await?;
        output::print_json(&result)?;
    }

    for (name, mut driver) in drivers {
        if let Err(e) = driver.close().await {
            warn!("error closing driver '{name}': {e}");
        }
    }
    Ok(())
}
