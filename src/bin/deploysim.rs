//! deploysim command-line driver
//!
//! Starts a simulated deployment, streams its progress trace to stdout and
//! prints the final deployment record.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use deploysim::{
    builtin_templates, DeploymentDescriptor, InMemoryDeploymentStore, LogEntry, LogLevel, SimulationEngine,
    SimulationStatus, SimulatorConfig,
};

/// Arguments of the `run` command.
#[derive(Default)]
struct RunArgs {
    service: Option<String>,
    version: Option<String>,
    environment: Option<String>,
    deployed_by: Option<String>,
    time_scale: Option<f64>,
    seed: Option<u64>,
    config: Option<PathBuf>,
}

enum Command {
    Run(RunArgs),
    Steps,
    Templates,
}

fn print_help() {
    println!("deploysim - deployment pipeline simulator");
    println!();
    println!("USAGE:");
    println!("    deploysim run --service <NAME> --version <VERSION> --env <ENV> [OPTIONS]");
    println!("    deploysim steps");
    println!("    deploysim templates");
    println!();
    println!("RUN OPTIONS:");
    println!("    -s, --service <NAME>        Service to deploy");
    println!("    -v, --version <VERSION>     Version label");
    println!("    -e, --env <ENV>             Target environment");
    println!("    -u, --deployed-by <USER>    Requesting actor [default: simulator]");
    println!("    -t, --time-scale <FACTOR>   Multiplier for step durations [default: 1.0]");
    println!("        --seed <N>              Seed for the failure model");
    println!("    -c, --config <PATH>         Configuration file [default: ./deploysim.toml]");
    println!("    -h, --help                  Print help information");
}

fn fail(message: &str) -> ! {
    eprintln!("error: {message}");
    std::process::exit(1);
}

fn value_of(args: &[String], i: usize, flag: &str) -> String {
    args.get(i + 1)
        .cloned()
        .unwrap_or_else(|| fail(&format!("{flag} requires a value")))
}

fn parse_args() -> Command {
    let args: Vec<String> = std::env::args().collect();

    let Some(command) = args.get(1) else {
        print_help();
        std::process::exit(1);
    };

    match command.as_str() {
        "steps" => return Command::Steps,
        "templates" => return Command::Templates,
        "--help" | "-h" | "help" => {
            print_help();
            std::process::exit(0);
        }
        "run" => {}
        other => fail(&format!("unknown command: {other}")),
    }

    let mut run = RunArgs::default();
    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--service" | "-s" => run.service = Some(value_of(&args, i, "--service")),
            "--version" | "-v" => run.version = Some(value_of(&args, i, "--version")),
            "--env" | "-e" => run.environment = Some(value_of(&args, i, "--env")),
            "--deployed-by" | "-u" => run.deployed_by = Some(value_of(&args, i, "--deployed-by")),
            "--time-scale" | "-t" => {
                let raw = value_of(&args, i, "--time-scale");
                let scale = raw
                    .parse::<f64>()
                    .unwrap_or_else(|_| fail(&format!("invalid time scale: {raw}")));
                run.time_scale = Some(scale);
            }
            "--seed" => {
                let raw = value_of(&args, i, "--seed");
                let seed = raw
                    .parse::<u64>()
                    .unwrap_or_else(|_| fail(&format!("invalid seed: {raw}")));
                run.seed = Some(seed);
            }
            "--config" | "-c" => run.config = Some(PathBuf::from(value_of(&args, i, "--config"))),
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            arg => fail(&format!("unknown argument: {arg}")),
        }
        i += 2;
    }

    Command::Run(run)
}

fn print_entry(entry: &LogEntry) {
    let level = match entry.level {
        LogLevel::Info => "INFO ",
        LogLevel::Error => "ERROR",
    };
    println!("[{}] {level} {}", entry.timestamp.format("%H:%M:%S%.3f"), entry.message);
}

async fn run(args: RunArgs) -> Result<bool, Box<dyn std::error::Error>> {
    let loaded = match &args.config {
        Some(path) => SimulatorConfig::from_file(path),
        None => SimulatorConfig::load(),
    };
    let (mut config, load_error) = match loaded {
        Ok(config) => (config, None),
        Err(e) => (SimulatorConfig::default(), Some(e)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.cli.log_filter)),
        )
        .init();

    if let Some(e) = load_error {
        warn!(error = %e, "failed to load config, using defaults");
    }

    if let Some(scale) = args.time_scale {
        config.engine.time_scale = scale;
    }
    if args.seed.is_some() {
        config.engine.seed = args.seed;
    }

    let mut descriptor = DeploymentDescriptor::new(
        args.service.unwrap_or_default(),
        args.version.unwrap_or_default(),
        args.environment.unwrap_or_default(),
    );
    descriptor.deployed_by = args.deployed_by;
    descriptor.validate()?;

    let store = Arc::new(InMemoryDeploymentStore::new());
    let engine = SimulationEngine::builder()
        .config(&config.engine)?
        .sink(store)
        .build()?;

    let ack = engine.start(descriptor)?;
    info!(
        deployment_id = %ack.id,
        total_steps = ack.total_steps,
        time_scale = config.engine.time_scale,
        "deployment simulation running; press Ctrl+C to stop"
    );

    let mut printed = 0;
    let mut last_ordinal = None;
    let mut ticker = tokio::time::interval(Duration::from_millis(config.cli.poll_interval_ms.max(1)));
    let final_status = loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = signal::ctrl_c() => {
                let stop = engine.stop(&ack.id)?;
                if stop.cancellation_requested {
                    warn!(deployment_id = %ack.id, "stop requested; waiting for the current step to end");
                }
            }
        }

        let snapshot = engine.status(&ack.id)?;
        for entry in snapshot.logs.iter().skip(printed) {
            print_entry(entry);
        }
        printed = snapshot.logs.len();

        if last_ordinal != Some(snapshot.ordinal) && !snapshot.is_terminal() {
            println!(
                "-- [{}/{}] {}% {}",
                snapshot.ordinal, snapshot.total_steps, snapshot.progress_percent, snapshot.current_step_name
            );
            last_ordinal = Some(snapshot.ordinal);
        }

        if snapshot.is_terminal() {
            break snapshot.status;
        }
    };

    // The status flips before the record store is updated.
    let record = engine.finished_record(&ack.id).await?;
    println!("{}", serde_json::to_string_pretty(&record)?);

    Ok(final_status == SimulationStatus::Completed)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    match parse_args() {
        Command::Steps => {
            let catalog = deploysim::StepCatalog::standard();
            println!("{}", serde_json::to_string_pretty(&catalog)?);
        }
        Command::Templates => {
            println!("{}", serde_json::to_string_pretty(&builtin_templates())?);
        }
        Command::Run(args) => {
            if !run(args).await? {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}
