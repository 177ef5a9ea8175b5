//! Rota CLI - Command line interface for reviewer assignment
//!
//! Every command runs one engine operation against the SQLite store and
//! prints the result as JSON.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use rota_core::Config;
use serde_json::json;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{PrArgs, TeamArgs, UserArgs};

/// Rota: pull request reviewer assignment
#[derive(Parser, Debug)]
#[command(name = "rota")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// SQLite database file (overrides config and env)
    #[arg(long, global = true, env = "ROTA_DATABASE_PATH")]
    database: Option<PathBuf>,

    /// Seed for reviewer selection (overrides config and env)
    #[arg(long, global = true, env = "ROTA_SEED")]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Manage teams
    Team(TeamArgs),

    /// Manage users
    User(UserArgs),

    /// Manage pull requests
    Pr(PrArgs),

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report(&err),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Load configuration with overrides
    let config = Config::load_with_overrides(cli.database.clone(), cli.seed)?;

    if cli.verbose {
        tracing::info!(
            database = ?config.database.path,
            seed = ?config.assignment.seed,
            operation_timeout = ?config.assignment.operation_timeout,
            "Configuration loaded"
        );
    }

    match cli.command {
        Some(Commands::Version) => {
            println!("rota {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Team(args)) => args.execute(&config).await?,
        Some(Commands::User(args)) => args.execute(&config).await?,
        Some(Commands::Pr(args)) => args.execute(&config).await?,
        Some(Commands::Config) => show_config(&config),
        None => {
            println!("Rota - pull request reviewer assignment");
            println!();
            println!("Use --help for usage information");
        }
    }

    Ok(())
}

fn show_config(config: &Config) {
    println!("Rota Configuration");
    println!("==================");
    println!();
    println!("Database:");
    match &config.database.path {
        Some(path) => println!("  path: {}", path.display()),
        None => println!("  path: (default)"),
    }
    println!("  max_connections: {}", config.database.max_connections);
    println!();
    println!("Assignment:");
    match config.assignment.seed {
        Some(seed) => println!("  seed: {}", seed),
        None => println!("  seed: (entropy)"),
    }
    match config.assignment.operation_timeout {
        Some(timeout) => println!("  operation_timeout: {:?}", timeout),
        None => println!("  operation_timeout: (none)"),
    }
    println!();
    if let Some(path) = Config::default_config_path() {
        println!("Config file: {}", path.display());
        if path.exists() {
            println!("  (exists)");
        } else {
            println!("  (not found - using defaults)");
        }
    }
}

/// Print engine errors as `{"error": {"code", "message"}}` on stderr
fn report(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<rota_core::Error>() {
        Some(engine_err) => {
            tracing::debug!(error = ?engine_err, "Operation failed");
            let body = json!({
                "error": {
                    "code": engine_err.code(),
                    "message": engine_err.to_string(),
                }
            });
            eprintln!("{}", body);
            ExitCode::from(exit_status(engine_err))
        }
        None => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn exit_status(err: &rota_core::Error) -> u8 {
    use rota_core::ErrorKind;

    match err.kind() {
        ErrorKind::Internal => 1,
        ErrorKind::Cancelled => 130,
        _ => 2,
    }
}
