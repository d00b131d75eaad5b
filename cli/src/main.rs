use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod device;

use bioauth_core::{BioAuthConfig, LoggerBuilder};

#[derive(Parser)]
#[command(name = "bioauth")]
#[command(about = "Strong biometric login against a simulated device")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Report whether strong biometric authentication is usable
    Check(commands::check::CheckArgs),

    /// Press the authenticate button once
    Authenticate(commands::authenticate::AuthenticateArgs),

    /// Show the effective configuration
    Config(commands::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = BioAuthConfig::load(cli.config.as_deref())?;

    // Initialize logging
    init_logging(&config, cli.verbose)?;

    // Execute command
    match cli.command {
        Commands::Check(args) => commands::check::execute(args, &config).await,
        Commands::Authenticate(args) => commands::authenticate::execute(args, &config).await,
        Commands::Config(args) => commands::config::execute(args, &config).await,
    }
}

/// Initialize logging from config; `--verbose` forces debug level
fn init_logging(config: &BioAuthConfig, verbose: bool) -> Result<()> {
    let builder = if verbose {
        LoggerBuilder::new(tracing::Level::DEBUG)
            .include_timestamp(config.logging.include_timestamp)
            .include_target(config.logging.include_target)
    } else {
        LoggerBuilder::from_config(config)?
    };

    builder.init()?;
    Ok(())
}
