//! Warden - layered password and directory authentication
//!
//! Command-line front end for the Warden policy engine.

mod commands;
mod utils;

use clap::{Parser, Subcommand, ValueEnum};
use commands::CommandContext;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use warden_core::AuthConfig;

#[derive(Parser)]
#[command(name = "warden")]
#[command(author = "Warden Team")]
#[command(version = warden_core::VERSION)]
#[command(about = "Layered password and directory authentication", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Access configuration file (.toml, .json or .js)
    #[arg(short, long, global = true, env = "WARDEN_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "WARDEN_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    format: OutputFormat,
}

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one login attempt
    Verify {
        /// Login name
        #[arg(short, long)]
        username: String,

        /// Password (read from WARDEN_PASSWORD or stdin when omitted)
        #[arg(short, long, env = "WARDEN_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Print the hex digest of a password for the password table
    Hash {
        /// Digest algorithm (md5, sha1, sha224, sha256, sha384, sha512...)
        #[arg(short, long, default_value = "sha256")]
        algorithm: String,

        /// Password (read from stdin when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Load and validate the access configuration
    Check,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();

    let ctx = CommandContext {
        config: load_config(cli.config.as_deref(), &cli.command)?,
        output_format: cli.format,
    };

    let success = match cli.command {
        Commands::Verify { username, password } => {
            let password = utils::read_password(password)?;
            commands::verify::execute(&ctx, &username, &password).await?
        }
        Commands::Hash {
            algorithm,
            password,
        } => {
            let password = utils::read_password(password)?;
            commands::hash::execute(&ctx, &algorithm, &password)?
        }
        Commands::Check => commands::check::execute(&ctx, cli.config.as_deref())?,
        Commands::Version => {
            print_version(&ctx)?;
            true
        }
    };

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Load the access configuration and apply environment overrides
///
/// A missing file leaves the engine unconfigured; `check` reports that
/// instead of treating it as an error.
fn load_config(
    path: Option<&std::path::Path>,
    command: &Commands,
) -> anyhow::Result<Option<AuthConfig>> {
    if matches!(command, Commands::Hash { .. } | Commands::Version) {
        return Ok(None);
    }

    let Some(path) = path else {
        warn!("No configuration file given (use --config or WARDEN_CONFIG)");
        return Ok(None);
    };

    let mut config = AuthConfig::from_file(path)?;
    config.apply_env_overrides();
    config.validate()?;

    debug!("Using access configuration {}", path.display());
    Ok(Some(config))
}

fn print_version(ctx: &CommandContext) -> anyhow::Result<()> {
    if ctx.is_json() {
        println!(
            "{}",
            serde_json::to_string(&serde_json::json!({
                "name": "warden",
                "version": warden_core::VERSION,
            }))?
        );
    } else {
        println!("warden {}", warden_core::VERSION);
    }
    Ok(())
}
