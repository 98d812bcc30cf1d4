//! pisign - sign packages and verify them against a local trust directory

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use pisign_core::SigningConfig;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod prompt;
mod sign_cli;
mod trust_cli;

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "pisign",
    about = "Sign packages and verify their signatures against a trust directory",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Set log level (RUST_LOG takes precedence when set)
    #[clap(long, value_enum, default_value = "warn", global = true)]
    log_level: LogLevel,

    /// Emit logs as JSON lines on stderr
    #[clap(long, global = true)]
    log_json: bool,

    /// Configuration file (default: platform config dir, then built-in defaults)
    #[clap(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
enum Command {
    /// Sign files with a private key; archives get an embedded signature
    Sign {
        /// PEM private key
        key: PathBuf,

        /// Certificate matching the private key
        cert: PathBuf,

        /// Files to sign
        #[clap(required = true)]
        files: Vec<PathBuf>,

        /// Read the passphrase from this file descriptor instead of prompting
        #[clap(long)]
        passphrase_fd: Option<i32>,
    },

    /// Verify files against a directory of trusted certificates
    Verify {
        /// Directory of trusted certificates
        trust_dir: PathBuf,

        /// Files to verify
        #[clap(required = true)]
        files: Vec<PathBuf>,

        /// Print one JSON object per file instead of a sentence
        #[clap(long)]
        json: bool,
    },

    /// Print certificate fingerprints, for populating trust directories
    Fingerprint {
        /// Certificate files
        #[clap(required = true)]
        certs: Vec<PathBuf>,
    },
}

/// Initialize tracing with CLI flags
///
/// Logs always go to stderr; stdout carries only command output.
fn initialize_tracing(log_level: &LogLevel, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_filter_directive()));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Parse arguments; usage errors exit with status 1, help and version with 0
fn parse_cli() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            std::process::exit(1);
        }
        Err(e) => e.exit(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = parse_cli();

    initialize_tracing(&cli.log_level, cli.log_json);

    let config = SigningConfig::discover(cli.config.as_deref())
        .context("Failed to load configuration")?;
    debug!("Effective configuration: {:?}", config);

    match cli.command {
        Command::Sign {
            key,
            cert,
            files,
            passphrase_fd,
        } => sign_cli::sign_command(config, &key, &cert, &files, passphrase_fd).await,
        Command::Verify {
            trust_dir,
            files,
            json,
        } => trust_cli::verify_command(config, &trust_dir, files, json).await,
        Command::Fingerprint { certs } => trust_cli::fingerprint_command(&config, &certs),
    }
}
