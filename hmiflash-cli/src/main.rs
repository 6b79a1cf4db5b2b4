//! hmiflash CLI - Command-line tool for uploading TFT images to serial HMI displays.
//!
//! ## Features
//!
//! - Upload `.tft` images with automatic baud detection
//! - Inspect an image's block layout without touching a port
//! - Interactive serial port selection
//! - Shell completion generation
//! - Environment variable support

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use console::style;
use env_logger::Env;
use hmiflash::UploadStage;
use log::debug;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

/// Check if emoji/animations should be used (TTY and colors enabled).
fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(std::sync::atomic::Ordering::Relaxed) && console::colors_enabled_stderr()
}

mod commands;
mod config;
mod serial;

use commands::{
    completions::cmd_completions,
    info::{cmd_info, cmd_list_ports},
    upload::{UploadTiming, cmd_upload},
};
use config::Config;
use serial::{SerialOptions, select_serial_port};

/// hmiflash - Upload TFT images to serial HMI displays.
///
/// Environment variables:
///   HMIFLASH_PORT              - Default serial port
///   HMIFLASH_BAUD              - Upload baud rate (default: 115200)
///   HMIFLASH_NON_INTERACTIVE   - Non-interactive mode (disable prompts)
#[derive(Parser)]
#[command(name = "hmiflash")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Serial port to use (auto-detected if not specified).
    #[arg(short, long, global = true, env = "HMIFLASH_PORT")]
    port: Option<String>,

    /// Baud rate to transfer the image at [default: 115200].
    #[arg(short, long, global = true, env = "HMIFLASH_BAUD")]
    baud: Option<u32>,

    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Non-interactive mode (fail instead of prompting).
    #[arg(long, global = true, env = "HMIFLASH_NON_INTERACTIVE")]
    non_interactive: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Upload a TFT image to the display.
    Upload {
        /// Path to the .tft image.
        file: PathBuf,

        /// Per-block acknowledgment timeout in milliseconds.
        #[arg(long, value_name = "MS")]
        ack_timeout_ms: Option<u64>,

        /// Delay before switching to the upload baud rate, in milliseconds.
        #[arg(long, value_name = "MS")]
        settle_ms: Option<u64>,
    },

    /// Show how an image would be uploaded.
    Info {
        /// Path to the .tft image.
        file: PathBuf,

        /// Output information as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// List available serial ports.
    ListPorts {
        /// Output port list as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type for completions.
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Failures the CLI classifies itself.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    /// Bad invocation or an ambiguity only the user can resolve.
    #[error("{0}")]
    Usage(String),
    /// Configuration could not be used.
    #[error("{0}")]
    Config(String),
    /// No serial port to talk to.
    #[error("no serial port found")]
    DeviceNotFound,
    /// User aborted a prompt.
    #[error("{0}")]
    Cancelled(String),
}

impl CliError {
    fn exit_code(&self) -> u8 {
        match self {
            Self::Usage(_) => 2,
            Self::Config(_) => 3,
            Self::DeviceNotFound => 4,
            Self::Cancelled(_) => 130,
        }
    }
}

/// Map an error to the process exit code.
///
/// 1 generic, 2 usage, 3 config, 4 device not found, 5 upload protocol
/// failure, 130 cancelled.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        return cli_err.exit_code();
    }

    for cause in err.chain() {
        if let Some(lib_err) = cause.downcast_ref::<hmiflash::Error>() {
            if lib_err.is_device_missing() {
                return 4;
            }
            if matches!(lib_err, hmiflash::Error::Config(_)) {
                return 3;
            }
            return match lib_err.stage() {
                Some(UploadStage::Detect | UploadStage::Negotiate | UploadStage::Transfer) => 5,
                Some(UploadStage::Source) | None => 1,
            };
        }
    }

    1
}

fn init_logging(cli: &Cli) {
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config_path {
        Some(path) if !path.is_file() => Err(CliError::Config(format!(
            "config file {} not found",
            path.display()
        ))
        .into()),
        Some(path) => Ok(Config::load_from_path(path)),
        None => Ok(Config::load()),
    }
}

/// Upload baud rate: flag or env, then config file, then the library default.
fn resolve_baud(cli: &Cli, config: &Config) -> u32 {
    cli.baud
        .or(config.upload.baud)
        .or(config.port.connection.baud)
        .unwrap_or(hmiflash::upload::DEFAULT_UPLOAD_BAUD)
}

/// Get serial port from CLI args, config or interactive selection.
fn get_port(cli: &Cli, config: &Config) -> Result<String> {
    let options = SerialOptions {
        port: cli.port.clone(),
        non_interactive: cli.non_interactive,
    };
    select_serial_port(&options, config)
}

fn run(cli: &Cli) -> Result<()> {
    debug!(
        "hmiflash v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    let config = load_config(cli)?;
    let baud = resolve_baud(cli, &config);

    match &cli.command {
        Commands::Upload {
            file,
            ack_timeout_ms,
            settle_ms,
        } => {
            let timing = UploadTiming::resolve(*ack_timeout_ms, *settle_ms, &config);
            cmd_upload(cli, &config, file, baud, timing)?;
        },
        Commands::Info { file, json } => {
            cmd_info(file, baud, *json)?;
        },
        Commands::ListPorts { json } => {
            cmd_list_ports(*json)?;
        },
        Commands::Completions { shell } => {
            cmd_completions(*shell);
        },
    }

    Ok(())
}

fn main() -> ExitCode {
    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, std::sync::atomic::Ordering::Relaxed);

    if env::var("NO_COLOR").is_ok() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let cli = Cli::parse();
    init_logging(&cli);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", style("Error:").red().bold());
            ExitCode::from(exit_code_for(&err))
        },
    }
}
