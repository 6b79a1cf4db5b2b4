//! Interactive serial port selection.
//!
//! - Explicit `--port` or configured port wins
//! - Ports behind a known USB-UART bridge are offered first
//! - Ambiguity is resolved with a dialoguer prompt on a TTY
//! - Non-interactive mode never prompts

use {
    crate::{CliError, config::Config},
    anyhow::Result,
    console::style,
    dialoguer::{Confirm, Error as DialoguerError, Select, theme::ColorfulTheme},
    hmiflash::{DetectedPort, discover_ports},
    log::{debug, info},
    std::{cmp::Ordering, io::IsTerminal},
};

/// Options for serial port selection.
#[derive(Debug, Clone, Default)]
pub struct SerialOptions {
    /// Explicit port specified via CLI or environment.
    pub port: Option<String>,
    /// Non-interactive mode (fail if ambiguous).
    pub non_interactive: bool,
}

fn usage_err(message: &str) -> anyhow::Error {
    CliError::Usage(message.to_string()).into()
}

/// Whether a port is a built-in bridge or one listed in the config.
fn is_known_device(port: &DetectedPort, config: &Config) -> bool {
    if port.is_likely_display() {
        return true;
    }
    matches!((port.vid, port.pid), (Some(vid), Some(pid)) if config.is_configured_device(vid, pid))
}

/// Narrow the discovered ports to the ones worth offering.
///
/// Known bridges are preferred; if none are present every port is a candidate.
fn candidate_ports(ports: Vec<DetectedPort>, config: &Config) -> Vec<DetectedPort> {
    let (mut known, other): (Vec<_>, Vec<_>) = ports
        .into_iter()
        .partition(|p| is_known_device(p, config));
    if known.is_empty() {
        return other;
    }
    known.sort_by_key(|p| !p.device.is_high_priority());
    known
}

fn select_non_interactive_port(candidates: Vec<DetectedPort>) -> Result<DetectedPort> {
    match candidates.len().cmp(&1) {
        Ordering::Equal => candidates
            .into_iter()
            .next()
            .ok_or_else(|| CliError::DeviceNotFound.into()),
        Ordering::Greater => Err(usage_err(
            "multiple serial ports found; pass --port to choose one",
        )),
        Ordering::Less => Err(CliError::DeviceNotFound.into()),
    }
}

/// Select the serial port to talk to the display on.
pub fn select_serial_port(options: &SerialOptions, config: &Config) -> Result<String> {
    if let Some(port_name) = &options.port {
        return Ok(port_name.clone());
    }

    if let Some(port_name) = &config.port.connection.serial {
        debug!("Using port from config: {port_name}");
        return Ok(port_name.clone());
    }

    let candidates = candidate_ports(discover_ports(), config);

    if options.non_interactive {
        return select_non_interactive_port(candidates).map(|p| p.name);
    }

    match candidates.len().cmp(&1) {
        Ordering::Greater => {
            ensure_interactive_terminal()?;
            select_port_interactive(candidates).map(|p| p.name)
        },
        Ordering::Equal => {
            let port = select_non_interactive_port(candidates)?;
            if is_known_device(&port, config) {
                info!("Auto-selected port: {} [{}]", port.name, port.device.name());
                Ok(port.name)
            } else {
                ensure_interactive_terminal()?;
                confirm_single_port(port).map(|p| p.name)
            }
        },
        Ordering::Less => Err(CliError::DeviceNotFound.into()),
    }
}

fn ensure_interactive_terminal() -> Result<()> {
    if std::io::stdin().is_terminal() && std::io::stderr().is_terminal() {
        Ok(())
    } else {
        Err(usage_err(
            "port selection needs an interactive terminal; pass --port",
        ))
    }
}

fn map_prompt_error(err: DialoguerError) -> anyhow::Error {
    match err {
        DialoguerError::IO(io_err) => {
            if io_err.kind() == std::io::ErrorKind::Interrupted {
                CliError::Cancelled("port selection cancelled".to_string()).into()
            } else {
                usage_err("port prompt failed")
            }
        },
    }
}

fn port_label(port: &DetectedPort) -> String {
    let device_info = if port.device.is_known() {
        format!(" [{}]", style(port.device.name()).yellow())
    } else if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
        format!(" ({vid:04X}:{pid:04X})")
    } else {
        String::new()
    };

    let product = port
        .product
        .as_ref()
        .map(|p| format!(" - {}", style(p).dim()))
        .unwrap_or_default();

    format!("{}{device_info}{product}", style(&port.name).bold())
}

fn select_port_interactive(ports: Vec<DetectedPort>) -> Result<DetectedPort> {
    eprintln!(
        "{} Found {} serial ports",
        style("ℹ").blue(),
        ports.len()
    );

    let term_width = usize::from(console::Term::stderr().size().1);
    let max_item_width = term_width.saturating_sub(4);
    let labels: Vec<String> = ports
        .iter()
        .map(|p| console::truncate_str(&port_label(p), max_item_width, "\u{2026}").into_owned())
        .collect();

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select the display's serial port")
        .items(&labels)
        .default(0)
        .interact_opt()
        .map_err(map_prompt_error)?;

    match selection {
        Some(index) => ports
            .into_iter()
            .nth(index)
            .ok_or_else(|| anyhow::anyhow!("Invalid port index: {index}")),
        None => Err(CliError::Cancelled("port selection cancelled".to_string()).into()),
    }
}

fn confirm_single_port(port: DetectedPort) -> Result<DetectedPort> {
    let confirmed = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Use {}?", port_label(&port)))
        .default(true)
        .interact_opt()
        .map_err(map_prompt_error)?
        .unwrap_or(false);

    if confirmed {
        Ok(port)
    } else {
        Err(CliError::Cancelled("port selection cancelled".to_string()).into())
    }
}
