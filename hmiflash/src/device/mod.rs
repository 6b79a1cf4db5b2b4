//! Serial port discovery and USB bridge classification.
//!
//! HMI displays have no USB interface of their own; they are reached
//! through a USB-to-UART bridge. Ports behind a recognised bridge are
//! ranked first when a port has to be picked automatically.

use {
    crate::{
        error::{Error, Result},
        port::{PortEnumerator, PortInfo},
    },
    log::{debug, trace},
};

#[cfg(feature = "native")]
use log::info;

/// Known USB-to-UART bridge kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeviceKind {
    /// CH340/CH341 USB-to-Serial converter.
    Ch340,
    /// Silicon Labs CP210x USB-to-Serial converter.
    Cp210x,
    /// FTDI FT232/FT2232/FT4232 USB-to-Serial converter.
    Ftdi,
    /// Prolific PL2303 USB-to-Serial converter.
    Prolific,
    /// Unknown device.
    Unknown,
}

/// Known USB VID/PID pairs for common USB-to-UART bridges.
const KNOWN_USB_DEVICES: &[(u16, &[u16], DeviceKind)] = &[
    (
        0x1A86,
        &[0x7523, 0x7522, 0x5523, 0x5512, 0x55D4],
        DeviceKind::Ch340,
    ),
    (0x10C4, &[0xEA60, 0xEA70, 0xEA71, 0xEA63], DeviceKind::Cp210x),
    (
        0x0403,
        &[0x6001, 0x6010, 0x6011, 0x6014, 0x6015],
        DeviceKind::Ftdi,
    ),
    (0x067B, &[0x2303, 0x23A3, 0x23C3, 0x23D3], DeviceKind::Prolific),
];

impl DeviceKind {
    /// Classify a USB VID/PID pair.
    #[must_use]
    pub fn from_vid_pid(vid: u16, pid: u16) -> Self {
        for (known_vid, pids, device) in KNOWN_USB_DEVICES {
            if vid == *known_vid && pids.contains(&pid) {
                return *device;
            }
        }
        Self::Unknown
    }

    /// Get a human-readable name for the device kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ch340 => "CH340/CH341",
            Self::Cp210x => "CP210x",
            Self::Ftdi => "FTDI",
            Self::Prolific => "PL2303",
            Self::Unknown => "Unknown",
        }
    }

    /// Check if this is a known/expected device kind.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Bridges most often shipped with display starter kits.
    pub fn is_high_priority(&self) -> bool {
        matches!(self, Self::Ch340 | Self::Cp210x)
    }
}

/// Discovered serial port information.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DetectedPort {
    /// Port name/path (e.g., "/dev/ttyUSB0" or "COM3").
    pub name: String,
    /// Classified bridge kind.
    pub device: DeviceKind,
    /// USB Vendor ID (if available).
    pub vid: Option<u16>,
    /// USB Product ID (if available).
    pub pid: Option<u16>,
    /// Device manufacturer string (if available).
    pub manufacturer: Option<String>,
    /// Device product string (if available).
    pub product: Option<String>,
    /// Serial number (if available).
    pub serial: Option<String>,
}

impl DetectedPort {
    /// Create an entry for a port known only by name.
    pub fn unknown(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            device: DeviceKind::Unknown,
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
            serial: None,
        }
    }

    /// Check if this port sits behind a recognised USB-UART bridge.
    pub fn is_likely_display(&self) -> bool {
        self.device.is_known()
    }
}

impl From<PortInfo> for DetectedPort {
    fn from(info: PortInfo) -> Self {
        let device = match (info.vid, info.pid) {
            (Some(vid), Some(pid)) => DeviceKind::from_vid_pid(vid, pid),
            _ => DeviceKind::Unknown,
        };
        Self {
            name: info.name,
            device,
            vid: info.vid,
            pid: info.pid,
            manufacturer: info.manufacturer,
            product: info.product,
            serial: info.serial_number,
        }
    }
}

/// Classify every port reported by `E`.
///
/// Enumeration failures are logged and yield an empty list.
pub fn detect_ports_with<E: PortEnumerator>() -> Vec<DetectedPort> {
    match E::list_ports() {
        Ok(ports) => ports
            .into_iter()
            .map(|info| {
                let detected = DetectedPort::from(info);
                if let (Some(vid), Some(pid)) = (detected.vid, detected.pid) {
                    trace!(
                        "Found USB port: {} (VID: {vid:04X}, PID: {pid:04X}, Device: {:?})",
                        detected.name, detected.device
                    );
                }
                detected
            })
            .collect(),
        Err(e) => {
            debug!("Failed to enumerate serial ports: {e}");
            Vec::new()
        },
    }
}

/// Detect all available serial ports with metadata.
#[cfg(feature = "native")]
pub fn detect_ports() -> Vec<DetectedPort> {
    detect_ports_with::<crate::port::NativePortEnumerator>()
}

/// Detect all available serial ports (no native support compiled in).
#[cfg(not(feature = "native"))]
pub fn detect_ports() -> Vec<DetectedPort> {
    Vec::new()
}

/// Detect ports behind a recognised USB-UART bridge.
pub fn detect_display_ports() -> Vec<DetectedPort> {
    detect_ports()
        .into_iter()
        .filter(DetectedPort::is_likely_display)
        .collect()
}

/// Pick the best candidate from a list of ports.
///
/// High-priority bridges win over other known bridges, which win over
/// unclassified ports.
pub fn select_best_port(ports: Vec<DetectedPort>) -> Result<DetectedPort> {
    if let Some(port) = ports.iter().find(|p| p.device.is_high_priority()) {
        return Ok(port.clone());
    }

    if let Some(port) = ports.iter().find(|p| p.device.is_known()) {
        return Ok(port.clone());
    }

    ports.into_iter().next().ok_or(Error::DeviceNotFound)
}

/// Auto-detect a single serial port for the display.
#[cfg(feature = "native")]
pub fn auto_detect_port() -> Result<DetectedPort> {
    let port = select_best_port(detect_ports())?;
    if port.device.is_known() {
        info!(
            "Auto-detected {} USB-UART bridge: {}",
            port.device.name(),
            port.name
        );
    } else {
        info!("Using first available port: {}", port.name);
    }
    Ok(port)
}

/// Auto-detect a single serial port (no native support compiled in).
#[cfg(not(feature = "native"))]
pub fn auto_detect_port() -> Result<DetectedPort> {
    Err(Error::DeviceNotFound)
}

/// Format a list of detected ports for display.
pub fn format_port_list(ports: &[DetectedPort]) -> Vec<String> {
    ports
        .iter()
        .map(|port| {
            let device_info = if port.device.is_known() {
                format!(" [{}]", port.device.name())
            } else if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
                format!(" [VID:{vid:04X} PID:{pid:04X}]")
            } else {
                String::new()
            };

            let product_info = port
                .product
                .as_ref()
                .map(|p| format!(" - {p}"))
                .unwrap_or_default();

            format!("{}{}{}", port.name, device_info, product_info)
        })
        .collect()
}
