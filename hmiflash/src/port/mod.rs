//! Port abstraction for the serial link to the display.
//!
//! The upload engine never touches a global serial object. It owns a value
//! implementing [`Port`], injected at construction, so independent sessions
//! (and tests with simulated displays) never share a link.
//!
//! ```text
//! +------------------+
//! |  Upload Engine   |
//! | (detect, switch, |
//! |  chunked write)  |
//! +--------+---------+
//!          |
//!          v
//! +--------+---------+
//! |   Port Trait     |
//! +--------+---------+
//!          |
//!          v
//! +--------+---------+
//! | Native SerialPort|
//! |   (serialport)   |
//! +------------------+
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use hmiflash::port::Port;
//!
//! fn drain<P: Port>(port: &mut P) -> hmiflash::Result<Vec<u8>> {
//!     let mut out = Vec::new();
//!     let mut byte = [0u8; 1];
//!     while port.bytes_to_read()? > 0 {
//!         port.read_exact(&mut byte)?;
//!         out.push(byte[0]);
//!     }
//!     Ok(out)
//! }
//! ```

#[cfg(feature = "native")]
pub mod native;

use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// Serial port configuration.
///
/// The display bootloader always speaks 8 data bits, no parity, one stop
/// bit and no flow control, so only the name, rate and timeout vary.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/ttyUSB0", "COM3").
    pub port_name: String,
    /// Initial baud rate.
    pub baud_rate: u32,
    /// Read/write timeout of the underlying device.
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: 9600,
            timeout: Duration::from_millis(1000),
        }
    }
}

impl SerialConfig {
    /// Create a new configuration with port name and baud rate.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            ..Default::default()
        }
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Byte-level serial link used by the upload engine.
pub trait Port: Read + Write + Send {
    /// Reconfigure the link speed.
    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()>;

    /// Get the current baud rate.
    fn baud_rate(&self) -> u32;

    /// Number of received bytes waiting to be read.
    fn bytes_to_read(&self) -> Result<u32>;

    /// Discard any received bytes that have not been read yet.
    fn clear_input(&mut self) -> Result<()>;

    /// Get the port name/path.
    fn name(&self) -> &str;

    /// Close the port and release resources.
    ///
    /// After calling this method, the port cannot be used for further I/O.
    fn close(&mut self) -> Result<()>;

    /// Write all bytes, blocking until complete.
    fn write_all_bytes(&mut self, buf: &[u8]) -> Result<()> {
        std::io::Write::write_all(self, buf)?;
        std::io::Write::flush(self)?;
        Ok(())
    }
}

/// Serial port information as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PortInfo {
    /// Port name/path.
    pub name: String,
    /// USB vendor ID (if available).
    pub vid: Option<u16>,
    /// USB product ID (if available).
    pub pid: Option<u16>,
    /// Manufacturer string (if available).
    pub manufacturer: Option<String>,
    /// Product string (if available).
    pub product: Option<String>,
    /// Serial number (if available).
    pub serial_number: Option<String>,
}

impl PortInfo {
    /// Port known only by name, e.g. a built-in UART.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
            serial_number: None,
        }
    }
}

/// Port enumeration.
pub trait PortEnumerator {
    /// List all available serial ports.
    fn list_ports() -> Result<Vec<PortInfo>>;

    /// Find ports matching the given VID/PID.
    fn find_by_vid_pid(vid: u16, pid: u16) -> Result<Vec<PortInfo>> {
        let ports = Self::list_ports()?;
        Ok(ports
            .into_iter()
            .filter(|p| p.vid == Some(vid) && p.pid == Some(pid))
            .collect())
    }
}

#[cfg(feature = "native")]
pub use native::{NativePort, NativePortEnumerator};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_config_default() {
        let config = SerialConfig::default();
        assert!(config.port_name.is_empty());
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.timeout, Duration::from_millis(1000));
    }

    struct FixedPorts;

    impl PortEnumerator for FixedPorts {
        fn list_ports() -> Result<Vec<PortInfo>> {
            Ok(vec![
                PortInfo::named("/dev/ttyS0"),
                PortInfo {
                    vid: Some(0x1A86),
                    pid: Some(0x7523),
                    ..PortInfo::named("/dev/ttyUSB0")
                },
                PortInfo {
                    vid: Some(0x1A86),
                    pid: Some(0x55D4),
                    ..PortInfo::named("/dev/ttyUSB1")
                },
            ])
        }
    }

    #[test]
    fn test_find_by_vid_pid_filters_listing() {
        let found = FixedPorts::find_by_vid_pid(0x1A86, 0x7523).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "/dev/ttyUSB0");
        assert!(FixedPorts::find_by_vid_pid(0x0403, 0x6001).unwrap().is_empty());
    }

    #[test]
    fn test_serial_config_builder() {
        let config =
            SerialConfig::new("/dev/ttyUSB0", 115200).with_timeout(Duration::from_millis(10));

        assert_eq!(config.port_name, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.timeout, Duration::from_millis(10));
    }
}
