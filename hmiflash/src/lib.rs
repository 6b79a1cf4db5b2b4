//! # hmiflash
//!
//! A library for uploading TFT images to serial HMI displays through their
//! built-in bootloader.
//!
//! This crate provides:
//!
//! - Baud rate auto-detection (`connect` / `comok` handshake)
//! - Upload request with a negotiated baud rate switch
//! - Chunked, acknowledgment-gated image transfer
//! - Serial port discovery for common USB-UART bridges
//!
//! ## Supported Platforms
//!
//! - **Native** (default): Linux, macOS, Windows via the `serialport` crate
//!
//! ## Features
//!
//! - `native` (default): Native serial port support
//! - `serde`: Serialization support for data types
//!
//! ## Example
//!
//! ```rust,no_run
//! use hmiflash::{FsStorage, TftSource, UploadConfig, Uploader};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut storage = FsStorage::new("/media/sd");
//!     let mut source = TftSource::open(&mut storage, "nx4827.tft")?;
//!
//!     #[cfg(feature = "native")]
//!     {
//!         let port = hmiflash::NativePort::open_simple("/dev/ttyUSB0", 9600)?;
//!         let mut uploader = Uploader::new(port, UploadConfig::new(115200));
//!         let report = uploader.upload(&mut source, |sent, total| {
//!             println!("Uploading: {sent}/{total}");
//!         })?;
//!         println!("Display was at {} baud", report.detected_baud);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod device;
pub mod error;
pub mod host;
pub mod port;
pub mod protocol;
pub mod source;
pub mod upload;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenience
#[cfg(feature = "native")]
pub use port::{NativePort, NativePortEnumerator};
pub use {
    clock::{Clock, SystemClock},
    device::{DetectedPort, DeviceKind, format_port_list},
    error::{Error, Result, UploadStage},
    host::{auto_detect_port, discover_display_ports, discover_ports},
    port::{Port, PortEnumerator, PortInfo, SerialConfig},
    protocol::{CommandFrame, ResponseBuffer},
    source::{FsStorage, Storage, TftSource},
    upload::{
        BAUD_CANDIDATES, BLOCK_SIZE, ChunkPlan, TransferState, UploadConfig, UploadReport,
        UploadSession, Uploader,
    },
};
