//! Error types for hmiflash.

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for hmiflash operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for hmiflash operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (serial port, file operations).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Storage could not be initialized or the image is missing or unusable.
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// No candidate baud rate produced the `comok` marker.
    #[error("Baud rate detection failed: display did not answer at any candidate rate")]
    BaudDetectionFailed,

    /// The display did not acknowledge the upload request.
    #[error("Baud rate negotiation failed: no acknowledgment at {baud} baud")]
    NegotiationFailed {
        /// Target baud rate that was requested.
        baud: u32,
    },

    /// A transfer block was never acknowledged.
    #[error("Block {block}/{blocks} not acknowledged ({remaining} bytes left)")]
    BlockAckTimeout {
        /// One-based index of the block that timed out.
        block: usize,
        /// Total number of blocks in the transfer.
        blocks: usize,
        /// Bytes still unacknowledged when the transfer stopped.
        remaining: u64,
    },

    /// Device not found.
    #[error("Device not found")]
    DeviceNotFound,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Stage of the upload pipeline an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UploadStage {
    /// Source validation.
    Source,
    /// Baud rate detection.
    Detect,
    /// Baud rate negotiation.
    Negotiate,
    /// Chunked transfer.
    Transfer,
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Detect => write!(f, "detect"),
            Self::Negotiate => write!(f, "negotiate"),
            Self::Transfer => write!(f, "transfer"),
        }
    }
}

impl Error {
    /// Pipeline stage this error is attributed to, if it is a protocol outcome.
    ///
    /// Transport and I/O errors carry no stage; they can happen anywhere.
    #[must_use]
    pub fn stage(&self) -> Option<UploadStage> {
        match self {
            Self::SourceUnavailable(_) => Some(UploadStage::Source),
            Self::BaudDetectionFailed => Some(UploadStage::Detect),
            Self::NegotiationFailed { .. } => Some(UploadStage::Negotiate),
            Self::BlockAckTimeout { .. } => Some(UploadStage::Transfer),
            _ => None,
        }
    }

    /// Whether the serial device itself could not be found.
    #[must_use]
    pub fn is_device_missing(&self) -> bool {
        match self {
            Self::DeviceNotFound => true,
            #[cfg(feature = "native")]
            Self::Serial(e) => matches!(e.kind(), serialport::ErrorKind::NoDevice),
            _ => false,
        }
    }
}
