//! Text command frames understood by the display bootloader.
//!
//! ## Frame Format
//!
//! ```text
//! +----------------------+------+------+------+
//! |     Command text     | 0xFF | 0xFF | 0xFF |
//! +----------------------+------+------+------+
//! |   variable (ASCII)   |  terminator (3)    |
//! +----------------------+------+------+------+
//! ```
//!
//! An empty frame (terminator only) resets the display's command parser.

use std::fmt;

/// Frame terminator appended to every command.
pub const TERMINATOR: [u8; 3] = [0xFF, 0xFF, 0xFF];

/// Handshake command used while probing baud rates.
pub const CONNECT: &str = "connect";

/// Command prefix that starts a TFT upload.
pub const UPLOAD_REQUEST: &str = "whmi-wri";

/// A command plus its terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    text: String,
}

impl CommandFrame {
    /// Create a frame carrying `text`.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Build the parser-reset frame (no text).
    pub fn empty() -> Self {
        Self::new("")
    }

    /// Build the `connect` handshake frame.
    pub fn connect() -> Self {
        Self::new(CONNECT)
    }

    /// Build the upload request that also switches the link speed.
    ///
    /// The display answers with a single `0x05` once it is listening at
    /// `baud` and ready for the first block.
    pub fn upload_request(size: u32, baud: u32) -> Self {
        Self::new(format!("{UPLOAD_REQUEST} {size},{baud},0"))
    }

    /// Command text without the terminator.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Build the bytes sent on the wire.
    pub fn build(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.text.len() + TERMINATOR.len());
        buf.extend_from_slice(self.text.as_bytes());
        buf.extend_from_slice(&TERMINATOR);
        buf
    }
}

impl fmt::Display for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_frame_is_terminator_only() {
        assert_eq!(CommandFrame::empty().build(), vec![0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_connect_frame() {
        let data = CommandFrame::connect().build();
        assert_eq!(&data[..7], b"connect");
        assert_eq!(&data[7..], &TERMINATOR);
    }

    #[test]
    fn test_upload_request_text() {
        let frame = CommandFrame::upload_request(12345, 115200);
        assert_eq!(frame.text(), "whmi-wri 12345,115200,0");

        let mut expected = b"whmi-wri 12345,115200,0".to_vec();
        expected.extend_from_slice(&[0xFF, 0xFF, 0xFF]);
        assert_eq!(frame.build(), expected);
    }

    #[test]
    fn test_display_prints_text_only() {
        assert_eq!(CommandFrame::connect().to_string(), "connect");
    }
}
