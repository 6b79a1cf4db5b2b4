//! Accumulation and marker matching for display responses.

/// Marker returned by the display when `connect` is understood.
pub const CONNECT_OK: &[u8] = b"comok";

/// Acknowledgment byte for the upload request and for every block.
pub const ACK: u8 = 0x05;

/// Bytes received during one command/response round-trip.
///
/// Null bytes are dropped on arrival; some displays pad their replies
/// with them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseBuffer {
    data: Vec<u8>,
}

impl ResponseBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a received byte, ignoring `0x00`.
    pub fn push(&mut self, byte: u8) {
        if byte != 0 {
            self.data.push(byte);
        }
    }

    /// Append a run of received bytes, ignoring `0x00`.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.data.extend(bytes.iter().copied().filter(|&b| b != 0));
    }

    /// Whether the whole `marker` appears contiguously anywhere in the buffer.
    pub fn contains(&self, marker: &[u8]) -> bool {
        if marker.is_empty() {
            return true;
        }
        self.data.windows(marker.len()).any(|w| w == marker)
    }

    /// Whether the acknowledgment byte has been received.
    pub fn has_ack(&self) -> bool {
        self.data.contains(&ACK)
    }

    /// Whether the `comok` handshake marker has been received.
    pub fn has_connect_ok(&self) -> bool {
        self.contains(CONNECT_OK)
    }

    /// Received bytes, nulls already removed.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Lossy text view, for logging.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }

    /// Number of accumulated bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing has been accumulated.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Discard everything, ready for the next round-trip.
    pub fn clear(&mut self) {
        self.data.clear();
    }
}
