//! TFT upload engine.
//!
//! An upload runs four stages strictly in order, and the first failure
//! ends the session:
//!
//! 1. the image is opened and its size captured ([`TftSource`]),
//! 2. the display's current baud rate is found by probing
//!    [`BAUD_CANDIDATES`] with `connect`,
//! 3. `whmi-wri <size>,<baud>,0` moves the link to the upload rate,
//! 4. the image is streamed in [`BLOCK_SIZE`] blocks, each gated by a
//!    `0x05` acknowledgment.
//!
//! Nothing is retried. The bootloader has no way to resume or roll back,
//! so a failed upload leaves the display waiting for a fresh one.
//!
//! ## Example
//!
//! ```rust,no_run
//! use hmiflash::{FsStorage, NativePort, UploadConfig, UploadSession, Uploader};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let port = NativePort::open_simple("/dev/ttyUSB0", 9600)?;
//!     let mut uploader = Uploader::new(port, UploadConfig::new(921600));
//!
//!     let mut session = UploadSession::new(FsStorage::new("/media/sd"), "ui.tft");
//!     let report = session.run(&mut uploader, |sent, total| {
//!         println!("{sent}/{total}");
//!     })?;
//!
//!     println!("uploaded {} bytes at {} baud", report.bytes_sent, report.target_baud);
//!     Ok(())
//! }
//! ```

mod chunk;
mod session;

pub use chunk::{BLOCK_SIZE, ChunkPlan};
pub use session::UploadSession;

use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::port::Port;
use crate::protocol::{CommandFrame, ResponseBuffer};
use crate::source::TftSource;
use log::{debug, info, trace, warn};
use std::io::{ErrorKind, Read};
use std::time::Duration;

/// Baud rates probed during detection, in probing order.
pub const BAUD_CANDIDATES: [u32; 7] = [115200, 19200, 9600, 57600, 38400, 4800, 2400];

/// Bounded wait for the `comok` reply at each candidate rate.
pub const DEFAULT_DETECT_TIMEOUT: Duration = Duration::from_millis(100);

/// Bounded wait for the upload request and block acknowledgments.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_millis(500);

/// Pause between the upload request and the local baud switch.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(50);

/// Default upload baud rate.
pub const DEFAULT_UPLOAD_BAUD: u32 = 115200;

/// Sleep between polls of the port while waiting for a reply.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Read chunk size when draining the port.
const READ_CHUNK: usize = 64;

/// Upload tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UploadConfig {
    /// Baud rate the image is transferred at.
    pub target_baud: u32,
    /// Wait for `comok` per detection candidate.
    pub detect_timeout: Duration,
    /// Wait for each `0x05` acknowledgment.
    pub ack_timeout: Duration,
    /// Delay before switching the local link to `target_baud`.
    pub settle_delay: Duration,
}

impl UploadConfig {
    /// Create a configuration with default timing.
    pub fn new(target_baud: u32) -> Self {
        Self {
            target_baud,
            detect_timeout: DEFAULT_DETECT_TIMEOUT,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    /// Set the per-candidate detection timeout.
    #[must_use]
    pub fn with_detect_timeout(mut self, timeout: Duration) -> Self {
        self.detect_timeout = timeout;
        self
    }

    /// Set the acknowledgment timeout.
    #[must_use]
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Set the settle delay. It must exceed the display's own switch latency.
    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Reject settings the display cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.target_baud == 0 {
            return Err(Error::Config("target baud rate must be non-zero".into()));
        }
        if self.detect_timeout.is_zero() || self.ack_timeout.is_zero() {
            return Err(Error::Config("response timeouts must be non-zero".into()));
        }
        if self.settle_delay.is_zero() {
            return Err(Error::Config("settle delay must be non-zero".into()));
        }
        Ok(())
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self::new(DEFAULT_UPLOAD_BAUD)
    }
}

/// Position in the transfer state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransferState {
    /// No transfer attempted yet.
    Idle,
    /// Block `block` (one-based) was written; waiting for its ack.
    AwaitingBlockAck {
        /// One-based block index.
        block: usize,
    },
    /// Every block was acknowledged.
    Complete,
    /// A stage failed. Terminal for the session.
    Failed,
}

/// Summary of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UploadReport {
    /// Rate the display was found listening on.
    pub detected_baud: u32,
    /// Rate the image was transferred at.
    pub target_baud: u32,
    /// Image bytes acknowledged.
    pub bytes_sent: u32,
    /// Blocks acknowledged.
    pub blocks: usize,
}

/// Upload engine bound to one serial link.
///
/// Generic over the port type `P` and the time source `C`, so tests can
/// run against a simulated display without real delays.
pub struct Uploader<P: Port, C: Clock = SystemClock> {
    port: P,
    clock: C,
    config: UploadConfig,
    response: ResponseBuffer,
    detected_baud: Option<u32>,
    state: TransferState,
    remaining: u32,
}

impl<P: Port> Uploader<P, SystemClock> {
    /// Create an uploader that waits on the system clock.
    pub fn new(port: P, config: UploadConfig) -> Self {
        Self::with_clock(port, SystemClock::new(), config)
    }
}

impl<P: Port, C: Clock> Uploader<P, C> {
    /// Create an uploader with an explicit time source.
    pub fn with_clock(port: P, clock: C, config: UploadConfig) -> Self {
        Self {
            port,
            clock,
            config,
            response: ResponseBuffer::new(),
            detected_baud: None,
            state: TransferState::Idle,
            remaining: 0,
        }
    }

    /// Get a reference to the underlying port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Get a mutable reference to the underlying port.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Consume the uploader and return the underlying port.
    pub fn into_port(self) -> P {
        self.port
    }

    /// Upload tuning in effect.
    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Rate found by the last successful detection.
    pub fn detected_baud(&self) -> Option<u32> {
        self.detected_baud
    }

    /// Current transfer state.
    pub fn state(&self) -> TransferState {
        self.state
    }

    /// Bytes not yet acknowledged by the display.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Bytes accumulated by the last response read.
    pub fn last_response(&self) -> &ResponseBuffer {
        &self.response
    }

    /// Send a command frame.
    ///
    /// Unread input is discarded first so stale replies cannot satisfy the
    /// next response check.
    pub fn send_command(&mut self, frame: &CommandFrame) -> Result<()> {
        self.port.clear_input()?;

        let data = frame.build();
        trace!("Sending command {:?}: {} bytes", frame.text(), data.len());
        self.port.write_all_bytes(&data)
    }

    /// Accumulate reply bytes until `timeout` elapses.
    ///
    /// With `until_ack` set, returns as soon as a `0x05` has arrived. Null
    /// bytes are dropped. Returns the accumulated length; the bytes are
    /// available through [`Uploader::last_response`].
    pub fn receive_response(&mut self, timeout: Duration, until_ack: bool) -> Result<usize> {
        let start = self.clock.now();

        loop {
            self.pump()?;
            if until_ack && self.response.has_ack() {
                break;
            }
            if self.clock.since(start) > timeout {
                break;
            }
            self.clock.sleep(POLL_INTERVAL);
        }

        trace!("Response ({} bytes): {:?}", self.response.len(), self.response.text());
        Ok(self.response.len())
    }

    /// Read everything the port currently holds into the response buffer.
    fn pump(&mut self) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            let available = self.port.bytes_to_read()? as usize;
            if available == 0 {
                return Ok(());
            }

            let want = available.min(READ_CHUNK);
            match self.port.read(&mut chunk[..want]) {
                Ok(0) => return Ok(()),
                Ok(n) => self.response.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::TimedOut => return Ok(()),
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }

    /// Find the rate the display is currently listening on.
    ///
    /// Candidates are tried in [`BAUD_CANDIDATES`] order; the first one
    /// whose reply contains `comok` wins.
    pub fn detect_baud(&mut self) -> Result<u32> {
        info!("Detecting display baud rate on {}", self.port.name());

        for baud in BAUD_CANDIDATES {
            if self.probe(baud)? {
                info!("Display answered at {baud} baud");
                self.detected_baud = Some(baud);
                return Ok(baud);
            }
        }

        warn!("No answer at any candidate baud rate");
        Err(Error::BaudDetectionFailed)
    }

    fn probe(&mut self, baud: u32) -> Result<bool> {
        debug!("Probing {baud} baud");
        self.port.set_baud_rate(baud)?;

        self.send_command(&CommandFrame::empty())?;
        self.send_command(&CommandFrame::connect())?;

        self.response.clear();
        self.receive_response(self.config.detect_timeout, false)?;
        Ok(self.response.has_connect_ok())
    }

    /// Ask the display to accept `size` bytes at the target rate, and
    /// follow it there.
    pub fn negotiate(&mut self, size: u32) -> Result<()> {
        let baud = self.config.target_baud;
        let frame = CommandFrame::upload_request(size, baud);
        info!("Requesting upload: {frame}");

        self.send_command(&CommandFrame::empty())?;
        self.send_command(&frame)?;

        // The display has to reconfigure its UART before we do
        self.clock.sleep(self.config.settle_delay);
        self.port.set_baud_rate(baud)?;

        self.response.clear();
        self.receive_response(self.config.ack_timeout, true)?;
        if !self.response.has_ack() {
            warn!("Upload request not acknowledged at {baud} baud");
            return Err(Error::NegotiationFailed { baud });
        }

        self.response.clear();
        debug!("Link switched to {baud} baud");
        Ok(())
    }

    /// Stream the rest of `source` in acknowledged blocks.
    ///
    /// `progress` receives `(acknowledged_bytes, total_bytes)` after each
    /// block. Returns the number of blocks sent.
    pub fn transfer<R, F>(&mut self, source: &mut TftSource<R>, mut progress: F) -> Result<usize>
    where
        R: Read,
        F: FnMut(usize, usize),
    {
        self.remaining = source.remaining();
        let result = self.send_blocks(source, &mut progress);
        self.state = if result.is_ok() {
            TransferState::Complete
        } else {
            TransferState::Failed
        };
        result
    }

    #[allow(clippy::cast_possible_truncation)]
    fn send_blocks<R, F>(&mut self, source: &mut TftSource<R>, progress: &mut F) -> Result<usize>
    where
        R: Read,
        F: FnMut(usize, usize),
    {
        let plan = ChunkPlan::new(source.remaining());
        let total = plan.total() as usize;
        let mut block = vec![0u8; BLOCK_SIZE];
        let mut sent = 0usize;

        info!(
            "Transferring {} bytes in {} blocks (last block {} bytes)",
            plan.total(),
            plan.blocks(),
            plan.last_block()
        );
        self.response.clear();

        for (index, len) in plan.block_sizes().enumerate() {
            let number = index + 1;
            let data = &mut block[..len];
            source.read_block(data)?;

            self.port.write_all_bytes(data)?;
            self.state = TransferState::AwaitingBlockAck { block: number };
            trace!("Block {number}/{} written ({len} bytes)", plan.blocks());

            self.receive_response(self.config.ack_timeout, true)?;
            if !self.response.has_ack() {
                warn!("Block {number}/{} not acknowledged", plan.blocks());
                return Err(Error::BlockAckTimeout {
                    block: number,
                    blocks: plan.blocks(),
                    remaining: u64::from(self.remaining),
                });
            }
            self.response.clear();

            // Blocks are at most BLOCK_SIZE bytes
            source.consume(len as u32);
            self.remaining = source.remaining();
            sent += len;
            progress(sent, total);
        }

        Ok(plan.blocks())
    }

    /// Run detection, negotiation and transfer for an opened image.
    pub fn upload<R, F>(&mut self, source: &mut TftSource<R>, mut progress: F) -> Result<UploadReport>
    where
        R: Read,
        F: FnMut(usize, usize),
    {
        self.config.validate()?;
        self.remaining = source.remaining();
        self.state = TransferState::Idle;

        let result = self.run_stages(source, &mut progress);
        if let Err(ref e) = result {
            self.state = TransferState::Failed;
            debug!("Upload failed in {:?} stage: {e}", e.stage());
        }
        result
    }

    fn run_stages<R, F>(&mut self, source: &mut TftSource<R>, progress: &mut F) -> Result<UploadReport>
    where
        R: Read,
        F: FnMut(usize, usize),
    {
        let detected_baud = self.detect_baud()?;
        self.negotiate(source.size())?;
        let blocks = self.transfer(source, progress)?;

        info!("Upload of {} complete", source.name());
        Ok(UploadReport {
            detected_baud,
            target_baud: self.config.target_baud,
            bytes_sent: source.size(),
            blocks,
        })
    }
}
