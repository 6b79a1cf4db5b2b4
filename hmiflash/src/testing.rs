//! Simulated display and deterministic clock for engine tests.

use crate::clock::Clock;
use crate::error::Result;
use crate::port::Port;
use crate::protocol::frame::{CONNECT, TERMINATOR, UPLOAD_REQUEST};
use crate::protocol::response::ACK;
use crate::upload::BLOCK_SIZE;
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub(crate) fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Clock that only moves when someone sleeps on it.
///
/// Clones share the same time line.
#[derive(Debug, Clone, Default)]
pub(crate) struct StepClock {
    nanos: Arc<AtomicU64>,
}

impl StepClock {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

impl Clock for StepClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn sleep(&self, duration: Duration) {
        self.nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }
}

/// Something the host did to the simulated link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    /// Host changed its baud rate.
    Baud { baud: u32, at: Duration },
    /// Host sent a complete command frame the display could decode.
    Command { text: String, at: Duration },
    /// Host wrote image data while the display was receiving.
    Data { len: usize },
}

enum Mode {
    Command,
    Receiving { expected: u64, received: u64, fill: usize },
}

/// A display controller on the far end of a serial link.
///
/// It only decodes traffic sent at the rate it is listening on, and its
/// replies are only readable while the host listens at that same rate.
pub(crate) struct SimDisplay {
    clock: StepClock,
    host_baud: u32,
    display_baud: u32,
    mode: Mode,
    command: Vec<u8>,
    outbox: VecDeque<(u32, u8)>,
    /// Answer `connect` with `comok`.
    pub answers_connect: bool,
    /// Interleave nulls into the `comok` reply.
    pub pad_with_nulls: bool,
    /// Acknowledge the upload request.
    pub acks_upload_request: bool,
    /// Number of blocks acknowledged before going silent (`None` = all).
    pub acked_blocks: Option<usize>,
    pub blocks_received: usize,
    pub events: Vec<Event>,
}

impl SimDisplay {
    pub(crate) fn new(display_baud: u32, clock: StepClock) -> Self {
        Self {
            clock,
            host_baud: 9600,
            display_baud,
            mode: Mode::Command,
            command: Vec::new(),
            outbox: VecDeque::new(),
            answers_connect: true,
            pad_with_nulls: false,
            acks_upload_request: true,
            acked_blocks: None,
            blocks_received: 0,
            events: Vec::new(),
        }
    }

    pub(crate) fn baud_changes(&self) -> Vec<u32> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Baud { baud, .. } => Some(*baud),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn commands(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Command { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn data_writes(&self) -> Vec<usize> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Data { len } => Some(*len),
                _ => None,
            })
            .collect()
    }

    fn reply(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.outbox.push_back((self.display_baud, b));
        }
    }

    fn on_command(&mut self, text: String) {
        self.events.push(Event::Command {
            text: text.clone(),
            at: self.clock.now(),
        });

        if text == CONNECT {
            if self.answers_connect {
                if self.pad_with_nulls {
                    self.reply(&[0x00, b'c', 0x00, b'o', b'm', b'o', b'k']);
                } else {
                    self.reply(b"comok 1,30601-0,NX4827T043_011R,99,61488,D264B8204F0E1828,16777216");
                }
                self.reply(&TERMINATOR);
            }
        } else if let Some(args) = text.strip_prefix(UPLOAD_REQUEST) {
            let fields: Vec<&str> = args.trim().split(',').collect();
            if let [size, baud, _] = fields.as_slice() {
                if let (Ok(size), Ok(baud)) = (size.parse::<u64>(), baud.parse::<u32>()) {
                    self.display_baud = baud;
                    self.mode = Mode::Receiving {
                        expected: size,
                        received: 0,
                        fill: 0,
                    };
                    if self.acks_upload_request {
                        self.reply(&[ACK]);
                    }
                }
            }
        }
    }

    fn on_data(&mut self, buf: &[u8]) {
        self.events.push(Event::Data { len: buf.len() });
        let mut completed = 0;
        if let Mode::Receiving {
            expected,
            received,
            fill,
        } = &mut self.mode
        {
            for _ in buf {
                *received += 1;
                *fill += 1;
                if *fill == BLOCK_SIZE || *received == *expected {
                    *fill = 0;
                    completed += 1;
                }
            }
        }
        for _ in 0..completed {
            self.blocks_received += 1;
            if self
                .acked_blocks
                .is_none_or(|n| self.blocks_received <= n)
            {
                self.reply(&[ACK]);
            }
        }
    }
}

impl Read for SimDisplay {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut n = 0;
        while n < buf.len() {
            match self.outbox.pop_front() {
                Some((baud, byte)) if baud == self.host_baud => {
                    buf[n] = byte;
                    n += 1;
                },
                // Sent at another rate: arrives as line noise, dropped
                Some(_) => {},
                None => break,
            }
        }
        Ok(n)
    }
}

impl Write for SimDisplay {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.host_baud != self.display_baud {
            return Ok(buf.len());
        }

        if matches!(self.mode, Mode::Receiving { .. }) {
            self.on_data(buf);
            return Ok(buf.len());
        }

        for &b in buf {
            self.command.push(b);
            if self.command.ends_with(&TERMINATOR) {
                let text_len = self.command.len() - TERMINATOR.len();
                let text = String::from_utf8_lossy(&self.command[..text_len]).into_owned();
                self.command.clear();
                self.on_command(text);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Port for SimDisplay {
    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        self.host_baud = baud_rate;
        self.events.push(Event::Baud {
            baud: baud_rate,
            at: self.clock.now(),
        });
        Ok(())
    }

    fn baud_rate(&self) -> u32 {
        self.host_baud
    }

    #[allow(clippy::cast_possible_truncation)]
    fn bytes_to_read(&self) -> Result<u32> {
        Ok(self
            .outbox
            .iter()
            .filter(|(baud, _)| *baud == self.host_baud)
            .count() as u32)
    }

    fn clear_input(&mut self) -> Result<()> {
        self.outbox.clear();
        Ok(())
    }

    fn name(&self) -> &str {
        "sim"
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
