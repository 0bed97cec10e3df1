//! Streaming telnet decoder and IAC escaping.
//!
//! The decoder classifies every inbound byte as either payload, forwarded in
//! the longest IAC-free run available, or part of a command accumulated until
//! it is complete. State survives across `feed` calls so a command or an
//! escape pair may be split at any read boundary.

use super::rfc2217::ComPortRequest;
use super::{COM_PORT_OPTION, DO, IAC, SB, SE, WILL};
use bytes::Bytes;
use std::borrow::Cow;

/// Upper bound for an unterminated command before it is discarded.
pub const DEFAULT_MAX_COMMAND_LEN: usize = 4096;

/// A completed telnet command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `IAC DO <option>`
    Do(u8),
    /// `IAC WILL <option>`
    Will(u8),
    /// `IAC SB 44 ... IAC SE`
    ComPort(ComPortRequest),
    /// Terminated (or oversized) command that is not handled; raw bytes kept for logging.
    Skipped(Vec<u8>),
}

/// Decoder output, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Payload(Bytes),
    Command(Command),
}

/// Incremental telnet decoder for one connection.
#[derive(Debug)]
pub struct TelnetDecoder {
    pending: Vec<u8>,
    escape: bool,
    max_command_len: usize,
}

impl Default for TelnetDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_COMMAND_LEN)
    }
}

impl TelnetDecoder {
    pub fn new(max_command_len: usize) -> Self {
        Self {
            pending: Vec::new(),
            escape: false,
            max_command_len,
        }
    }

    /// Forget any partial command or escape; called for every new connection.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.escape = false;
    }

    /// True while inside a command or waiting for the byte after an IAC.
    pub fn is_mid_sequence(&self) -> bool {
        self.escape || !self.pending.is_empty()
    }

    /// Push bytes, returning payload runs and completed commands.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i];
            if self.escape {
                self.escape = false;
                if b != IAC {
                    // IAC <cmd>: start of a command
                    self.pending.push(IAC);
                }
            } else if b == IAC {
                self.escape = true;
                i += 1;
                continue;
            }

            if !self.pending.is_empty() {
                self.pending.push(b);
                if let Some(command) = self.complete_command() {
                    frames.push(Frame::Command(command));
                }
                i += 1;
                continue;
            }

            // Payload run: this byte (possibly an escaped IAC) up to the next IAC.
            let end = bytes[i + 1..]
                .iter()
                .position(|&c| c == IAC)
                .map_or(bytes.len(), |p| i + 1 + p);
            frames.push(Frame::Payload(Bytes::copy_from_slice(&bytes[i..end])));
            i = end;
        }
        frames
    }

    /// Inspect the pending buffer; on completion take it and return the command.
    fn complete_command(&mut self) -> Option<Command> {
        debug_assert_eq!(self.pending.first(), Some(&IAC));
        let len = self.pending.len();
        if len < 3 {
            return None;
        }
        let (cmd, opt) = (self.pending[1], self.pending[2]);
        let terminated = len >= 4 && self.pending[len - 2] == IAC && self.pending[len - 1] == SE;

        let command = if cmd == DO {
            Command::Do(opt)
        } else if cmd == WILL {
            Command::Will(opt)
        } else if terminated {
            let raw = std::mem::take(&mut self.pending);
            if cmd == SB && opt == COM_PORT_OPTION && len >= 5 {
                return Some(Command::ComPort(ComPortRequest::from_frame(raw)));
            }
            return Some(Command::Skipped(raw));
        } else if len > self.max_command_len {
            Command::Skipped(std::mem::take(&mut self.pending))
        } else {
            return None;
        };
        self.pending.clear();
        Some(command)
    }
}

/// Double every IAC in `bytes`. Borrows the input when there is nothing to escape.
pub fn escape(bytes: &[u8]) -> Cow<'_, [u8]> {
    let count = bytes.iter().filter(|&&b| b == IAC).count();
    if count == 0 {
        return Cow::Borrowed(bytes);
    }
    let mut escaped = Vec::with_capacity(bytes.len() + count);
    for &b in bytes {
        if b == IAC {
            escaped.push(IAC);
        }
        escaped.push(b);
    }
    Cow::Owned(escaped)
}
