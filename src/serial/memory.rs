//! In-memory serial device.
//!
//! Records every control and write call and lets the caller inject bytes as if
//! the device had sent them. Used by the test suite in place of real hardware.

use super::{Connector, LinkSettings, SerialLink};
use crate::error::Result;
use std::io::{self, Read};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// One observed operation on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkCall {
    Open { path: String, baud: u32 },
    SetBaud(u32),
    Dtr(bool),
    Rts(bool),
    Write(Vec<u8>),
}

#[derive(Default)]
struct State {
    calls: Vec<LinkCall>,
    opens: usize,
    accept_limit: Option<usize>,
    write_error: Option<io::ErrorKind>,
    inbound: Option<Sender<Option<Vec<u8>>>>,
}

/// Handle to an in-memory device; clones share state.
#[derive(Clone, Default)]
pub struct MemoryDevice {
    state: Arc<Mutex<State>>,
}

impl MemoryDevice {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            device: self.clone(),
        }
    }

    pub fn calls(&self) -> Vec<LinkCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn open_count(&self) -> usize {
        self.lock().opens
    }

    /// Baud rates applied since the last [`clear_calls`](Self::clear_calls).
    pub fn baud_changes(&self) -> Vec<u32> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                LinkCall::SetBaud(b) => Some(*b),
                _ => None,
            })
            .collect()
    }

    /// All bytes the device accepted, concatenated.
    pub fn written(&self) -> Vec<u8> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                LinkCall::Write(bytes) => Some(bytes.as_slice()),
                _ => None,
            })
            .flatten()
            .copied()
            .collect()
    }

    /// Cap on bytes accepted per write attempt; `Some(0)` stalls the device.
    pub fn set_accept_limit(&self, limit: Option<usize>) {
        self.lock().accept_limit = limit;
    }

    /// Make every write attempt fail with `kind`.
    pub fn set_write_error(&self, kind: Option<io::ErrorKind>) {
        self.lock().write_error = kind;
    }

    /// Queue bytes for the read side. False if the device is not open.
    pub fn inject(&self, bytes: &[u8]) -> bool {
        if bytes.is_empty() {
            return true;
        }
        match &self.lock().inbound {
            Some(tx) => tx.send(Some(bytes.to_vec())).is_ok(),
            None => false,
        }
    }

    /// Simulate the device being unplugged: the read side reports end of stream.
    pub fn unplug(&self) {
        if let Some(tx) = &self.lock().inbound {
            let _ = tx.send(None);
        }
    }
}

/// [`Connector`] that opens a [`MemoryDevice`] regardless of path.
pub struct MemoryConnector {
    device: MemoryDevice,
}

impl Connector for MemoryConnector {
    fn connect(
        &mut self,
        path: &str,
        settings: &LinkSettings,
    ) -> Result<(Box<dyn SerialLink>, Box<dyn Read + Send>)> {
        let (tx, rx) = mpsc::channel();
        {
            let mut state = self.device.lock();
            state.opens += 1;
            state.inbound = Some(tx);
            state.calls.push(LinkCall::Open {
                path: path.to_string(),
                baud: settings.baud,
            });
        }
        let reader = MemoryReader {
            rx,
            pending: Vec::new(),
            timeout: settings.read_timeout,
        };
        Ok((Box::new(MemoryLink(self.device.clone())), Box::new(reader)))
    }
}

struct MemoryLink(MemoryDevice);

impl SerialLink for MemoryLink {
    fn set_baud_rate(&mut self, baud: u32) -> Result<()> {
        self.0.lock().calls.push(LinkCall::SetBaud(baud));
        Ok(())
    }

    fn set_dtr(&mut self, level: bool) -> Result<()> {
        self.0.lock().calls.push(LinkCall::Dtr(level));
        Ok(())
    }

    fn set_rts(&mut self, level: bool) -> Result<()> {
        self.0.lock().calls.push(LinkCall::Rts(level));
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.0.lock();
        if let Some(kind) = state.write_error {
            return Err(io::Error::new(kind, "injected write error"));
        }
        let n = state.accept_limit.map_or(buf.len(), |limit| limit.min(buf.len()));
        if n > 0 {
            state.calls.push(LinkCall::Write(buf[..n].to_vec()));
        }
        Ok(n)
    }
}

struct MemoryReader {
    rx: Receiver<Option<Vec<u8>>>,
    pending: Vec<u8>,
    timeout: Duration,
}

impl Read for MemoryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            match self.rx.recv_timeout(self.timeout) {
                Ok(Some(bytes)) => self.pending = bytes,
                Ok(None) | Err(RecvTimeoutError::Disconnected) => return Ok(0),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out"))
                }
            }
        }
        let n = self.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}
