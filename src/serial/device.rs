//! Device endpoint: owns the serial handle and the device session state.

use super::boot::{BootMode, BootSequences, LineOp};
use super::{Connector, DeviceControl, DeviceEvent, LinkSettings, SerialLink};
use crate::config::Config;
use crate::error::{BridgeError, Result};
use crate::logutil::hex_snippet;
use crate::metrics;
use bytes::Bytes;
use log::{debug, info, trace, warn};
use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Bounded retry policy for device writes.
///
/// A USB-attached device whose consumer stops draining can block writes
/// forever. A write gives up after `max_attempts` attempts or once
/// [`budget`](Self::budget) has elapsed, whichever comes first, so time spent
/// inside the driver's own write timeout counts against the same bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WritePolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for WritePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 100,
            retry_delay: Duration::from_millis(10),
        }
    }
}

impl WritePolicy {
    /// Total time a single write may block the caller.
    pub fn budget(&self) -> Duration {
        self.retry_delay.saturating_mul(self.max_attempts)
    }
}

/// Result of a device write under [`WritePolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Complete { attempts: u32 },
    /// Budget exhausted (or the device refused the write); `dropped` bytes were discarded.
    Dropped {
        written: usize,
        dropped: usize,
        attempts: u32,
    },
}

impl WriteOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, WriteOutcome::Complete { .. })
    }
}

/// Write `bytes`, retrying short and zero writes after `policy.retry_delay`.
///
/// Blocks the calling thread for at most about `policy.budget()` plus one
/// write attempt. Timeouts and would-block count as zero-byte attempts; any
/// other error drops the remainder immediately since the read thread reports a
/// dead device anyway.
pub fn write_with_retry(
    link: &mut dyn SerialLink,
    bytes: &[u8],
    policy: &WritePolicy,
) -> WriteOutcome {
    let started = Instant::now();
    let budget = policy.budget();
    let mut offset = 0;
    let mut attempts = 0;
    while offset < bytes.len() {
        if attempts >= policy.max_attempts || (attempts > 0 && started.elapsed() >= budget) {
            return WriteOutcome::Dropped {
                written: offset,
                dropped: bytes.len() - offset,
                attempts,
            };
        }
        attempts += 1;
        match link.write(&bytes[offset..]) {
            Ok(n) => offset += n.min(bytes.len() - offset),
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) => {}
            Err(e) => {
                warn!(
                    "Serial write failed after {} of {} bytes: {}",
                    offset,
                    bytes.len(),
                    e
                );
                return WriteOutcome::Dropped {
                    written: offset,
                    dropped: bytes.len() - offset,
                    attempts,
                };
            }
        }
        if offset < bytes.len() && attempts < policy.max_attempts {
            let remaining = budget.saturating_sub(started.elapsed());
            if !remaining.is_zero() {
                std::thread::sleep(policy.retry_delay.min(remaining));
            }
        }
    }
    WriteOutcome::Complete { attempts }
}

/// The serial side of the bridge.
///
/// Opened lazily on the first client connection and kept open across client
/// sessions; only a fatal device error or process exit closes it.
pub struct DeviceEndpoint {
    path: String,
    connector: Box<dyn Connector>,
    settings: LinkSettings,
    policy: WritePolicy,
    sequences: BootSequences,
    read_buffer_size: usize,
    events: mpsc::UnboundedSender<DeviceEvent>,
    link: Option<Box<dyn SerialLink>>,
    baud: u32,
    boot_mode: BootMode,
}

impl DeviceEndpoint {
    pub fn with_connector(
        path: &str,
        connector: Box<dyn Connector>,
        config: &Config,
        events: mpsc::UnboundedSender<DeviceEvent>,
    ) -> Self {
        let serial = &config.serial;
        Self {
            path: path.to_string(),
            connector,
            settings: LinkSettings {
                baud: serial.default_baud,
                read_timeout: Duration::from_millis(serial.read_timeout_ms),
                write_timeout: Duration::from_millis(serial.write_retry_delay_ms.max(1)),
            },
            policy: config.serial.write_policy(),
            sequences: config.boot.sequences(),
            read_buffer_size: serial.read_buffer_size,
            events,
            link: None,
            baud: serial.default_baud,
            boot_mode: BootMode::Normal,
        }
    }

    pub fn is_open(&self) -> bool {
        self.link.is_some()
    }

    pub fn baud(&self) -> u32 {
        self.baud
    }

    pub fn boot_mode(&self) -> BootMode {
        self.boot_mode
    }

    fn link_mut(&mut self) -> Result<&mut Box<dyn SerialLink>> {
        self.link.as_mut().ok_or(BridgeError::DeviceNotOpen)
    }

    fn apply_baud(&mut self, baud: u32) -> Result<()> {
        self.link_mut()?.set_baud_rate(baud)?;
        self.baud = baud;
        info!("Set baud to {}", baud);
        Ok(())
    }

    fn spawn_reader(&self, mut reader: Box<dyn Read + Send>) -> Result<()> {
        let events = self.events.clone();
        let path = self.path.clone();
        let mut buf = vec![0u8; self.read_buffer_size.max(1)];
        std::thread::Builder::new()
            .name("serial-reader".to_string())
            .spawn(move || loop {
                if events.is_closed() {
                    debug!("Serial reader for {} stopping", path);
                    return;
                }
                match reader.read(&mut buf) {
                    Ok(0) => {
                        let _ = events.send(DeviceEvent::Failed(BridgeError::DeviceDisconnected(
                            path.clone(),
                        )));
                        return;
                    }
                    Ok(n) => {
                        trace!("UART rx {} bytes: {}", n, hex_snippet(&buf[..n], 32));
                        if events
                            .send(DeviceEvent::Data(Bytes::copy_from_slice(&buf[..n])))
                            .is_err()
                        {
                            return;
                        }
                    }
                    Err(ref e)
                        if matches!(
                            e.kind(),
                            ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                        ) => {}
                    Err(e) => {
                        let _ = events.send(DeviceEvent::Failed(BridgeError::Io(e)));
                        return;
                    }
                }
            })?;
        Ok(())
    }
}

impl DeviceControl for DeviceEndpoint {
    fn open(&mut self) -> Result<()> {
        if self.link.is_some() {
            return Ok(());
        }
        let (link, reader) = self.connector.connect(&self.path, &self.settings)?;
        self.link = Some(link);
        self.enter_boot_mode(BootMode::Normal)?;
        self.apply_baud(self.settings.baud)?;
        self.spawn_reader(reader)?;
        info!("Opened serial device {} (8N1, no flow control)", self.path);
        Ok(())
    }

    fn set_baud(&mut self, baud: u32) -> Result<()> {
        if baud == self.baud {
            return Ok(());
        }
        self.apply_baud(baud)
    }

    fn enter_boot_mode(&mut self, mode: BootMode) -> Result<()> {
        let link = self.link.as_mut().ok_or(BridgeError::DeviceNotOpen)?;
        for op in self.sequences.for_mode(mode) {
            match *op {
                LineOp::Dtr(level) => link.set_dtr(level)?,
                LineOp::Rts(level) => link.set_rts(level)?,
                LineOp::DelayMs(_) => {}
            }
            if let Some(pause) = op.delay() {
                std::thread::sleep(pause);
            }
        }
        if self.boot_mode != mode {
            info!("Boot mode {} -> {}", self.boot_mode, mode);
        }
        self.boot_mode = mode;
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> WriteOutcome {
        let policy = self.policy;
        let Some(link) = self.link.as_mut() else {
            warn!("Dropping {} bytes: serial device not open", bytes.len());
            metrics::record_backpressure_drop(bytes.len());
            return WriteOutcome::Dropped {
                written: 0,
                dropped: bytes.len(),
                attempts: 0,
            };
        };
        trace!("UART tx {} bytes: {}", bytes.len(), hex_snippet(bytes, 32));
        let outcome = write_with_retry(&mut **link, bytes, &policy);
        match outcome {
            WriteOutcome::Complete { .. } => metrics::add_bytes_to_device(bytes.len()),
            WriteOutcome::Dropped {
                written,
                dropped,
                attempts,
            } => {
                metrics::add_bytes_to_device(written);
                metrics::record_backpressure_drop(dropped);
                warn!(
                    "Serial backpressure: dropped {} of {} bytes after {} attempts",
                    dropped,
                    bytes.len(),
                    attempts
                );
            }
        }
        outcome
    }
}
