//! # Serial Device Module
//!
//! The device side of the bridge: opening the serial device, line settings,
//! boot-mode control lines, the read thread and the bounded-retry write policy.
//!
//! ## Seams
//!
//! - [`SerialLink`] is the write/control half of an open device.
//! - [`Connector`] opens a device path and hands back a [`SerialLink`] plus an
//!   independent read handle for the read thread. [`NativeConnector`] does this
//!   with the `serialport` crate.
//! - [`DeviceControl`] is the capability the telnet side gets to drive the
//!   device. [`DeviceEndpoint`] is the real implementation.
//!
//! ## Threading
//!
//! `serialport` handles are blocking. Reads happen on a dedicated thread that
//! forwards every chunk as a [`DeviceEvent`] over a tokio channel; all other
//! operations run on the bridge task.

pub mod boot;
pub mod device;
pub mod memory;

pub use boot::{BootMode, BootProfile, BootSequences, LineOp};
pub use device::{write_with_retry, DeviceEndpoint, WriteOutcome, WritePolicy};

use crate::error::{BridgeError, Result};
use bytes::Bytes;
use log::debug;
use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::Duration;

/// Write and control half of an open serial device.
pub trait SerialLink: Send {
    fn set_baud_rate(&mut self, baud: u32) -> Result<()>;
    fn set_dtr(&mut self, level: bool) -> Result<()>;
    fn set_rts(&mut self, level: bool) -> Result<()>;
    /// Single write attempt; may accept fewer bytes than offered.
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize>;
}

/// Parameters for opening a device.
#[derive(Debug, Clone, Copy)]
pub struct LinkSettings {
    pub baud: u32,
    /// Poll interval of the read thread; also how quickly it notices shutdown.
    pub read_timeout: Duration,
    /// Upper bound of a single write attempt.
    pub write_timeout: Duration,
}

/// Opens device paths.
pub trait Connector: Send {
    fn connect(
        &mut self,
        path: &str,
        settings: &LinkSettings,
    ) -> Result<(Box<dyn SerialLink>, Box<dyn Read + Send>)>;
}

/// What the telnet side may do to the device.
pub trait DeviceControl: Send {
    /// Open the device if it is not open yet.
    fn open(&mut self) -> Result<()>;
    fn set_baud(&mut self, baud: u32) -> Result<()>;
    fn enter_boot_mode(&mut self, mode: BootMode) -> Result<()>;
    /// Write payload with the bounded retry policy. Never fatal.
    fn write(&mut self, bytes: &[u8]) -> WriteOutcome;
}

/// Output of the device read thread.
#[derive(Debug)]
pub enum DeviceEvent {
    Data(Bytes),
    Failed(BridgeError),
}

/// [`Connector`] backed by the `serialport` crate, fixed to 8-N-1 without flow control.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeConnector;

impl Connector for NativeConnector {
    fn connect(
        &mut self,
        path: &str,
        settings: &LinkSettings,
    ) -> Result<(Box<dyn SerialLink>, Box<dyn Read + Send>)> {
        debug!("Opening serial port {} at {} baud", path, settings.baud);
        let port = serialport::new(path, settings.baud)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(settings.write_timeout)
            .open()?;
        let mut reader = port.try_clone()?;
        reader.set_timeout(settings.read_timeout)?;
        Ok((Box::new(NativeLink(port)), Box::new(reader)))
    }
}

struct NativeLink(Box<dyn SerialPort>);

impl SerialLink for NativeLink {
    fn set_baud_rate(&mut self, baud: u32) -> Result<()> {
        Ok(self.0.set_baud_rate(baud)?)
    }

    fn set_dtr(&mut self, level: bool) -> Result<()> {
        Ok(self.0.write_data_terminal_ready(level)?)
    }

    fn set_rts(&mut self, level: bool) -> Result<()> {
        Ok(self.0.write_request_to_send(level)?)
    }

    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        Write::write(&mut self.0, buf)
    }
}
