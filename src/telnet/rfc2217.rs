//! COM-PORT-OPTION (RFC 2217) subset.
//!
//! Only SET-BAUDRATE and the boot-mode values of SET-CONTROL have an effect;
//! data size, parity, stop size, the remaining control values and purge are
//! acknowledged without touching the device.

use super::codec::escape;
use super::{COM_PORT_OPTION, IAC, SB, SE};
use crate::serial::BootMode;

pub const SET_BAUDRATE: u8 = 1;
pub const SET_DATASIZE: u8 = 2;
pub const SET_PARITY: u8 = 3;
pub const SET_STOPSIZE: u8 = 4;
pub const SET_CONTROL: u8 = 5;
pub const PURGE_DATA: u8 = 12;

/// Server replies use the client sub-command number plus this offset.
pub const SERVER_OFFSET: u8 = 100;

/// SET-CONTROL values that drive the boot-mode lines.
pub const CONTROL_BOOTLOADER: u8 = 8;
pub const CONTROL_RESET: u8 = 11;

/// A complete `IAC SB 44 <body> IAC SE` frame as received (IACs in the body unescaped).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComPortRequest {
    frame: Vec<u8>,
}

impl ComPortRequest {
    pub fn from_frame(frame: Vec<u8>) -> Self {
        Self { frame }
    }

    pub fn frame(&self) -> &[u8] {
        &self.frame
    }

    /// Bytes between the option number and the trailing `IAC SE`.
    pub fn body(&self) -> &[u8] {
        let end = self.frame.len().saturating_sub(2);
        self.frame.get(3..end).unwrap_or(&[])
    }

    pub fn command(&self) -> Option<ComPortCommand> {
        ComPortCommand::parse(self.body())
    }

    /// The request echoed back with the sub-command renumbered as a server reply.
    pub fn ack(&self) -> Vec<u8> {
        let mut body = self.body().to_vec();
        if let Some(first) = body.first_mut() {
            *first = first.wrapping_add(SERVER_OFFSET);
        }
        let body = escape(&body);
        let mut out = Vec::with_capacity(body.len() + 5);
        out.extend_from_slice(&[IAC, SB, COM_PORT_OPTION]);
        out.extend_from_slice(&body);
        out.extend_from_slice(&[IAC, SE]);
        out
    }
}

/// Recognised client sub-commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComPortCommand {
    SetBaudRate(u32),
    SetDataSize(u8),
    SetParity(u8),
    SetStopSize(u8),
    SetControl(u8),
    PurgeData(u8),
}

impl ComPortCommand {
    /// Parse a subnegotiation body. Unknown sub-commands and wrong lengths yield `None`.
    pub fn parse(body: &[u8]) -> Option<Self> {
        match body {
            &[SET_BAUDRATE, a, b, c, d] => Some(Self::SetBaudRate(u32::from_be_bytes([a, b, c, d]))),
            &[SET_DATASIZE, v] => Some(Self::SetDataSize(v)),
            &[SET_PARITY, v] => Some(Self::SetParity(v)),
            &[SET_STOPSIZE, v] => Some(Self::SetStopSize(v)),
            &[SET_CONTROL, v] => Some(Self::SetControl(v)),
            &[PURGE_DATA, v] => Some(Self::PurgeData(v)),
            _ => None,
        }
    }

    /// Boot mode requested by this command, if any.
    pub fn boot_mode(&self) -> Option<BootMode> {
        match self {
            Self::SetControl(CONTROL_BOOTLOADER) => Some(BootMode::Bootloader),
            Self::SetControl(CONTROL_RESET) => Some(BootMode::Reset),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SetBaudRate(_) => "SET-BAUDRATE",
            Self::SetDataSize(_) => "SET-DATASIZE",
            Self::SetParity(_) => "SET-PARITY",
            Self::SetStopSize(_) => "SET-STOPSIZE",
            Self::SetControl(_) => "SET-CONTROL",
            Self::PurgeData(_) => "PURGE-DATA",
        }
    }
}
