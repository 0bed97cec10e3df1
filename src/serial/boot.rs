//! Boot-mode control-line sequences.
//!
//! The two modem control lines (DTR, RTS) are wired to the microcontroller's
//! enable and boot-strap pins. How exactly depends on the board, so the
//! sequence for each [`BootMode`] is data selected per deployment:
//!
//! - [`BootProfile::Transistor`]: the two-transistor auto-download circuit found
//!   on most dev kits. Levels are held, no pulses.
//!
//!   | DTR asserted | RTS asserted | mode       |
//!   |--------------|--------------|------------|
//!   | no           | no           | Normal     |
//!   | no           | yes          | Reset      |
//!   | yes          | no           | Bootloader |
//!
//! - [`BootProfile::UsbJtag`]: integrated USB-serial/JTAG bridges, which need a
//!   timed pulse train instead of static levels.
//!
//! A `[boot.custom]` config table replaces either preset entirely.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Logical state the attached microcontroller is driven into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BootMode {
    #[default]
    Normal,
    Bootloader,
    Reset,
}

impl fmt::Display for BootMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootMode::Normal => write!(f, "normal"),
            BootMode::Bootloader => write!(f, "bootloader"),
            BootMode::Reset => write!(f, "reset"),
        }
    }
}

/// One step of a control-line sequence.
///
/// In TOML: `{ dtr = true }`, `{ rts = false }` or `{ delay_ms = 100 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineOp {
    Dtr(bool),
    Rts(bool),
    DelayMs(u64),
}

impl LineOp {
    pub fn delay(&self) -> Option<Duration> {
        match self {
            LineOp::DelayMs(ms) => Some(Duration::from_millis(*ms)),
            _ => None,
        }
    }
}

/// Control-line sequences for all three modes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootSequences {
    pub normal: Vec<LineOp>,
    pub bootloader: Vec<LineOp>,
    pub reset: Vec<LineOp>,
}

impl BootSequences {
    pub fn for_mode(&self, mode: BootMode) -> &[LineOp] {
        match mode {
            BootMode::Normal => &self.normal,
            BootMode::Bootloader => &self.bootloader,
            BootMode::Reset => &self.reset,
        }
    }

    /// Every mode must drive at least one line.
    pub fn validate(&self) -> Result<(), String> {
        for mode in [BootMode::Normal, BootMode::Bootloader, BootMode::Reset] {
            let drives_a_line = self
                .for_mode(mode)
                .iter()
                .any(|op| matches!(op, LineOp::Dtr(_) | LineOp::Rts(_)));
            if !drives_a_line {
                return Err(format!("boot sequence for {mode} sets no control line"));
            }
        }
        Ok(())
    }
}

/// Preset sequence tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BootProfile {
    #[default]
    Transistor,
    UsbJtag,
}

impl BootProfile {
    pub fn sequences(&self) -> BootSequences {
        use LineOp::*;
        match self {
            BootProfile::Transistor => BootSequences {
                normal: vec![Dtr(false), Rts(false)],
                bootloader: vec![Dtr(true), Rts(false)],
                reset: vec![Dtr(false), Rts(true)],
            },
            BootProfile::UsbJtag => BootSequences {
                normal: vec![Rts(false), Dtr(false)],
                bootloader: vec![
                    Rts(false),
                    Dtr(false),
                    DelayMs(100),
                    Dtr(true),
                    Rts(false),
                    DelayMs(100),
                    Rts(true),
                    Dtr(false),
                    Rts(true),
                    DelayMs(100),
                    Rts(false),
                    Dtr(false),
                ],
                reset: vec![Rts(true), DelayMs(100), Rts(false)],
            },
        }
    }

    /// Name as accepted in config files and on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            BootProfile::Transistor => "transistor",
            BootProfile::UsbJtag => "usb-jtag",
        }
    }
}

impl std::str::FromStr for BootProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "transistor" => Ok(BootProfile::Transistor),
            "usb-jtag" | "usbjtag" | "usb_jtag" => Ok(BootProfile::UsbJtag),
            other => Err(format!(
                "unknown boot profile '{other}' (expected 'transistor' or 'usb-jtag')"
            )),
        }
    }
}
