//! # Telnet Module
//!
//! Client side of the bridge: telnet framing with IAC escaping and the subset
//! of RFC 2217 (COM-PORT-OPTION) needed by flashing tools.
//!
//! - [`codec`] - streaming decoder and escaping, no I/O
//! - [`rfc2217`] - COM-PORT-OPTION sub-commands and acknowledgements
//! - [`session`] - per-connection interpretation of decoded frames
//! - [`endpoint`] - TCP listener and the single active client
//!
//! ## Wire summary
//!
//! ```text
//! IAC IAC                      literal 0xFF in payload
//! IAC DO 1                  -> IAC DO 44
//! IAC WILL <opt>               ignored
//! IAC SB 44 <cmd> ... IAC SE -> IAC SB 44 <cmd+100> ... IAC SE
//! ```

pub mod codec;
pub mod endpoint;
pub mod rfc2217;
pub mod session;

pub use codec::{escape, Command, Frame, TelnetDecoder};
pub use endpoint::{ClientRead, TelnetEndpoint};
pub use rfc2217::{ComPortCommand, ComPortRequest};
pub use session::Session;

pub const IAC: u8 = 255;
pub const DONT: u8 = 254;
pub const DO: u8 = 253;
pub const WONT: u8 = 252;
pub const WILL: u8 = 251;
pub const SB: u8 = 250;
pub const SE: u8 = 240;

/// Telnet ECHO option; `DO ECHO` is the first thing esptool-style clients send.
pub const OPT_ECHO: u8 = 1;
/// RFC 2217 COM-PORT-OPTION.
pub const COM_PORT_OPTION: u8 = 44;
