//! # rfc2217-bridge - Telnet/RFC 2217 to Serial Bridge for ESP32 Flashing
//!
//! Exposes a local serial device (typically an ESP32 behind a USB-UART adapter)
//! on a TCP port so network flashing tools can talk to it as if it were a local
//! port. Clients speak telnet with the RFC 2217 COM-PORT-OPTION; the bridge
//! applies baud changes and drives the DTR/RTS lines to put the chip into its
//! bootloader or reset it.
//!
//! ## Features
//!
//! - **Transparent Payload**: IAC escaping in both directions, commands split across reads are reassembled.
//! - **RFC 2217 Subset**: SET-BAUDRATE and SET-CONTROL take effect, the other sub-commands are acknowledged.
//! - **Boot-Mode Profiles**: discrete-transistor auto-reset circuits, integrated USB-serial/JTAG, or custom sequences.
//! - **Bounded Backpressure**: a stalled device never wedges the bridge; unsent bytes are dropped and logged.
//! - **Session Recovery**: a client disconnect restores 115200 baud and normal boot mode.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rfc2217_bridge::bridge::Bridge;
//! use rfc2217_bridge::config::Config;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let bridge = Bridge::bind(&config, "/dev/ttyUSB0", 4000).await?;
//!     bridge.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`bridge`] - Driver loop wiring the two endpoints together
//! - [`telnet`] - Telnet codec, RFC 2217 commands, client endpoint
//! - [`serial`] - Device endpoint, boot-mode control, write retry policy
//! - [`config`] - TOML configuration and validation
//! - [`error`] - Fatal error type
//! - [`metrics`] - Traffic counters
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ TelnetEndpoint  │ ← TCP client, decoder, COM-PORT dispatch
//! └─────────────────┘
//!          │  DeviceControl
//! ┌─────────────────┐
//! │     Bridge      │ ← Single task, owns both endpoints
//! └─────────────────┘
//!          │  DeviceEvent (mpsc)
//! ┌─────────────────┐
//! │ DeviceEndpoint  │ ← Serial handle, read thread, boot lines
//! └─────────────────┘
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod logutil;
pub mod metrics;
pub mod serial;
pub mod telnet;

pub use error::{BridgeError, Result};
