//! # Configuration Module
//!
//! Optional TOML configuration for the bridge. Every section and every key has
//! a default, so running without a file (or with a partial one) is the normal
//! case; the positional command-line arguments carry the only required values.
//!
//! ## Sections
//!
//! - [`SerialConfig`] - default baud, read polling and the write retry bound
//! - [`TelnetConfig`] - listen address, read buffer and command length cap
//! - [`BootConfig`] - control-line profile for ESP32 boot-mode selection
//! - [`LoggingConfig`] - log level and optional log file
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rfc2217_bridge::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("bridge.toml").await?;
//!     config.validate()?;
//!     println!("listening on {}", config.telnet.bind_address);
//!     Ok(())
//! }
//! ```
//!
//! ## File Format
//!
//! ```toml
//! [serial]
//! default_baud = 115200
//! write_max_attempts = 100
//! write_retry_delay_ms = 10
//!
//! [telnet]
//! bind_address = "::"
//!
//! [boot]
//! profile = "usb-jtag"
//!
//! # Or spell the sequences out; `custom` wins over `profile`.
//! [boot.custom]
//! normal = [{ dtr = false }, { rts = false }]
//! bootloader = [{ dtr = true }, { rts = false }]
//! reset = [{ dtr = false }, { rts = true }, { delay_ms = 100 }, { rts = false }]
//!
//! [logging]
//! level = "debug"
//! file = "bridge.log"
//! ```

use crate::serial::{BootProfile, BootSequences, WritePolicy};
use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::fs;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub telnet: TelnetConfig,
    #[serde(default)]
    pub boot: BootConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Baud applied on open and restored after every client disconnect.
    pub default_baud: u32,
    /// Read poll interval of the serial read thread.
    pub read_timeout_ms: u64,
    pub read_buffer_size: usize,
    /// Write attempts before the unsent remainder is dropped.
    pub write_max_attempts: u32,
    pub write_retry_delay_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            default_baud: 115_200,
            read_timeout_ms: 100,
            read_buffer_size: 128,
            write_max_attempts: 100,
            write_retry_delay_ms: 10,
        }
    }
}

impl SerialConfig {
    pub fn write_policy(&self) -> WritePolicy {
        WritePolicy {
            max_attempts: self.write_max_attempts,
            retry_delay: Duration::from_millis(self.write_retry_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelnetConfig {
    /// `::` accepts IPv6 and IPv4-mapped clients on dual-stack hosts.
    pub bind_address: String,
    pub read_buffer_size: usize,
    /// An unfinished command longer than this is discarded.
    pub max_command_len: usize,
}

impl Default for TelnetConfig {
    fn default() -> Self {
        Self {
            bind_address: "::".to_string(),
            read_buffer_size: 128,
            max_command_len: crate::telnet::codec::DEFAULT_MAX_COMMAND_LEN,
        }
    }
}

impl TelnetConfig {
    pub fn socket_addr(&self, port: u16) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .bind_address
            .parse()
            .map_err(|e| anyhow!("Invalid telnet.bind_address {}: {}", self.bind_address, e))?;
        Ok(SocketAddr::new(ip, port))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BootConfig {
    pub profile: BootProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<BootSequences>,
}

impl BootConfig {
    /// Sequences in effect: `custom` if present, otherwise the profile preset.
    pub fn sequences(&self) -> BootSequences {
        match &self.custom {
            Some(custom) => custom.clone(),
            None => self.profile.sequences(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Reject values that would make the bridge misbehave rather than fail.
    pub fn validate(&self) -> Result<()> {
        if self.serial.default_baud == 0 {
            bail!("serial.default_baud must be non-zero");
        }
        if self.serial.write_max_attempts == 0 {
            bail!("serial.write_max_attempts must be at least 1");
        }
        if self.serial.read_buffer_size == 0 || self.telnet.read_buffer_size == 0 {
            bail!("read_buffer_size must be non-zero");
        }
        // IAC SB 44 <cmd> IAC SE is the shortest frame worth keeping.
        if self.telnet.max_command_len < 5 {
            bail!("telnet.max_command_len must be at least 5");
        }
        self.telnet.socket_addr(0)?;
        if let Some(custom) = &self.boot.custom {
            custom
                .validate()
                .map_err(|e| anyhow!("Invalid boot.custom: {}", e))?;
        }
        if log_level(&self.logging.level).is_none() {
            bail!("Unknown logging.level {}", self.logging.level);
        }
        Ok(())
    }
}

/// Parse a level name as used in `logging.level`.
pub fn log_level(name: &str) -> Option<log::LevelFilter> {
    name.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::LineOp;

    #[test]
    fn test_defaults_match_wire_defaults() {
        let config = Config::default();
        assert_eq!(config.serial.default_baud, 115_200);
        assert_eq!(config.serial.write_policy(), WritePolicy::default());
        assert_eq!(config.telnet.bind_address, "::");
        assert_eq!(config.boot.profile, BootProfile::Transistor);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_file_is_all_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.serial.read_buffer_size, 128);
        assert_eq!(config.telnet.max_command_len, 4096);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: Config = toml::from_str("[serial]\nwrite_max_attempts = 5\n").unwrap();
        assert_eq!(config.serial.write_max_attempts, 5);
        assert_eq!(config.serial.write_retry_delay_ms, 10);
        assert_eq!(config.serial.default_baud, 115_200);
    }

    #[test]
    fn test_profile_by_name() {
        let config: Config = toml::from_str("[boot]\nprofile = \"usb-jtag\"\n").unwrap();
        assert_eq!(config.boot.profile, BootProfile::UsbJtag);
        assert_eq!(config.boot.sequences(), BootProfile::UsbJtag.sequences());
    }

    #[test]
    fn test_custom_sequences_override_profile() {
        let toml_src = r#"
[boot]
profile = "usb-jtag"

[boot.custom]
normal = [{ dtr = false }, { rts = false }]
bootloader = [{ dtr = true }, { delay_ms = 50 }, { rts = false }]
reset = [{ rts = true }]
"#;
        let config: Config = toml::from_str(toml_src).unwrap();
        let seq = config.boot.sequences();
        assert_eq!(
            seq.bootloader,
            vec![LineOp::Dtr(true), LineOp::DelayMs(50), LineOp::Rts(false)]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.serial.write_max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.serial.default_baud = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.telnet.bind_address = "not-an-ip".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.boot.custom = Some(BootSequences {
            normal: vec![LineOp::DelayMs(5)],
            bootloader: vec![LineOp::Dtr(true)],
            reset: vec![LineOp::Rts(true)],
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_socket_addr_uses_bind_address() {
        let mut telnet = TelnetConfig::default();
        assert_eq!(
            telnet.socket_addr(4000).unwrap(),
            "[::]:4000".parse::<SocketAddr>().unwrap()
        );
        telnet.bind_address = "127.0.0.1".to_string();
        assert_eq!(
            telnet.socket_addr(4000).unwrap(),
            "127.0.0.1:4000".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_default_serializes_and_parses_back() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.boot.profile, BootProfile::Transistor);
        assert_eq!(parsed.serial.write_max_attempts, 100);
    }
}
