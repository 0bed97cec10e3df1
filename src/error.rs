use thiserror::Error;

/// Fatal conditions that terminate the bridge.
///
/// Expected client disconnects, malformed telnet commands and backpressure
/// drops are absorbed where they happen and never show up here.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Network or device I/O failure other than an orderly client disconnect.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure reported by the serial driver (open, line settings, control lines).
    #[error("serial error: {0}")]
    Serial(#[from] serialport::Error),

    /// The serial device reported end of stream (unplugged).
    #[error("serial device {0} disconnected")]
    DeviceDisconnected(String),

    /// A device operation was requested before the first client connected.
    #[error("serial device is not open")]
    DeviceNotOpen,

    /// The device read thread went away without reporting why.
    #[error("device event channel closed")]
    EventChannelClosed,

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
