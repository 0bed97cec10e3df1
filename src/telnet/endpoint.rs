//! TCP side of the bridge: one listener, at most one active client.

use super::codec::escape;
use super::session::Session;
use crate::config::TelnetConfig;
use crate::error::{BridgeError, Result};
use crate::logutil::hex_snippet;
use crate::metrics;
use crate::serial::{BootMode, DeviceControl};
use log::{debug, info, trace};
use std::io::{self, ErrorKind};
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;

/// Classified result of a client read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientRead {
    Data(usize),
    /// EOF or connection reset: an expected disconnect.
    Closed,
}

impl ClientRead {
    /// Any other read error is fatal.
    pub fn classify(result: io::Result<usize>) -> Result<Self> {
        match result {
            Ok(0) => Ok(ClientRead::Closed),
            Ok(n) => Ok(ClientRead::Data(n)),
            Err(e) if e.kind() == ErrorKind::ConnectionReset => Ok(ClientRead::Closed),
            Err(e) => Err(BridgeError::Io(e)),
        }
    }
}

pub struct TelnetEndpoint {
    listener: TcpListener,
    session: Session,
    client: Option<OwnedWriteHalf>,
    peer: Option<SocketAddr>,
    default_baud: u32,
}

impl TelnetEndpoint {
    /// Bind the listener; `default_baud` is what a disconnect restores.
    pub async fn bind(config: &TelnetConfig, port: u16, default_baud: u32) -> Result<Self> {
        let addr = config
            .socket_addr(port)
            .map_err(|e| BridgeError::Config(e.to_string()))?;
        let listener = TcpListener::bind(addr).await?;
        info!("Listening for telnet clients on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            session: Session::new(config.max_command_len),
            client: None,
            peer: None,
            default_baud,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Wait for the next client. Parser state from any previous client is discarded.
    pub async fn accept(&mut self) -> Result<OwnedReadHalf> {
        let (stream, peer) = self.listener.accept().await?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("set_nodelay failed for {}: {}", peer, e);
        }
        let (reader, writer) = stream.into_split();
        self.session.reset();
        self.client = Some(writer);
        self.peer = Some(peer);
        metrics::inc_connections();
        info!("Telnet connection from {}", peer);
        Ok(reader)
    }

    /// Handle bytes read from the client: payload to the device, replies back.
    pub async fn receive(&mut self, input: &[u8], device: &mut dyn DeviceControl) -> Result<()> {
        trace!("TCP rx {} bytes: {}", input.len(), hex_snippet(input, 32));
        let replies = self.session.process(input, device)?;
        if !replies.is_empty() {
            self.write_client(&replies).await;
        }
        Ok(())
    }

    /// Forward device bytes to the client, IAC-escaped.
    pub async fn send(&mut self, payload: &[u8]) {
        if self.client.is_none() {
            return;
        }
        let encoded = escape(payload);
        self.write_client(&encoded).await;
        metrics::add_bytes_to_client(payload.len());
    }

    /// Drop the client and put the device back to its idle state.
    pub fn disconnect(&mut self, device: &mut dyn DeviceControl) -> Result<()> {
        self.client = None;
        if let Some(peer) = self.peer.take() {
            info!("Finished telnet connection from {}", peer);
        }
        if self.session.is_mid_sequence() {
            debug!("Client left with an unfinished telnet command; discarded");
        }
        device.set_baud(self.default_baud)?;
        device.enter_boot_mode(BootMode::Normal)?;
        let m = metrics::snapshot();
        info!(
            "Totals: connections={} to_device={}B to_client={}B acks={} skipped={} drops={} ({}B)",
            m.connections,
            m.bytes_to_device,
            m.bytes_to_client,
            m.com_port_acks,
            m.skipped_commands,
            m.backpressure_drops,
            m.dropped_bytes
        );
        Ok(())
    }

    // Write failures only get logged; the read side notices the disconnect.
    async fn write_client(&mut self, bytes: &[u8]) {
        let Some(client) = self.client.as_mut() else {
            return;
        };
        trace!("TCP tx {} bytes: {}", bytes.len(), hex_snippet(bytes, 32));
        if let Err(e) = client.write_all(bytes).await {
            debug!("Telnet write failed: {}", e);
        }
    }
}
