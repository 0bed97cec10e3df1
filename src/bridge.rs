//! Bridge driver: owns both endpoints and moves bytes between them.
//!
//! ```text
//!   TCP client ──read──> TelnetEndpoint ──payload/commands──> DeviceEndpoint ──> UART
//!   TCP client <─escape─ TelnetEndpoint <──DeviceEvent (mpsc)── serial-reader thread
//! ```
//!
//! Everything except the serial read thread runs on one task, so parser
//! state and device session state are never shared.

use crate::config::Config;
use crate::error::{BridgeError, Result};
use crate::serial::{Connector, DeviceControl, DeviceEndpoint, DeviceEvent, NativeConnector};
use crate::telnet::{ClientRead, TelnetEndpoint};
use log::{debug, info, warn};
use std::future::Future;
use std::net::SocketAddr;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;

pub struct Bridge {
    telnet: TelnetEndpoint,
    device: DeviceEndpoint,
    events: mpsc::UnboundedReceiver<DeviceEvent>,
    read_buffer_size: usize,
}

impl Bridge {
    /// Bind the telnet listener for `device_path` using the native serial driver.
    pub async fn bind(config: &Config, device_path: &str, port: u16) -> Result<Self> {
        Self::bind_with_connector(config, device_path, port, Box::new(NativeConnector)).await
    }

    pub async fn bind_with_connector(
        config: &Config,
        device_path: &str,
        port: u16,
        connector: Box<dyn Connector>,
    ) -> Result<Self> {
        let (tx, events) = mpsc::unbounded_channel();
        let device = DeviceEndpoint::with_connector(device_path, connector, config, tx);
        let telnet = TelnetEndpoint::bind(&config.telnet, port, config.serial.default_baud).await?;
        Ok(Self {
            telnet,
            device,
            events,
            read_buffer_size: config.telnet.read_buffer_size.max(1),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.telnet.local_addr()
    }

    /// Serve clients until a fatal error or Ctrl-C.
    pub async fn run(self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Serve clients until a fatal error or until `shutdown` completes.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut buf = vec![0u8; self.read_buffer_size];

        loop {
            let mut reader = tokio::select! {
                accepted = self.telnet.accept() => accepted?,
                event = self.events.recv() => {
                    Self::idle_event(event)?;
                    continue;
                }
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    return Ok(());
                }
            };
            self.device.open()?;

            loop {
                tokio::select! {
                    read = reader.read(&mut buf) => match ClientRead::classify(read)? {
                        ClientRead::Data(n) => {
                            self.telnet.receive(&buf[..n], &mut self.device).await?;
                        }
                        ClientRead::Closed => break,
                    },
                    event = self.events.recv() => match event {
                        Some(DeviceEvent::Data(bytes)) => self.telnet.send(&bytes).await,
                        Some(DeviceEvent::Failed(e)) => return Err(e),
                        None => return Err(BridgeError::EventChannelClosed),
                    },
                    _ = &mut shutdown => {
                        info!("Shutdown requested");
                        return Ok(());
                    }
                }
            }

            self.telnet.disconnect(&mut self.device)?;
        }
    }

    /// Device output with nobody connected is discarded; failures stay fatal.
    fn idle_event(event: Option<DeviceEvent>) -> Result<()> {
        match event {
            Some(DeviceEvent::Data(bytes)) => {
                debug!("Discarding {} device bytes, no client connected", bytes.len());
                Ok(())
            }
            Some(DeviceEvent::Failed(e)) => Err(e),
            None => Err(BridgeError::EventChannelClosed),
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Ctrl-C handler unavailable: {}", e);
        std::future::pending::<()>().await;
    }
}
