//! Test utilities: a bridge on loopback backed by an in-memory serial device.

use rfc2217_bridge::bridge::Bridge;
use rfc2217_bridge::config::Config;
use rfc2217_bridge::serial::memory::MemoryDevice;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const IAC: u8 = 255;
pub const DO: u8 = 253;
pub const SB: u8 = 250;
pub const SE: u8 = 240;
pub const COM_PORT: u8 = 44;

const WAIT: Duration = Duration::from_secs(3);

/// Loopback listener, fast polling and a short retry delay.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.telnet.bind_address = "127.0.0.1".to_string();
    config.serial.read_timeout_ms = 10;
    config.serial.write_retry_delay_ms = 1;
    config
}

pub struct Harness {
    pub addr: SocketAddr,
    pub device: MemoryDevice,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<rfc2217_bridge::Result<()>>,
}

pub async fn start(config: Config) -> Harness {
    let device = MemoryDevice::new();
    let bridge = Bridge::bind_with_connector(&config, "mem0", 0, Box::new(device.connector()))
        .await
        .expect("bind bridge");
    let addr = bridge.local_addr().expect("local addr");
    let (tx, rx) = oneshot::channel();
    let task = tokio::spawn(bridge.run_until(async move {
        let _ = rx.await;
    }));
    Harness {
        addr,
        device,
        shutdown: Some(tx),
        task,
    }
}

impl Harness {
    /// Connect and complete the `DO 1` exchange, which also proves the device is open.
    pub async fn connect(&self) -> TcpStream {
        let mut stream = TcpStream::connect(self.addr).await.expect("connect");
        stream.write_all(&[IAC, DO, 1]).await.unwrap();
        assert_eq!(read_n(&mut stream, 3).await, vec![IAC, DO, COM_PORT]);
        stream
    }

    /// Stop via the shutdown future and return the bridge result.
    pub async fn stop(mut self) -> rfc2217_bridge::Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.finished().await
    }

    /// Wait for the bridge to end on its own.
    pub async fn finished(self) -> rfc2217_bridge::Result<()> {
        tokio::time::timeout(WAIT, self.task)
            .await
            .expect("bridge did not stop")
            .expect("bridge task panicked")
    }
}

pub fn com_port(body: &[u8]) -> Vec<u8> {
    let mut frame = vec![IAC, SB, COM_PORT];
    frame.extend_from_slice(body);
    frame.extend_from_slice(&[IAC, SE]);
    frame
}

#[allow(dead_code)]
pub fn set_baudrate(baud: u32) -> Vec<u8> {
    let mut body = vec![1];
    body.extend_from_slice(&baud.to_be_bytes());
    com_port(&body)
}

#[allow(dead_code)]
pub fn set_baudrate_ack(baud: u32) -> Vec<u8> {
    let mut body = vec![101];
    body.extend_from_slice(&baud.to_be_bytes());
    com_port(&body)
}

pub async fn read_n(stream: &mut TcpStream, n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    tokio::time::timeout(WAIT, stream.read_exact(&mut buf))
        .await
        .expect("timed out waiting for client bytes")
        .expect("client read");
    buf
}

/// Send a request and read back a reply of the same length.
#[allow(dead_code)]
pub async fn request(stream: &mut TcpStream, frame: &[u8], reply_len: usize) -> Vec<u8> {
    stream.write_all(frame).await.unwrap();
    read_n(stream, reply_len).await
}

/// Poll `cond` until it holds or the wait budget runs out.
#[allow(dead_code)]
pub async fn wait_for(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
