//! Process-wide traffic counters.
//! Read through [`snapshot`] and logged at the end of every client session.
use std::sync::atomic::{AtomicU64, Ordering};

static CONNECTIONS: AtomicU64 = AtomicU64::new(0);
static BYTES_TO_DEVICE: AtomicU64 = AtomicU64::new(0);
static BYTES_TO_CLIENT: AtomicU64 = AtomicU64::new(0);
static COM_PORT_ACKS: AtomicU64 = AtomicU64::new(0);
static SKIPPED_COMMANDS: AtomicU64 = AtomicU64::new(0);
static BACKPRESSURE_DROPS: AtomicU64 = AtomicU64::new(0);
static DROPPED_BYTES: AtomicU64 = AtomicU64::new(0);

pub fn inc_connections() {
    CONNECTIONS.fetch_add(1, Ordering::Relaxed);
}

pub fn add_bytes_to_device(n: usize) {
    BYTES_TO_DEVICE.fetch_add(n as u64, Ordering::Relaxed);
}

pub fn add_bytes_to_client(n: usize) {
    BYTES_TO_CLIENT.fetch_add(n as u64, Ordering::Relaxed);
}

pub fn inc_com_port_acks() {
    COM_PORT_ACKS.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_skipped_commands() {
    SKIPPED_COMMANDS.fetch_add(1, Ordering::Relaxed);
}

/// Record one write that gave up with `dropped` bytes still unwritten.
pub fn record_backpressure_drop(dropped: usize) {
    BACKPRESSURE_DROPS.fetch_add(1, Ordering::Relaxed);
    DROPPED_BYTES.fetch_add(dropped as u64, Ordering::Relaxed);
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub connections: u64,
    pub bytes_to_device: u64,
    pub bytes_to_client: u64,
    pub com_port_acks: u64,
    pub skipped_commands: u64,
    pub backpressure_drops: u64,
    pub dropped_bytes: u64,
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        connections: CONNECTIONS.load(Ordering::Relaxed),
        bytes_to_device: BYTES_TO_DEVICE.load(Ordering::Relaxed),
        bytes_to_client: BYTES_TO_CLIENT.load(Ordering::Relaxed),
        com_port_acks: COM_PORT_ACKS.load(Ordering::Relaxed),
        skipped_commands: SKIPPED_COMMANDS.load(Ordering::Relaxed),
        backpressure_drops: BACKPRESSURE_DROPS.load(Ordering::Relaxed),
        dropped_bytes: DROPPED_BYTES.load(Ordering::Relaxed),
    }
}
