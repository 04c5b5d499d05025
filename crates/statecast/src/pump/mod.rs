//! Paired-thread pumps driving each side of the protocol: the maker ticks a
//! simulation and broadcasts its snapshots, the takers reassemble and hand
//! them to the host.

mod maker;
mod taker;

pub use maker::Maker;
pub use taker::{ManualTaker, Taker};

use std::net::IpAddr;
use std::time::Duration;

use crate::net::protocol::{
    CastError, DEFAULT_PACKET_SIZE, DEFAULT_PORT, DEFAULT_QUEUE_CAPACITY, DEFAULT_RECV_TIMEOUT_MS,
    HEADER_SIZE,
};

/// Construction-time parameters shared by both pump sides. The packet size
/// and port must match between maker and takers; the serialized state size is
/// fixed for the lifetime of a session.
#[derive(Debug, Clone)]
pub struct Config {
    /// Broadcast target for the maker side.
    pub addr: IpAddr,
    pub port: u16,
    /// Datagram byte budget, header included.
    pub packet_size: usize,
    /// Seconds per simulation update; zero or negative runs the update
    /// flat-out on a tight loop.
    pub tick_period: f32,
    /// Handoff queue capacity between the two threads of a pump.
    pub queue_capacity: usize,
    /// Upper bound on one blocking receive attempt.
    pub recv_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: IpAddr::from([127, 0, 0, 1]),
            port: DEFAULT_PORT,
            packet_size: DEFAULT_PACKET_SIZE,
            tick_period: 1.0 / 60.0,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            recv_timeout: Duration::from_millis(DEFAULT_RECV_TIMEOUT_MS),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), CastError> {
        if self.packet_size <= HEADER_SIZE {
            return Err(CastError::PacketTooSmall(self.packet_size));
        }
        Ok(())
    }
}
