//! packet radio layer for the GPS relay

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod header;
pub mod receiver;
pub mod simulated;

pub use header::{RadioHeader, BROADCAST_ADDRESS, FLAG_ACK, FLAG_DATA, HEADER_LEN};
pub use receiver::{PacketOutcome, RadioReceiver, ReceiverConfig, ReceiverStats, ShutdownButton};
pub use simulated::SimulatedRadioLink;

#[derive(Debug, Error)]
pub enum RadioError {
    #[error("Packet too large for radio MTU")]
    PacketTooLarge,

    #[error("Radio transmission failed")]
    TransmissionFailed,

    #[error("Frame shorter than radio header ({0} bytes)")]
    FrameTooShort(usize),

    #[error("Radio link closed")]
    LinkClosed,
}

/// One frame as handed up by the radio driver.
#[derive(Debug, Clone, PartialEq)]
pub struct RadioPacket {
    pub header: RadioHeader,
    pub payload: Bytes,
}

/// Boundary to the packet radio driver.
///
/// Both calls may block on the hardware; `receive` must give up after
/// `timeout` and return `Ok(None)` so callers can observe shutdown.
#[async_trait]
pub trait RadioLink: Send {
    async fn receive(&mut self, timeout: Duration) -> Result<Option<RadioPacket>, RadioError>;

    async fn send(&mut self, header: RadioHeader, payload: &[u8]) -> Result<(), RadioError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadioConfig {
    pub mtu: usize,
    /// Zero means the channel is not rate limited.
    pub bandwidth_bps: u32,
    pub packet_loss: f32,
    pub latency: Duration,
}

impl RadioConfig {
    /// Lossless, zero latency channel.
    pub fn ideal() -> Self {
        Self {
            mtu: 60,
            bandwidth_bps: 0,
            packet_loss: 0.0,
            latency: Duration::ZERO,
        }
    }
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            mtu: 60,
            bandwidth_bps: 4800,
            packet_loss: 0.05,
            latency: Duration::from_millis(20),
        }
    }
}
