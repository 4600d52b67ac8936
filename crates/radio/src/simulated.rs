//! Simulated radio link for testing and hardware-free runs

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, trace};
use rand::Rng;
use tokio::sync::{mpsc, Mutex};
use tokio::time::sleep;

use crate::{RadioConfig, RadioError, RadioHeader, RadioLink, RadioPacket, HEADER_LEN};

const CHANNEL_DEPTH: usize = 64;

/// One end of an in-process radio channel.
///
/// [`SimulatedRadioLink::pair`] returns two connected ends; frames sent on
/// one are received on the other after the configured airtime and latency,
/// and may be dropped according to `packet_loss`.
pub struct SimulatedRadioLink {
    config: RadioConfig,
    outbound: mpsc::Sender<Bytes>,
    inbound: mpsc::Receiver<Bytes>,
    stats: Arc<Mutex<LinkStats>>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LinkStats {
    pub frames_sent: u64,
    pub frames_dropped: u64,
    pub frames_received: u64,
    pub bytes_sent: u64,
}

impl SimulatedRadioLink {
    pub fn pair(config: RadioConfig) -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::channel(CHANNEL_DEPTH);
        let (b_tx, b_rx) = mpsc::channel(CHANNEL_DEPTH);
        let a = Self {
            config: config.clone(),
            outbound: b_tx,
            inbound: a_rx,
            stats: Arc::new(Mutex::new(LinkStats::default())),
        };
        let b = Self {
            config,
            outbound: a_tx,
            inbound: b_rx,
            stats: Arc::new(Mutex::new(LinkStats::default())),
        };
        (a, b)
    }

    /// Returns whether the frame survived the channel.
    async fn simulate_channel(&self, frame_len: usize) -> Result<bool, RadioError> {
        if frame_len > self.config.mtu {
            return Err(RadioError::PacketTooLarge);
        }

        if self.config.bandwidth_bps > 0 {
            let airtime = Duration::from_secs_f64(
                (frame_len * 8) as f64 / self.config.bandwidth_bps as f64,
            );
            sleep(airtime).await;
        }
        if !self.config.latency.is_zero() {
            sleep(self.config.latency).await;
        }

        let drop_frame = {
            let mut rng = rand::rng();
            self.config.packet_loss > 0.0 && rng.random::<f32>() < self.config.packet_loss
        };

        let mut stats = self.stats.lock().await;
        if drop_frame {
            stats.frames_dropped += 1;
            debug!("Simulated frame loss");
            return Ok(false);
        }
        stats.frames_sent += 1;
        stats.bytes_sent += frame_len as u64;
        Ok(true)
    }

    pub async fn get_stats(&self) -> LinkStats {
        *self.stats.lock().await
    }
}

#[async_trait]
impl RadioLink for SimulatedRadioLink {
    async fn receive(&mut self, timeout: Duration) -> Result<Option<RadioPacket>, RadioError> {
        let frame = match tokio::time::timeout(timeout, self.inbound.recv()).await {
            Err(_) => return Ok(None),
            Ok(None) => return Err(RadioError::LinkClosed),
            Ok(Some(frame)) => frame,
        };

        let (header, _) = RadioHeader::split_frame(&frame)?;
        self.stats.lock().await.frames_received += 1;
        trace!("Simulated radio received {} bytes", frame.len());

        Ok(Some(RadioPacket {
            header,
            payload: frame.slice(HEADER_LEN..),
        }))
    }

    async fn send(&mut self, header: RadioHeader, payload: &[u8]) -> Result<(), RadioError> {
        let frame = Bytes::from(header.encode_frame(payload));
        trace!("Simulating radio transmission of {} bytes", frame.len());

        if !self.simulate_channel(frame.len()).await? {
            return Ok(());
        }

        self.outbound
            .send(frame)
            .await
            .map_err(|_| RadioError::LinkClosed)
    }
}
