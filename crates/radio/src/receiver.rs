//! Radio receive loop: decode, publish, acknowledge

use std::time::Duration;

use gps_relay_core::{decode_fix, FixStore, ShutdownSignal};
use log::{debug, error, info, warn};

use crate::{RadioError, RadioLink, RadioPacket};

/// Payload carried by acknowledgement frames.
pub const ACK_PAYLOAD: &[u8] = b"a";

#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// When set, frames addressed elsewhere are ignored.
    pub node_address: Option<u8>,
    /// Upper bound on one blocking receive call.
    pub receive_timeout: Duration,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            node_address: None,
            receive_timeout: Duration::from_secs(1),
        }
    }
}

/// Physical shutdown input read by the receiver once per iteration.
pub trait ShutdownButton: Send {
    fn is_pressed(&mut self) -> bool;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReceiverStats {
    pub packets_received: u64,
    pub packets_malformed: u64,
    pub packets_filtered: u64,
    pub acks_sent: u64,
    pub ack_failures: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketOutcome {
    /// Receive timed out without a frame.
    Idle,
    /// Frame carried an ack or was addressed to another node.
    Ignored,
    /// Payload could not be decoded; store untouched.
    Malformed,
    /// Fix stored. `acked` is whether an acknowledgement went out.
    Published { valid: bool, acked: bool },
}

/// Sole writer of the shared [`FixStore`].
pub struct RadioReceiver<L: RadioLink> {
    link: L,
    store: FixStore,
    shutdown: ShutdownSignal,
    config: ReceiverConfig,
    button: Option<Box<dyn ShutdownButton>>,
    stats: ReceiverStats,
}

impl<L: RadioLink> RadioReceiver<L> {
    pub fn new(link: L, store: FixStore, shutdown: ShutdownSignal, config: ReceiverConfig) -> Self {
        Self {
            link,
            store,
            shutdown,
            config,
            button: None,
            stats: ReceiverStats::default(),
        }
    }

    pub fn with_button(mut self, button: Box<dyn ShutdownButton>) -> Self {
        self.button = Some(button);
        self
    }

    pub fn stats(&self) -> ReceiverStats {
        self.stats
    }

    /// Run until shutdown or until the link goes away.
    pub async fn run(mut self) -> ReceiverStats {
        info!("Radio receiver started with config: {:?}", self.config);
        let shutdown = self.shutdown.clone();

        loop {
            if shutdown.is_triggered() {
                break;
            }
            if let Some(button) = self.button.as_mut() {
                if button.is_pressed() {
                    info!("Shutdown button pressed");
                    shutdown.trigger();
                    break;
                }
            }

            // Only the wait for a frame is cancellable; a received frame is
            // decoded, published and acked before shutdown is looked at again.
            let received = tokio::select! {
                _ = shutdown.cancelled() => break,
                received = self.link.receive(self.config.receive_timeout) => received,
            };
            let result = match received {
                Ok(Some(packet)) => Ok(self.handle_packet(packet).await),
                Ok(None) => Ok(PacketOutcome::Idle),
                Err(e) => Err(e),
            };

            match result {
                Ok(_) => {}
                Err(RadioError::LinkClosed) => {
                    error!("Radio link closed, receiver stopping");
                    break;
                }
                Err(e) => {
                    warn!("Radio receive failed: {}", e);
                    if shutdown.sleep(self.config.receive_timeout).await {
                        break;
                    }
                }
            }
        }

        info!("Radio receiver stopped: {:?}", self.stats);
        self.stats
    }

    /// Wait for at most one frame and process it.
    pub async fn poll_once(&mut self) -> Result<PacketOutcome, RadioError> {
        match self.link.receive(self.config.receive_timeout).await? {
            None => Ok(PacketOutcome::Idle),
            Some(packet) => Ok(self.handle_packet(packet).await),
        }
    }

    pub async fn handle_packet(&mut self, packet: RadioPacket) -> PacketOutcome {
        let header = packet.header;
        self.stats.packets_received += 1;

        if header.is_ack() {
            debug!("Ignoring ack frame {:?}", header);
            self.stats.packets_filtered += 1;
            return PacketOutcome::Ignored;
        }
        if let Some(address) = self.config.node_address {
            if !header.addressed_to(address) {
                debug!("Ignoring frame for node {:#04x}", header.destination);
                self.stats.packets_filtered += 1;
                return PacketOutcome::Ignored;
            }
        }

        let fix = match decode_fix(&packet.payload) {
            Ok(fix) => fix,
            Err(e) => {
                warn!(
                    "Dropping malformed packet from {:#04x} id {}: {} ({:?})",
                    header.source,
                    header.id,
                    e,
                    String::from_utf8_lossy(&packet.payload)
                );
                self.stats.packets_malformed += 1;
                return PacketOutcome::Malformed;
            }
        };

        let valid = fix.is_valid();
        debug!("Decoded fix from {:#04x}: {:?}", header.source, fix);
        self.store.set(fix).await;

        if !valid {
            return PacketOutcome::Published { valid, acked: false };
        }

        let acked = match self.link.send(header.ack(), ACK_PAYLOAD).await {
            Ok(()) => {
                self.stats.acks_sent += 1;
                true
            }
            Err(e) => {
                warn!("Failed to ack packet id {} from {:#04x}: {}", header.id, header.source, e);
                self.stats.ack_failures += 1;
                false
            }
        };
        PacketOutcome::Published { valid, acked }
    }
}
