use serde::{Deserialize, Serialize};

use crate::RadioError;

pub const HEADER_LEN: usize = 4;

pub const FLAG_DATA: u8 = 0x00;
pub const FLAG_ACK: u8 = 0x80;

pub const BROADCAST_ADDRESS: u8 = 0xFF;

/// Four byte header prefixed to every radio frame: `[dest, src, id, flags]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioHeader {
    pub destination: u8,
    pub source: u8,
    /// Sequence byte chosen by the sender, echoed in the ack.
    pub id: u8,
    pub flags: u8,
}

impl RadioHeader {
    pub fn data(destination: u8, source: u8, id: u8) -> Self {
        Self {
            destination,
            source,
            id,
            flags: FLAG_DATA,
        }
    }

    pub fn from_bytes(bytes: [u8; HEADER_LEN]) -> Self {
        Self {
            destination: bytes[0],
            source: bytes[1],
            id: bytes[2],
            flags: bytes[3],
        }
    }

    pub fn to_bytes(self) -> [u8; HEADER_LEN] {
        [self.destination, self.source, self.id, self.flags]
    }

    pub fn is_ack(&self) -> bool {
        self.flags & FLAG_ACK != 0
    }

    /// Header acknowledging this frame: addresses swapped, id echoed.
    pub fn ack(&self) -> Self {
        Self {
            destination: self.source,
            source: self.destination,
            id: self.id,
            flags: FLAG_ACK,
        }
    }

    /// Whether a receiver at `address` should accept this frame.
    pub fn addressed_to(&self, address: u8) -> bool {
        self.destination == address || self.destination == BROADCAST_ADDRESS
    }

    /// Split a raw frame into header and payload.
    pub fn split_frame(frame: &[u8]) -> Result<(Self, &[u8]), RadioError> {
        if frame.len() < HEADER_LEN {
            return Err(RadioError::FrameTooShort(frame.len()));
        }
        let (header, payload) = frame.split_at(HEADER_LEN);
        let header = Self::from_bytes([header[0], header[1], header[2], header[3]]);
        Ok((header, payload))
    }

    pub fn encode_frame(self, payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
        frame.extend_from_slice(&self.to_bytes());
        frame.extend_from_slice(payload);
        frame
    }
}
