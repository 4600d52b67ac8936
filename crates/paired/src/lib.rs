//! paired-device feed for the GPS relay
//!
//! The paired device (a phone on a short-range serial link) connects to a
//! listening endpoint and receives one text line per tick describing the
//! latest fix. The transmitter rebinds and waits for a new peer whenever
//! the link drops.

pub mod codec;
pub mod error;
pub mod transmitter;
pub mod transport;

pub use codec::{format_line, FixLineCodec, LINE_DELIMITER};
pub use error::{Severity, TransportError};
pub use transmitter::{
    ConnectionState, PairedDeviceTransmitter, StepOutcome, TransmitterConfig, TransmitterStats,
};
pub use transport::{PeerListener, PeerTransport, TcpPeerListener, TcpTransport};
