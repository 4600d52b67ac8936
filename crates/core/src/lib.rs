//! core data model and shared state for the GPS relay

pub mod decoder;
pub mod fix;
pub mod shutdown;
pub mod store;

pub use decoder::{decode_fix, DecodeError};
pub use fix::{Fix, Position, PositionKey, Validity, ValidityCode};
pub use shutdown::ShutdownSignal;
pub use store::FixStore;

/// Text sent or shown in place of a position when no valid fix is available.
pub const NO_VALID_LOCATION: &str = "No valid location";
