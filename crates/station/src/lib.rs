//! ground station wiring for the GPS relay
//!
//! One receiver task publishes decoded fixes; the paired-device transmitter,
//! the position logger and the display each poll the shared store on their
//! own cadence until the shutdown signal fires.

pub mod config;
pub mod display;
pub mod position_log;
pub mod simulation;
pub mod supervisor;

pub use config::{ConfigError, StationConfig, StationPlan};
pub use display::{DisplayConfig, DisplayConsumer, FixRenderer, LogRenderer};
pub use position_log::{LogError, PositionLogger, PositionLoggerConfig};
pub use simulation::{BeaconConfig, TrackerBeacon};
pub use supervisor::{run_station, StationError, StationReport, StationSettings};
