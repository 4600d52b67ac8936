//! Station configuration file

use std::path::{Path, PathBuf};
use std::time::Duration;

use gps_relay_paired::{TcpTransport, TransmitterConfig, TransportError};
use gps_relay_radio::{RadioConfig, ReceiverConfig};
use serde::Deserialize;
use thiserror::Error;

use crate::display::DisplayConfig;
use crate::position_log::PositionLoggerConfig;
use crate::simulation::BeaconConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

/// Tracker simulation used when no radio hardware is attached.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulatedRadioSettings {
    pub radio: RadioConfig,
    pub callsign: String,
    pub tracker_address: u8,
    pub station_address: u8,
    pub interval_ms: u64,
}

impl Default for SimulatedRadioSettings {
    fn default() -> Self {
        Self {
            radio: RadioConfig::default(),
            callsign: "KF4WBK".to_string(),
            tracker_address: 0x01,
            station_address: 0x02,
            interval_ms: 2000,
        }
    }
}

/// On-disk form. Every field is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub node_address: Option<u8>,
    pub receive_timeout_ms: u64,
    pub local_address: String,
    pub port: u16,
    pub accept_timeout_secs: u64,
    pub write_timeout_secs: u64,
    pub tick_interval_ms: u64,
    pub log_file: PathBuf,
    pub display_interval_ms: u64,
    pub simulated_radio: SimulatedRadioSettings,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            node_address: None,
            receive_timeout_ms: 1000,
            local_address: "0.0.0.0".to_string(),
            port: 4,
            accept_timeout_secs: 30,
            write_timeout_secs: 5,
            tick_interval_ms: 1000,
            log_file: PathBuf::from("position.log"),
            display_interval_ms: 1000,
            simulated_radio: SimulatedRadioSettings::default(),
        }
    }
}

/// Per-component settings, checked once before anything starts.
#[derive(Debug, Clone)]
pub struct StationPlan {
    pub receiver: ReceiverConfig,
    pub transport: TcpTransport,
    pub transmitter: TransmitterConfig,
    pub logger: PositionLoggerConfig,
    pub display: DisplayConfig,
    pub radio: RadioConfig,
    pub beacon: BeaconConfig,
}

fn non_zero(value: Duration, name: &'static str) -> Result<Duration, ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::ZeroDuration(name));
    }
    Ok(value)
}

impl StationConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Defaults when `path` is `None`.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<StationPlan, ConfigError> {
        let tick_interval =
            non_zero(Duration::from_millis(self.tick_interval_ms), "tick_interval_ms")?;
        let sim = &self.simulated_radio;

        Ok(StationPlan {
            receiver: ReceiverConfig {
                node_address: self.node_address,
                receive_timeout: non_zero(
                    Duration::from_millis(self.receive_timeout_ms),
                    "receive_timeout_ms",
                )?,
            },
            transport: TcpTransport::new(&self.local_address, self.port)?,
            transmitter: TransmitterConfig {
                accept_timeout: non_zero(
                    Duration::from_secs(self.accept_timeout_secs),
                    "accept_timeout_secs",
                )?,
                write_timeout: non_zero(
                    Duration::from_secs(self.write_timeout_secs),
                    "write_timeout_secs",
                )?,
                tick_interval,
            },
            logger: PositionLoggerConfig {
                path: self.log_file.clone(),
                tick_interval,
            },
            display: DisplayConfig {
                refresh_interval: non_zero(
                    Duration::from_millis(self.display_interval_ms),
                    "display_interval_ms",
                )?,
            },
            radio: sim.radio.clone(),
            beacon: BeaconConfig {
                callsign: sim.callsign.clone(),
                tracker_address: sim.tracker_address,
                station_address: self.node_address.unwrap_or(sim.station_address),
                interval: non_zero(
                    Duration::from_millis(sim.interval_ms),
                    "simulated_radio.interval_ms",
                )?,
                ack_timeout: Duration::from_millis(500),
            },
        })
    }
}
