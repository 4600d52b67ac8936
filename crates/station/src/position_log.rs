//! Append-only history of changed positions

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gps_relay_core::{FixStore, Position, PositionKey, ShutdownSignal};
use log::{debug, info, warn};
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone)]
pub struct PositionLoggerConfig {
    pub path: PathBuf,
    pub tick_interval: Duration,
}

#[derive(Debug, Error)]
pub enum LogError {
    #[error("cannot prepare position log {path}: {source}")]
    Prepare {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutcome {
    NoFix,
    NotValid,
    Duplicate,
    Appended,
    WriteFailed,
}

/// `<fix_date> <time_of_fix> <longitude> <latitude>`, newline terminated.
pub fn format_entry(position: &Position) -> String {
    format!(
        "{} {} {:.6} {:.6}\n",
        position.fix_date, position.time_of_fix, position.longitude, position.latitude
    )
}

/// Each line is written with its own open/append/close so readers of the
/// file never see a half-flushed entry.
async fn append_line(path: &Path, line: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path).await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await
}

pub struct PositionLogger {
    store: FixStore,
    shutdown: ShutdownSignal,
    config: PositionLoggerConfig,
    last_key: Option<PositionKey>,
    lines_written: u64,
}

impl PositionLogger {
    /// Truncates the log file, starting a fresh session.
    pub async fn create(
        store: FixStore,
        shutdown: ShutdownSignal,
        config: PositionLoggerConfig,
    ) -> Result<Self, LogError> {
        File::create(&config.path)
            .await
            .map_err(|source| LogError::Prepare {
                path: config.path.clone(),
                source,
            })?;
        info!("Position log truncated: {}", config.path.display());

        Ok(Self {
            store,
            shutdown,
            config,
            last_key: None,
            lines_written: 0,
        })
    }

    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    pub async fn run(mut self) -> u64 {
        let shutdown = self.shutdown.clone();
        loop {
            if shutdown.is_triggered() {
                break;
            }
            self.tick().await;
            if shutdown.sleep(self.config.tick_interval).await {
                break;
            }
        }
        info!("Position logger stopped after {} entries", self.lines_written);
        self.lines_written
    }

    pub async fn tick(&mut self) -> LogOutcome {
        let Some(fix) = self.store.get().await else {
            return LogOutcome::NoFix;
        };
        let Some(position) = fix.position() else {
            debug!("Position indicator = {}", fix.validity().code());
            return LogOutcome::NotValid;
        };

        let key = position.key();
        if self.last_key == Some(key) {
            return LogOutcome::Duplicate;
        }

        let entry = format_entry(position);
        match append_line(&self.config.path, &entry).await {
            Ok(()) => {
                self.last_key = Some(key);
                self.lines_written += 1;
                debug!("Logged position {}", entry.trim_end());
                LogOutcome::Appended
            }
            Err(e) => {
                warn!(
                    "Failed to append to position log {}: {}",
                    self.config.path.display(),
                    e
                );
                LogOutcome::WriteFailed
            }
        }
    }
}
