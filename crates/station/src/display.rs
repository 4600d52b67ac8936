//! Local display consumer

use std::time::Duration;

use gps_relay_core::{Fix, FixStore, ShutdownSignal, NO_VALID_LOCATION};
use gps_relay_paired::ConnectionState;
use log::info;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct DisplayConfig {
    pub refresh_interval: Duration,
}

/// Boundary to the display driver.
pub trait FixRenderer: Send {
    fn render(&mut self, lines: &[String]);
}

/// Renders screens through the log, only when the text changes.
#[derive(Debug, Default)]
pub struct LogRenderer {
    last: Vec<String>,
}

impl FixRenderer for LogRenderer {
    fn render(&mut self, lines: &[String]) {
        if self.last == lines {
            return;
        }
        info!("[display] {}", lines.join(" | "));
        self.last = lines.to_vec();
    }
}

/// Signed degrees as `D°M.MMMM'`.
pub fn degrees_minutes(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let value = value.abs();
    let degrees = value.trunc();
    let minutes = (value - degrees) * 60.0;
    format!("{}{}\u{00b0}{:.4}'", sign, degrees as u32, minutes)
}

/// Text lines for one screen.
pub fn screen_lines(fix: Option<&Fix>, link: Option<ConnectionState>) -> Vec<String> {
    let mut lines = Vec::with_capacity(4);
    match fix {
        Some(fix) => lines.push(fix.callsign().to_string()),
        None => lines.push("RasPi Radio Remote location".to_string()),
    }

    match fix.and_then(Fix::position) {
        Some(position) => {
            lines.push(format!("lat = {}", degrees_minutes(position.latitude)));
            lines.push(format!("lon = {}", degrees_minutes(position.longitude)));
            lines.push(format!("{} {}", position.fix_date, position.time_of_fix));
        }
        None => lines.push(NO_VALID_LOCATION.to_string()),
    }

    if let Some(link) = link {
        lines.push(format!("paired: {:?}", link));
    }
    lines
}

pub struct DisplayConsumer<R: FixRenderer> {
    store: FixStore,
    shutdown: ShutdownSignal,
    config: DisplayConfig,
    renderer: R,
    link_state: Option<watch::Receiver<ConnectionState>>,
}

impl<R: FixRenderer> DisplayConsumer<R> {
    pub fn new(
        store: FixStore,
        shutdown: ShutdownSignal,
        config: DisplayConfig,
        renderer: R,
    ) -> Self {
        Self {
            store,
            shutdown,
            config,
            renderer,
            link_state: None,
        }
    }

    /// Also show the paired device link state.
    pub fn with_link_state(mut self, link_state: watch::Receiver<ConnectionState>) -> Self {
        self.link_state = Some(link_state);
        self
    }

    pub async fn refresh(&mut self) {
        let fix = self.store.get().await;
        let link = self.link_state.as_ref().map(|state| *state.borrow());
        let lines = screen_lines(fix.as_ref(), link);
        self.renderer.render(&lines);
    }

    pub async fn run(mut self) -> R {
        let shutdown = self.shutdown.clone();
        loop {
            if shutdown.is_triggered() {
                break;
            }
            self.refresh().await;
            if shutdown.sleep(self.config.refresh_interval).await {
                break;
            }
        }
        self.renderer
    }
}
