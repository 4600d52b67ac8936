use std::path::PathBuf;

use anyhow::{Context, Result};
use gps_relay_core::ShutdownSignal;
use gps_relay_radio::SimulatedRadioLink;
use gps_relay_station::{run_station, LogRenderer, StationConfig, StationSettings, TrackerBeacon};
use log::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = StationConfig::load_or_default(config_path.as_deref())
        .context("loading station config")?;
    let plan = config.validate().context("invalid station config")?;
    info!("Station config: {:?}", plan);

    let shutdown = ShutdownSignal::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => shutdown.trigger(),
                Err(e) => error!("Cannot listen for ctrl-c: {}", e),
            }
        });
    }

    let (station_link, tracker_link) = SimulatedRadioLink::pair(plan.radio.clone());
    let beacon = TrackerBeacon::new(tracker_link, plan.beacon.clone(), shutdown.clone());
    let beacon_task = tokio::spawn(beacon.run());

    let settings = StationSettings {
        receiver: plan.receiver,
        transmitter: plan.transmitter,
        logger: plan.logger,
        display: plan.display,
    };
    let result = run_station(
        settings,
        station_link,
        plan.transport,
        LogRenderer::default(),
        shutdown.clone(),
    )
    .await;

    shutdown.trigger();
    if let Err(e) = beacon_task.await {
        error!("Tracker simulation failed: {}", e);
    }

    let report = result.context("station stopped on a fatal error")?;
    info!("Final report: {:?}", report);
    Ok(())
}
