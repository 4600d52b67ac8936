//! Starts every component and waits for all of them

use gps_relay_core::{FixStore, ShutdownSignal};
use gps_relay_paired::{
    PairedDeviceTransmitter, PeerTransport, TransmitterConfig, TransmitterStats, TransportError,
};
use gps_relay_radio::{RadioLink, RadioReceiver, ReceiverConfig, ReceiverStats};
use log::{error, info};
use thiserror::Error;

use crate::display::{DisplayConfig, DisplayConsumer, FixRenderer};
use crate::position_log::{LogError, PositionLogger, PositionLoggerConfig};

#[derive(Debug, Error)]
pub enum StationError {
    #[error(transparent)]
    Log(#[from] LogError),

    #[error("paired device transport: {0}")]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone)]
pub struct StationSettings {
    pub receiver: ReceiverConfig,
    pub transmitter: TransmitterConfig,
    pub logger: PositionLoggerConfig,
    pub display: DisplayConfig,
}

/// What each component reported on exit. `None` means the task panicked.
#[derive(Debug, Default, Clone, Copy)]
pub struct StationReport {
    pub receiver: Option<ReceiverStats>,
    pub transmitter: Option<TransmitterStats>,
    pub positions_logged: Option<u64>,
}

/// Run receiver, transmitter, logger and display until `shutdown` fires.
///
/// A component that fails only stops itself; the others keep running. A
/// fatal transport error triggers shutdown and is returned once every task
/// has exited.
pub async fn run_station<L, T, R>(
    settings: StationSettings,
    link: L,
    transport: T,
    renderer: R,
    shutdown: ShutdownSignal,
) -> Result<StationReport, StationError>
where
    L: RadioLink + 'static,
    T: PeerTransport + 'static,
    R: FixRenderer + 'static,
{
    let store = FixStore::new();

    let logger = PositionLogger::create(store.clone(), shutdown.clone(), settings.logger).await?;
    let receiver = RadioReceiver::new(link, store.clone(), shutdown.clone(), settings.receiver);
    let transmitter = PairedDeviceTransmitter::new(
        transport,
        store.clone(),
        shutdown.clone(),
        settings.transmitter,
    );
    let display = DisplayConsumer::new(store.clone(), shutdown.clone(), settings.display, renderer)
        .with_link_state(transmitter.subscribe());

    let receiver_task = tokio::spawn(receiver.run());
    let transmitter_task = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let result = transmitter.run().await;
            if let Err(e) = &result {
                error!("Paired device transmitter failed: {}", e);
                shutdown.trigger();
            }
            result
        })
    };
    let logger_task = tokio::spawn(logger.run());
    let display_task = tokio::spawn(display.run());
    info!("Station running");

    let mut report = StationReport::default();
    let mut fatal = None;

    match receiver_task.await {
        Ok(stats) => report.receiver = Some(stats),
        Err(e) => error!("Radio receiver task failed: {}", e),
    }
    match transmitter_task.await {
        Ok(Ok(stats)) => report.transmitter = Some(stats),
        Ok(Err(e)) => fatal = Some(e),
        Err(e) => error!("Paired device task failed: {}", e),
    }
    match logger_task.await {
        Ok(lines) => report.positions_logged = Some(lines),
        Err(e) => error!("Position logger task failed: {}", e),
    }
    if let Err(e) = display_task.await {
        error!("Display task failed: {}", e);
    }

    info!("Station stopped: {:?}", report);
    match fatal {
        Some(e) => Err(e.into()),
        None => Ok(report),
    }
}
