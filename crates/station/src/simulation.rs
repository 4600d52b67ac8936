//! Simulated remote tracker for running the station without radio hardware

use std::time::Duration;

use gps_relay_core::ShutdownSignal;
use gps_relay_radio::{RadioHeader, RadioLink};
use log::{debug, info, trace, warn};

const START_LATITUDE: f64 = 35.955628;
const START_LONGITUDE: f64 = -79.019345;
const STEP_DEGREES: f64 = 0.0005;
const FIX_DATE: &str = "120923";
const START_SECONDS: u32 = 17 * 3600 + 12 * 60 + 7;

#[derive(Debug, Clone)]
pub struct BeaconConfig {
    pub callsign: String,
    pub tracker_address: u8,
    pub station_address: u8,
    pub interval: Duration,
    pub ack_timeout: Duration,
}

/// `DDmm.mmmm` (or `DDDmm.mmmm`) and hemisphere letter.
fn format_coordinate(
    value: f64,
    degree_digits: usize,
    positive: char,
    negative: char,
) -> (String, char) {
    let hemisphere = if value < 0.0 { negative } else { positive };
    let value = value.abs();
    let degrees = value.trunc();
    let minutes = (value - degrees) * 60.0;
    (
        format!("{:0width$}{:07.4}", degrees as u32, minutes, width = degree_digits),
        hemisphere,
    )
}

/// Payload in the current wire format, or the short no-fix form.
pub fn encode_payload(callsign: &str, seconds_of_day: u32, position: Option<(f64, f64)>) -> String {
    let Some((latitude, longitude)) = position else {
        return format!("{},V", callsign);
    };
    let (lat, ns) = format_coordinate(latitude, 2, 'N', 'S');
    let (lon, ew) = format_coordinate(longitude, 3, 'E', 'W');
    let seconds = seconds_of_day % 86_400;
    format!(
        "{},{:02}{:02}{:02}.000,A,{},{},{},{},{}",
        callsign,
        seconds / 3600,
        seconds / 60 % 60,
        seconds % 60,
        lat,
        ns,
        lon,
        ew,
        FIX_DATE
    )
}

/// Time of day, in seconds, of a report sent `elapsed` into the run.
pub fn report_seconds(elapsed: Duration) -> u32 {
    START_SECONDS + (elapsed.as_millis() / 1000) as u32
}

/// Track position for a given beacon step. The tracker holds each position
/// for three reports and loses its fix every tenth report.
pub fn track_position(step: u32) -> Option<(f64, f64)> {
    if step % 10 == 9 {
        return None;
    }
    let leg = (step / 3) as f64;
    Some((
        START_LATITUDE + leg * STEP_DEGREES,
        START_LONGITUDE + leg * STEP_DEGREES,
    ))
}

pub struct TrackerBeacon<L: RadioLink> {
    link: L,
    config: BeaconConfig,
    shutdown: ShutdownSignal,
    next_id: u8,
    step: u32,
    elapsed: Duration,
}

impl<L: RadioLink> TrackerBeacon<L> {
    pub fn new(link: L, config: BeaconConfig, shutdown: ShutdownSignal) -> Self {
        Self {
            link,
            config,
            shutdown,
            next_id: 0,
            step: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Send one report and wait briefly for its ack. Returns whether it was acked.
    pub async fn beacon_once(&mut self) -> bool {
        let payload = encode_payload(
            &self.config.callsign,
            report_seconds(self.elapsed),
            track_position(self.step),
        );
        self.step += 1;
        self.elapsed += self.config.interval;
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);

        let header =
            RadioHeader::data(self.config.station_address, self.config.tracker_address, id);
        trace!("Tracker sending {:?}: {}", header, payload);
        if let Err(e) = self.link.send(header, payload.as_bytes()).await {
            warn!("Tracker transmit failed: {}", e);
            return false;
        }

        let received = tokio::select! {
            _ = self.shutdown.cancelled() => return false,
            received = self.link.receive(self.config.ack_timeout) => received,
        };
        match received {
            Ok(Some(packet)) if packet.header.is_ack() && packet.header.id == id => {
                trace!("Tracker got ack for id {}", id);
                true
            }
            Ok(Some(packet)) => {
                debug!("Tracker ignoring unexpected frame {:?}", packet.header);
                false
            }
            Ok(None) => {
                debug!("Tracker saw no ack for id {}", id);
                false
            }
            Err(e) => {
                warn!("Tracker receive failed: {}", e);
                false
            }
        }
    }

    pub async fn run(mut self) {
        info!("Simulated tracker {} started", self.config.callsign);
        let shutdown = self.shutdown.clone();
        loop {
            if shutdown.is_triggered() {
                break;
            }
            self.beacon_once().await;
            if shutdown.sleep(self.config.interval).await {
                break;
            }
        }
        info!("Simulated tracker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gps_relay_core::decode_fix;
    use gps_relay_radio::{RadioConfig, SimulatedRadioLink};

    #[test]
    fn test_encode_matches_tracker_format() {
        let start = Some((START_LATITUDE, START_LONGITUDE));
        let payload = encode_payload("KF4WBK", START_SECONDS, start);
        assert_eq!(payload, "KF4WBK,171207.000,A,3557.3377,N,07901.1607,W,120923");
        assert_eq!(encode_payload("KF4WBK", 0, None), "KF4WBK,V");
    }

    #[test]
    fn test_track_repeats_and_drops_fix() {
        assert_eq!(track_position(0), track_position(2));
        assert_ne!(track_position(2), track_position(3));
        assert_eq!(track_position(9), None);

        for step in 0..20 {
            let payload = encode_payload("KF4WBK", START_SECONDS + step, track_position(step));
            let fix = decode_fix(payload.as_bytes()).unwrap();
            assert_eq!(fix.is_valid(), step % 10 != 9);
        }
    }

    #[test]
    fn test_report_time_advances_with_sub_second_interval() {
        let interval = Duration::from_millis(400);
        let times: Vec<u32> = (0..6)
            .map(|step| report_seconds(interval * step) - START_SECONDS)
            .collect();
        assert_eq!(times, vec![0, 0, 0, 1, 1, 2]);
        assert_eq!(report_seconds(Duration::from_secs(2) * 3), START_SECONDS + 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reports_carry_elapsed_time() {
        let (tracker, mut station) = SimulatedRadioLink::pair(RadioConfig::ideal());
        let config = BeaconConfig {
            callsign: "KF4WBK".to_string(),
            tracker_address: 1,
            station_address: 2,
            interval: Duration::from_millis(500),
            ack_timeout: Duration::from_millis(10),
        };
        let mut beacon = TrackerBeacon::new(tracker, config, ShutdownSignal::new());

        let mut times = Vec::new();
        for _ in 0..3 {
            assert!(!beacon.beacon_once().await);
            let packet = station.receive(Duration::from_millis(10)).await.unwrap().unwrap();
            let fix = decode_fix(&packet.payload).unwrap();
            times.push(fix.position().unwrap().time_of_fix.clone());
        }
        assert_eq!(times, vec!["17:12:07", "17:12:07", "17:12:08"]);
    }
}
