use std::io;

use bytes::BytesMut;
use gps_relay_core::{Fix, NO_VALID_LOCATION};
use tokio_util::codec::Encoder;

/// Separator between fields of one line.
pub const LINE_DELIMITER: char = ',';

const LINE_TERMINATOR: &str = "\r\n";

/// Text sent to the paired device for one tick, without the terminator.
///
/// `callsign,DD:MM:YY,HH:MM:SS,latitude,longitude` for a valid fix, the
/// sentinel text otherwise.
pub fn format_line(fix: Option<&Fix>) -> String {
    let Some(position) = fix.and_then(Fix::position) else {
        return NO_VALID_LOCATION.to_string();
    };
    let callsign = fix.map(Fix::callsign).unwrap_or_default();

    [
        callsign.to_string(),
        position.fix_date.clone(),
        position.time_of_fix.clone(),
        format!("{:.6}", position.latitude),
        format!("{:.6}", position.longitude),
    ]
    .join(&LINE_DELIMITER.to_string())
}

/// Encodes the latest fix as one CRLF terminated line.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixLineCodec;

impl Encoder<Option<Fix>> for FixLineCodec {
    type Error = io::Error;

    fn encode(&mut self, fix: Option<Fix>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let line = format_line(fix.as_ref());
        dst.reserve(line.len() + LINE_TERMINATOR.len());
        dst.extend_from_slice(line.as_bytes());
        dst.extend_from_slice(LINE_TERMINATOR.as_bytes());
        Ok(())
    }
}
