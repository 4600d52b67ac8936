//! Radio payload decoding
//!
//! Payloads are comma separated ASCII:
//!
//! ```text
//! callsign,time_of_fix,position_valid,latitude,N|S,longitude,E|W,fix_date
//! ```
//!
//! Older trackers send a short form, `callsign,V` or `callsign,time,V`, when
//! they have no fix. `position_valid` is either the RMC status letter `A`/`V`
//! or a GGA fix-quality digit; the form is inferred from the field itself.

use thiserror::Error;

use crate::fix::{Fix, Position, ValidityCode};

const FULL_FIELD_COUNT: usize = 8;

const CALLSIGN: usize = 0;
const TIME_OF_FIX: usize = 1;
const POSITION_VALID: usize = 2;
const LATITUDE: usize = 3;
const LATITUDE_NS: usize = 4;
const LONGITUDE: usize = 5;
const LONGITUDE_EW: usize = 6;
const FIX_DATE: usize = 7;

#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("payload is not valid UTF-8")]
    NotUtf8,

    #[error("unexpected field count {0}")]
    WrongFieldCount(usize),

    #[error("empty callsign")]
    EmptyCallsign,

    #[error("unrecognised validity field {0:?}")]
    InvalidValidity(String),

    #[error("short payload claims a valid fix but carries no position")]
    MissingPosition,

    #[error("malformed {field} field {value:?}")]
    InvalidField { field: &'static str, value: String },
}

fn invalid(field: &'static str, value: &str) -> DecodeError {
    DecodeError::InvalidField {
        field,
        value: value.to_string(),
    }
}

/// Decode one radio payload into a [`Fix`].
pub fn decode_fix(payload: &[u8]) -> Result<Fix, DecodeError> {
    let text = std::str::from_utf8(payload).map_err(|_| DecodeError::NotUtf8)?;
    let text = text.trim_end_matches(['\r', '\n', '\0', ' ']);
    let fields: Vec<&str> = text.split(',').map(str::trim).collect();

    let validity_index = match fields.len() {
        2 => 1,
        3 => 2,
        FULL_FIELD_COUNT => POSITION_VALID,
        n => return Err(DecodeError::WrongFieldCount(n)),
    };

    let callsign = fields[CALLSIGN];
    if callsign.is_empty() {
        return Err(DecodeError::EmptyCallsign);
    }

    let code = parse_validity(fields[validity_index])?;

    if !code.is_valid() {
        return Fix::not_valid(callsign, code).ok_or(DecodeError::MissingPosition);
    }

    if fields.len() != FULL_FIELD_COUNT {
        return Err(DecodeError::MissingPosition);
    }

    let position = Position {
        latitude: parse_coordinate(fields[LATITUDE], fields[LATITUDE_NS], Axis::Latitude)?,
        longitude: parse_coordinate(fields[LONGITUDE], fields[LONGITUDE_EW], Axis::Longitude)?,
        time_of_fix: parse_time(fields[TIME_OF_FIX])?,
        fix_date: parse_date(fields[FIX_DATE])?,
    };

    Fix::valid(callsign, code, position).ok_or(DecodeError::MissingPosition)
}

fn parse_validity(field: &str) -> Result<ValidityCode, DecodeError> {
    match field {
        "A" => Ok(ValidityCode::Status('A')),
        "V" => Ok(ValidityCode::Status('V')),
        digits if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => digits
            .parse::<u8>()
            .map(ValidityCode::Quality)
            .map_err(|_| DecodeError::InvalidValidity(field.to_string())),
        _ => Err(DecodeError::InvalidValidity(field.to_string())),
    }
}

#[derive(Clone, Copy)]
enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    fn degree_digits(self) -> usize {
        match self {
            Axis::Latitude => 2,
            Axis::Longitude => 3,
        }
    }

    fn max_degrees(self) -> f64 {
        match self {
            Axis::Latitude => 90.0,
            Axis::Longitude => 180.0,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Axis::Latitude => "latitude",
            Axis::Longitude => "longitude",
        }
    }

    fn hemisphere_sign(self, hemisphere: &str) -> Option<f64> {
        match (self, hemisphere) {
            (Axis::Latitude, "N") | (Axis::Longitude, "E") => Some(1.0),
            (Axis::Latitude, "S") | (Axis::Longitude, "W") => Some(-1.0),
            _ => None,
        }
    }
}

/// `DDmm.mmmm` / `DDDmm.mmmm` plus hemisphere into signed decimal degrees.
fn parse_coordinate(value: &str, hemisphere: &str, axis: Axis) -> Result<f64, DecodeError> {
    let split = axis.degree_digits();
    if !value.is_ascii() || value.len() < split + 2 {
        return Err(invalid(axis.name(), value));
    }

    let (degrees, minutes) = value.split_at(split);
    if !degrees.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(axis.name(), value));
    }
    if !is_plain_decimal(minutes) {
        return Err(invalid(axis.name(), value));
    }
    let degrees: f64 = degrees.parse().map_err(|_| invalid(axis.name(), value))?;
    let minutes: f64 = minutes.parse().map_err(|_| invalid(axis.name(), value))?;
    if !(0.0..60.0).contains(&minutes) {
        return Err(invalid(axis.name(), value));
    }

    let magnitude = degrees + minutes / 60.0;
    if magnitude > axis.max_degrees() {
        return Err(invalid(axis.name(), value));
    }

    let sign = axis
        .hemisphere_sign(hemisphere)
        .ok_or_else(|| invalid("hemisphere", hemisphere))?;
    Ok(sign * magnitude)
}

/// Digits with at most one decimal point; no sign or exponent.
fn is_plain_decimal(value: &str) -> bool {
    let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));
    !whole.is_empty()
        && whole.bytes().all(|b| b.is_ascii_digit())
        && fraction.bytes().all(|b| b.is_ascii_digit())
}

/// Checks for six leading digits and returns them.
fn six_digits<'a>(value: &'a str, field: &'static str) -> Result<&'a [u8], DecodeError> {
    let bytes = value.as_bytes();
    if bytes.len() < 6 || !bytes[..6].iter().all(u8::is_ascii_digit) {
        return Err(invalid(field, value));
    }
    Ok(&bytes[..6])
}

fn pair_values(digits: &[u8]) -> [u8; 3] {
    let value = |i: usize| (digits[i] - b'0') * 10 + (digits[i + 1] - b'0');
    [value(0), value(2), value(4)]
}

fn colon_pairs(digits: &[u8]) -> String {
    digits
        .chunks(2)
        .map(|pair| pair.iter().map(|&b| b as char).collect::<String>())
        .collect::<Vec<_>>()
        .join(":")
}

/// `HHMMSS[.sss]` into `HH:MM:SS`.
fn parse_time(value: &str) -> Result<String, DecodeError> {
    let digits = six_digits(value, "time")?;
    let fraction = &value[6..];
    if !fraction.is_empty()
        && !(fraction.starts_with('.') && fraction[1..].bytes().all(|b| b.is_ascii_digit()))
    {
        return Err(invalid("time", value));
    }
    let [hours, minutes, seconds] = pair_values(digits);
    if hours > 23 || minutes > 59 || seconds > 59 {
        return Err(invalid("time", value));
    }
    Ok(colon_pairs(digits))
}

/// `DDMMYY` into `DD:MM:YY`.
fn parse_date(value: &str) -> Result<String, DecodeError> {
    if value.len() != 6 {
        return Err(invalid("date", value));
    }
    let digits = six_digits(value, "date")?;
    let [day, month, _] = pair_values(digits);
    if !(1..=31).contains(&day) || !(1..=12).contains(&month) {
        return Err(invalid("date", value));
    }
    Ok(colon_pairs(digits))
}
