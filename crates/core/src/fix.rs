//! Decoded GPS fix types

use std::fmt;

use serde::{Deserialize, Serialize};

/// Raw validity field as it appeared on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidityCode {
    /// Legacy RMC style status letter, `A` (active) or `V` (void).
    Status(char),
    /// GGA style fix-quality indicator, `0` means no fix.
    Quality(u8),
}

impl ValidityCode {
    pub fn is_valid(self) -> bool {
        match self {
            ValidityCode::Status(c) => c == 'A',
            ValidityCode::Quality(q) => q != 0,
        }
    }
}

impl fmt::Display for ValidityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidityCode::Status(c) => write!(f, "{}", c),
            ValidityCode::Quality(q) => write!(f, "{}", q),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Validity {
    Valid(ValidityCode),
    NotValid(ValidityCode),
}

impl Validity {
    pub fn from_code(code: ValidityCode) -> Self {
        if code.is_valid() {
            Validity::Valid(code)
        } else {
            Validity::NotValid(code)
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Validity::Valid(_))
    }

    pub fn code(&self) -> ValidityCode {
        match self {
            Validity::Valid(code) | Validity::NotValid(code) => *code,
        }
    }
}

/// Position part of a fix, only present when the fix is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Signed decimal degrees, negative is south.
    pub latitude: f64,
    /// Signed decimal degrees, negative is west.
    pub longitude: f64,
    /// `HH:MM:SS`
    pub time_of_fix: String,
    /// `DD:MM:YY`
    pub fix_date: String,
}

impl Position {
    pub fn key(&self) -> PositionKey {
        PositionKey::new(self.latitude, self.longitude)
    }
}

/// Lat/long pair quantized to micro-degrees, used to detect repeated positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PositionKey {
    lat_micro: i64,
    lon_micro: i64,
}

impl PositionKey {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            lat_micro: (latitude * 1e6).round() as i64,
            lon_micro: (longitude * 1e6).round() as i64,
        }
    }
}

/// One GPS sample relayed from the remote tracker.
///
/// A fix either carries a full position and is valid, or carries only the
/// callsign and the validity code. Construct through [`Fix::valid`] or
/// [`Fix::not_valid`] so the two can't be mixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    callsign: String,
    validity: Validity,
    position: Option<Position>,
}

impl Fix {
    /// Returns `None` if `code` does not indicate a valid fix.
    pub fn valid(
        callsign: impl Into<String>,
        code: ValidityCode,
        position: Position,
    ) -> Option<Self> {
        if !code.is_valid() {
            return None;
        }
        Some(Self {
            callsign: callsign.into(),
            validity: Validity::Valid(code),
            position: Some(position),
        })
    }

    /// Returns `None` if `code` indicates a valid fix.
    pub fn not_valid(callsign: impl Into<String>, code: ValidityCode) -> Option<Self> {
        if code.is_valid() {
            return None;
        }
        Some(Self {
            callsign: callsign.into(),
            validity: Validity::NotValid(code),
            position: None,
        })
    }

    pub fn callsign(&self) -> &str {
        &self.callsign
    }

    pub fn validity(&self) -> Validity {
        self.validity
    }

    pub fn is_valid(&self) -> bool {
        self.validity.is_valid()
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }
}
