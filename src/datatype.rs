// used for persistence
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

// used for timestamps in the database
use chrono::{Duration, NaiveDateTime, Timelike, Utc};

// used to print out readable forms of a data type
use std::fmt;

use crate::error::{ParkingError, Result};

pub const DEFAULT_SPACE_KIND: &str = "car";

// ------------- Space status -------------
#[derive(Eq, PartialEq, Hash, Clone, Copy, Debug)]
pub enum SpaceStatus {
    Free,
    Occupied,
}
impl SpaceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpaceStatus::Free => "FREE",
            SpaceStatus::Occupied => "OCCUPIED",
        }
    }
}
impl fmt::Display for SpaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
impl ToSql for SpaceStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}
impl FromSql for SpaceStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "FREE" => Ok(SpaceStatus::Free),
            "OCCUPIED" => Ok(SpaceStatus::Occupied),
            other => Err(FromSqlError::Other(
                format!("unknown space status '{other}'").into(),
            )),
        }
    }
}

// ------------- Timestamp -------------
// Fixed width so that text ordering in SQL equals chronological ordering.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// A UTC instant with microsecond precision.
#[derive(Eq, PartialEq, PartialOrd, Ord, Debug, Hash, Clone, Copy)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    pub fn now() -> Timestamp {
        Timestamp::from(Utc::now().naive_utc())
    }
    pub fn parse(s: &str) -> Option<Timestamp> {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
            .ok()
            .map(Timestamp::from)
    }
    /// Clamps to `earliest` so a stepped-back clock cannot produce an exit before its entry.
    pub fn not_before(self, earliest: Timestamp) -> Timestamp {
        self.max(earliest)
    }
    pub fn since(&self, earlier: &Timestamp) -> Duration {
        self.0 - earlier.0
    }
    pub fn naive_utc(&self) -> NaiveDateTime {
        self.0
    }
}
impl From<NaiveDateTime> for Timestamp {
    fn from(moment: NaiveDateTime) -> Self {
        // stored text keeps six fractional digits, so drop anything finer
        let micros = moment.nanosecond() / 1_000 * 1_000;
        Timestamp(moment.with_nanosecond(micros).unwrap_or(moment))
    }
}
impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}
impl ToSql for Timestamp {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}
impl FromSql for Timestamp {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        Timestamp::parse(text)
            .ok_or_else(|| FromSqlError::Other(format!("malformed timestamp '{text}'").into()))
    }
}

// ------------- Input normalization -------------
/// Plates are compared and stored trimmed and in upper case.
pub fn normalize_plate(plate: &str) -> Result<String> {
    let plate = plate.trim();
    if plate.is_empty() {
        return Err(ParkingError::Validation(
            "license plate is required".to_string(),
        ));
    }
    Ok(plate.to_uppercase())
}

pub fn normalize_kind(kind: &str) -> String {
    match kind.trim() {
        "" => DEFAULT_SPACE_KIND.to_string(),
        kind => kind.to_string(),
    }
}

pub fn normalize_optional(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

pub fn validate_space_number(number: i64) -> Result<i64> {
    if number <= 0 {
        return Err(ParkingError::Validation(format!(
            "space number must be positive, got {number}"
        )));
    }
    Ok(number)
}
