//! Occupancy cell model.
//!
//! A cell is one facility × day slot on the board. Placed tasks claim a
//! contiguous run of cells (a span); every cell of a span records the key of
//! the span's first cell so siblings can be found from any one of them.
//!
//! # Key Format
//! Keys serialise as `"{facility_id}-{day_ms}"`. Facility ids may contain
//! `-`, so the day is always taken from the last separator. A negative day
//! doubles the separator (`"F--86400000"`), which is why a facility id must
//! not end in `-`; see [`CellKey::is_valid_facility_id`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::BoardError;

/// Address of a facility × day slot.
///
/// Orders by facility, then day, so all cells of one facility are adjacent
/// in an ordered map.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellKey {
    /// Facility component.
    pub facility_id: String,
    /// Day timestamp (ms, UTC midnight).
    pub day: i64,
}

impl CellKey {
    /// Creates a key.
    pub fn new(facility_id: impl Into<String>, day: i64) -> Self {
        Self {
            facility_id: facility_id.into(),
            day,
        }
    }

    /// Whether keys on `facility_id` read back to the same facility.
    ///
    /// Empty ids and ids ending in `-` are ambiguous with a negative day.
    pub fn is_valid_facility_id(facility_id: &str) -> bool {
        !facility_id.is_empty() && !facility_id.ends_with('-')
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.facility_id, self.day)
    }
}

impl FromStr for CellKey {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || BoardError::InvariantViolation(format!("malformed cell key '{s}'"));
        let (head, tail) = s.rsplit_once('-').ok_or_else(malformed)?;
        let magnitude: i64 = tail.parse().map_err(|_| malformed())?;
        // "F--86400000" encodes a negative day
        let (facility, day) = match head.strip_suffix('-') {
            Some(f) if !f.is_empty() => (f, -magnitude),
            _ => (head, magnitude),
        };
        if facility.is_empty() {
            return Err(malformed());
        }
        Ok(Self::new(facility, day))
    }
}

impl Serialize for CellKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CellKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Role of a cell within its span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CellState {
    /// First day of the span (also the only cell of a one-day span).
    OccupiedStart,
    /// Interior day.
    Occupied,
    /// Last day of a span longer than one day.
    OccupiedEnd,
}

impl CellState {
    /// State of the cell at `offset` within a span of `len` cells.
    pub fn for_offset(offset: usize, len: usize) -> Self {
        if offset == 0 {
            Self::OccupiedStart
        } else if offset + 1 == len {
            Self::OccupiedEnd
        } else {
            Self::Occupied
        }
    }
}

/// What occupies a cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellRecord {
    /// Role within the span.
    pub state: CellState,
    /// Occupying task.
    pub task_id: String,
    /// Key of the span's first cell.
    pub source_key: CellKey,
}

impl CellRecord {
    /// Creates a record.
    pub fn new(state: CellState, task_id: impl Into<String>, source_key: CellKey) -> Self {
        Self {
            state,
            task_id: task_id.into(),
            source_key,
        }
    }

    /// Whether this is the first cell of its span.
    pub fn is_start(&self) -> bool {
        self.state == CellState::OccupiedStart
    }
}
