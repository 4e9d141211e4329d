//! Day-granular occupancy grid.
//!
//! # Invariant
//! A task placed with span length `L` at day `D` on facility `F` owns exactly
//! `L` entries `F-D, F-(D+1d), …, F-(D+(L-1)d)`. The first is
//! `OccupiedStart`, the last `OccupiedEnd` (absent when `L == 1`), the rest
//! `Occupied`; all carry `source_key = F-D`.
//!
//! Day timestamps are used as given; callers pass the bucket starts of the
//! day view, which are UTC midnights.
//!
//! # Complexity
//! Point lookups and span writes are O(L log n). Facility-wide scans use
//! the key ordering (facility first) and touch only that facility's cells.

use std::collections::{BTreeMap, HashMap};
use std::ops::RangeInclusive;

use crate::config::{BoardConfig, ConflictPolicy};
use crate::error::{BoardError, Result};
use crate::models::{add_days, CellKey, CellRecord, CellState, Facility, Task, DAY_MS};
use crate::sizing::span_length;

/// Sparse map from facility × day to the occupying task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OccupancyGrid {
    cells: BTreeMap<CellKey, CellRecord>,
}

impl OccupancyGrid {
    /// Creates an empty grid.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a grid from raw cells.
    pub fn from_cells(cells: BTreeMap<CellKey, CellRecord>) -> Self {
        Self { cells }
    }

    /// Keys of a span of `len` days starting at `start_day`.
    pub fn span_keys(facility_id: &str, start_day: i64, len: usize) -> Vec<CellKey> {
        (0..len)
            .map(|i| CellKey::new(facility_id, add_days(start_day, i as i64)))
            .collect()
    }

    /// Computes the keys `task` would occupy on `facility` and checks them.
    ///
    /// Fails with `ZeroManpower` when no span can be computed, with
    /// `SpanTooLong` past the default span cap, and with `CellConflict` when
    /// a key is held by a different task. Does not mutate the grid.
    pub fn plan_span(&self, facility: &Facility, task: &Task, start_day: i64) -> Result<Vec<CellKey>> {
        self.plan_span_within(facility, task, start_day, BoardConfig::default().max_span())
    }

    /// [`plan_span`](Self::plan_span) with an explicit cap on the span length.
    pub fn plan_span_within(
        &self,
        facility: &Facility,
        task: &Task,
        start_day: i64,
        max_span: usize,
    ) -> Result<Vec<CellKey>> {
        let keys = checked_span(facility, task, start_day, max_span)?;
        if let Some((key, occupant)) = self.first_conflict(&keys, &task.id) {
            return Err(BoardError::CellConflict {
                key: key.clone(),
                occupant: occupant.to_string(),
                requested: task.id.clone(),
            });
        }
        Ok(keys)
    }

    /// Occupies the span for `task`, rejecting conflicts.
    ///
    /// Returns the written keys. On conflict nothing is written.
    pub fn occupy(&mut self, facility: &Facility, task: &Task, start_day: i64) -> Result<Vec<CellKey>> {
        self.occupy_with(facility, task, start_day, &BoardConfig::default())
    }

    /// Occupies the span for `task` under the configured conflict policy and
    /// span cap.
    pub fn occupy_with(
        &mut self,
        facility: &Facility,
        task: &Task,
        start_day: i64,
        config: &BoardConfig,
    ) -> Result<Vec<CellKey>> {
        let keys = match config.conflict_policy {
            ConflictPolicy::Reject => self.plan_span_within(facility, task, start_day, config.max_span())?,
            ConflictPolicy::Overwrite => checked_span(facility, task, start_day, config.max_span())?,
        };
        self.write_span(&task.id, &keys);
        tracing::debug!(
            facility_id = %facility.id,
            task_id = %task.id,
            start_day,
            span = keys.len(),
            "occupied span"
        );
        Ok(keys)
    }

    fn write_span(&mut self, task_id: &str, keys: &[CellKey]) {
        let Some(source) = keys.first() else {
            return;
        };
        for (i, key) in keys.iter().enumerate() {
            let record = CellRecord::new(CellState::for_offset(i, keys.len()), task_id, source.clone());
            self.cells.insert(key.clone(), record);
        }
    }

    /// Releases the span `task` occupies on `facility` from `start_day`.
    ///
    /// Deletes the cells held by `task` in the days [`occupy`](Self::occupy)
    /// would cover with the current duration and manpower. Idempotent: an
    /// empty span releases nothing and is not an error. Returns the number
    /// of removed cells.
    pub fn release(&mut self, facility: &Facility, task: &Task, start_day: i64) -> usize {
        let len = span_length(task.duration, facility.manpower) as i64;
        let end = start_day.saturating_add(len.saturating_mul(DAY_MS));
        let owned: Vec<CellKey> = self
            .cells
            .range(CellKey::new(&facility.id, start_day)..CellKey::new(&facility.id, end))
            .filter(|(_, r)| r.task_id == task.id)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &owned {
            self.cells.remove(key);
        }
        if owned.is_empty() {
            tracing::debug!(
                facility_id = %facility.id,
                task_id = %task.id,
                start_day,
                "release found no cells"
            );
        }
        owned.len()
    }

    /// Removes every sibling of the span whose first cell is `source_key`.
    pub fn release_source(&mut self, source_key: &CellKey) -> usize {
        self.remove_span(source_key, None)
    }

    /// Removes the cells `task_id` holds in the span that starts at
    /// `source_key`, however long that span was when it was written.
    pub fn release_span(&mut self, source_key: &CellKey, task_id: &str) -> usize {
        self.remove_span(source_key, Some(task_id))
    }

    fn remove_span(&mut self, source_key: &CellKey, task_id: Option<&str>) -> usize {
        let siblings: Vec<CellKey> = self
            .facility_cells(&source_key.facility_id)
            .filter(|(_, r)| r.source_key == *source_key && task_id.map_or(true, |id| r.task_id == id))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &siblings {
            self.cells.remove(key);
        }
        siblings.len()
    }

    /// Removes every cell of a task, wherever it is.
    pub fn release_task(&mut self, task_id: &str) -> usize {
        let before = self.cells.len();
        self.cells.retain(|_, r| r.task_id != task_id);
        before - self.cells.len()
    }

    /// Removes every cell on a facility. Returns the removed records.
    pub fn release_all(&mut self, facility_id: &str) -> Vec<(CellKey, CellRecord)> {
        let keys: Vec<CellKey> = self.facility_cells(facility_id).map(|(k, _)| k.clone()).collect();
        keys.into_iter()
            .filter_map(|k| self.cells.remove(&k).map(|r| (k, r)))
            .collect()
    }

    /// Point lookup.
    pub fn query(&self, facility_id: &str, day: i64) -> Option<&CellRecord> {
        self.cells.get(&CellKey::new(facility_id, day))
    }

    /// Lookup by key.
    pub fn get(&self, key: &CellKey) -> Option<&CellRecord> {
        self.cells.get(key)
    }

    /// All cells on a facility, in day order.
    pub fn facility_cells<'a>(
        &'a self,
        facility_id: &str,
    ) -> impl Iterator<Item = (&'a CellKey, &'a CellRecord)> + 'a {
        self.cells.range(facility_range(facility_id))
    }

    /// All cells of a task.
    pub fn task_cells<'a>(&'a self, task_id: &'a str) -> impl Iterator<Item = (&'a CellKey, &'a CellRecord)> + 'a {
        self.cells.iter().filter(move |(_, r)| r.task_id == task_id)
    }

    /// Number of cells in each span, keyed by source key.
    pub fn span_lengths(&self) -> HashMap<&CellKey, usize> {
        let mut lengths: HashMap<&CellKey, usize> = HashMap::new();
        for record in self.cells.values() {
            *lengths.entry(&record.source_key).or_insert(0) += 1;
        }
        lengths
    }

    /// Iterates all cells in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&CellKey, &CellRecord)> {
        self.cells.iter()
    }

    /// Raw cell map.
    pub fn cells(&self) -> &BTreeMap<CellKey, CellRecord> {
        &self.cells
    }

    /// Consumes the grid into its cell map.
    pub fn into_cells(self) -> BTreeMap<CellKey, CellRecord> {
        self.cells
    }

    /// Number of occupied cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether no cell is occupied.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn first_conflict<'a>(&'a self, keys: &'a [CellKey], task_id: &str) -> Option<(&'a CellKey, &'a str)> {
        keys.iter().find_map(|k| {
            self.cells
                .get(k)
                .filter(|r| r.task_id != task_id)
                .map(|r| (k, r.task_id.as_str()))
        })
    }
}

/// Span keys for `task` on `facility`, checked against the zero-manpower,
/// span-cap, and facility id rules before any key is built.
fn checked_span(facility: &Facility, task: &Task, start_day: i64, max_span: usize) -> Result<Vec<CellKey>> {
    if !CellKey::is_valid_facility_id(&facility.id) {
        return Err(BoardError::InvariantViolation(format!(
            "facility id '{}' cannot be encoded in a cell key",
            facility.id
        )));
    }
    let len = span_length(task.duration, facility.manpower);
    if len == 0 {
        return Err(BoardError::ZeroManpower(facility.id.clone()));
    }
    if len > max_span {
        return Err(BoardError::SpanTooLong {
            task_id: task.id.clone(),
            span: len,
            max: max_span,
        });
    }
    Ok(OccupancyGrid::span_keys(&facility.id, start_day, len))
}

fn facility_range(facility_id: &str) -> RangeInclusive<CellKey> {
    CellKey::new(facility_id, i64::MIN)..=CellKey::new(facility_id, i64::MAX)
}
