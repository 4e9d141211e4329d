//! Projection of day-level occupancy into coarse views.
//!
//! # Algorithm
//!
//! 1. Take every `OccupiedStart` cell of the day grid.
//! 2. Find its bucket: the closest column start not after the cell's day.
//!    Cells outside the view are skipped.
//! 3. Group by `(facility, bucket)`. A task already listed in a bucket is
//!    not listed again.
//! 4. Size each entry: `width = day_width * span`, `left = day_width *
//!    days from bucket start to the task's first day`.
//!
//! Projecting into the month view (one day per bucket) gives `left = 0` and
//! `width = cell_width * span`, the same geometry the editable grid uses.
//!
//! # Complexity
//! O(n log c) for n cells and c columns.

use std::collections::BTreeMap;

use super::View;
use crate::grid::OccupancyGrid;
use crate::models::CellKey;
use crate::sizing::{day_width, left_offset};

/// A task drawn inside an aggregated bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedTask {
    /// Task shown.
    pub task_id: String,
    /// Day-level key of the task's first cell.
    pub source_key: CellKey,
    /// Number of day-cells in the source span.
    pub span_length: usize,
    /// Offset from the bucket's left edge (px).
    pub left: f64,
    /// Rendered width (px).
    pub width: f64,
}

/// Projected occupancy of a view, keyed by `facility × bucket_start`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectedGrid {
    cells: BTreeMap<CellKey, Vec<ProjectedTask>>,
}

impl ProjectedGrid {
    /// Tasks drawn in one bucket.
    pub fn get(&self, facility_id: &str, bucket_start: i64) -> &[ProjectedTask] {
        self.cells
            .get(&CellKey::new(facility_id, bucket_start))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Iterates non-empty buckets in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&CellKey, &[ProjectedTask])> {
        self.cells.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Number of non-empty buckets.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether nothing is drawn.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Total number of drawn task entries.
    pub fn task_count(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }

    /// Bucket key holding a task, if drawn.
    pub fn bucket_of(&self, task_id: &str) -> Option<&CellKey> {
        self.cells
            .iter()
            .find(|(_, tasks)| tasks.iter().any(|t| t.task_id == task_id))
            .map(|(k, _)| k)
    }
}

/// Projects a day-granular grid into `view`'s buckets.
pub fn project(grid: &OccupancyGrid, view: &View) -> ProjectedGrid {
    let days_per_bucket = view.kind.days_per_bucket();
    let unit = day_width(view.cell_width, days_per_bucket);
    let spans = grid.span_lengths();
    let mut cells: BTreeMap<CellKey, Vec<ProjectedTask>> = BTreeMap::new();

    for (key, record) in grid.iter().filter(|(_, r)| r.is_start()) {
        let Some(bucket_start) = view.bucket_start_for(key.day) else {
            continue;
        };
        let bucket = cells
            .entry(CellKey::new(key.facility_id.clone(), bucket_start))
            .or_default();
        if bucket.iter().any(|t| t.task_id == record.task_id) {
            continue;
        }
        let span_length = spans.get(&record.source_key).copied().unwrap_or(1);
        bucket.push(ProjectedTask {
            task_id: record.task_id.clone(),
            source_key: record.source_key.clone(),
            span_length,
            left: left_offset(key.day, bucket_start, view.cell_width, days_per_bucket),
            width: unit * span_length as f64,
        });
    }

    ProjectedGrid { cells }
}
