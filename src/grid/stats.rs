//! Board load metrics.
//!
//! Summarises how full the board is over a time window.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Occupied days | Cells on a facility inside the window |
//! | Utilization | occupied days / window days |
//! | Avg Utilization | Mean over all listed facilities |
//! | Placed / Unplaced | Tasks on the timeline vs. in the side tray |

use std::collections::HashMap;

use super::OccupancyGrid;
use crate::models::{Facility, Task, TimeWindow};

/// Load of a single facility within a window.
#[derive(Debug, Clone, PartialEq)]
pub struct FacilityLoad {
    /// Occupied cells inside the window.
    pub occupied_days: usize,
    /// Fraction of window days occupied (0.0..1.0).
    pub utilization: f64,
}

/// Board performance indicators.
#[derive(Debug, Clone)]
pub struct BoardKpi {
    /// Window the metrics cover.
    pub window: TimeWindow,
    /// Per-facility load.
    pub load_by_facility: HashMap<String, FacilityLoad>,
    /// Average facility utilization (0.0..1.0).
    pub avg_utilization: f64,
    /// Tasks on the timeline.
    pub placed_tasks: usize,
    /// Tasks in the side tray.
    pub unplaced_tasks: usize,
}

impl BoardKpi {
    /// Computes metrics for `facilities` over `window`.
    ///
    /// Facilities with no cells count as zero load.
    pub fn calculate(
        grid: &OccupancyGrid,
        facilities: &[Facility],
        tasks: &[Task],
        window: TimeWindow,
    ) -> Self {
        let window_days = window.day_count();
        let mut load_by_facility = HashMap::new();

        for facility in facilities {
            let occupied_days = grid
                .facility_cells(&facility.id)
                .filter(|(k, _)| window.contains(k.day))
                .count();
            let utilization = if window_days == 0 {
                0.0
            } else {
                occupied_days as f64 / window_days as f64
            };
            load_by_facility.insert(
                facility.id.clone(),
                FacilityLoad {
                    occupied_days,
                    utilization,
                },
            );
        }

        let avg_utilization = if load_by_facility.is_empty() {
            0.0
        } else {
            let sum: f64 = load_by_facility.values().map(|l| l.utilization).sum();
            sum / load_by_facility.len() as f64
        };

        let placed_tasks = tasks.iter().filter(|t| t.is_placed()).count();

        Self {
            window,
            load_by_facility,
            avg_utilization,
            placed_tasks,
            unplaced_tasks: tasks.len() - placed_tasks,
        }
    }

    /// Facility with the highest utilization (ties broken by id).
    pub fn busiest_facility(&self) -> Option<&str> {
        self.load_by_facility
            .iter()
            .max_by(|(ia, a), (ib, b)| {
                a.utilization
                    .total_cmp(&b.utilization)
                    .then_with(|| ib.cmp(ia))
            })
            .map(|(id, _)| id.as_str())
    }

    /// Whether the board meets the given thresholds.
    pub fn meets_thresholds(&self, max_unplaced: usize, min_utilization: f64) -> bool {
        self.unplaced_tasks <= max_unplaced && self.avg_utilization >= min_utilization
    }
}
