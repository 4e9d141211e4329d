//! Occupancy grid and its persisted form.
//!
//! The grid is the day-granular source of truth for which facility/day
//! slots are claimed by which task. Coarser views are derived from it by
//! the [`view`](crate::view) projector.
//!
//! # Usage
//!
//! ```
//! use schedule_board::grid::OccupancyGrid;
//! use schedule_board::models::{CellState, Facility, Task, DAY_MS};
//!
//! let facility = Facility::new("F1", "W1").with_manpower(2);
//! let task = Task::new("T1", "P1", "W1").with_duration(4);
//!
//! let mut grid = OccupancyGrid::new();
//! let keys = grid.occupy(&facility, &task, 0).unwrap();
//! assert_eq!(keys.len(), 2);
//! assert_eq!(grid.query("F1", DAY_MS).unwrap().state, CellState::OccupiedEnd);
//!
//! grid.release(&facility, &task, 0);
//! assert!(grid.is_empty());
//! ```

mod document;
mod occupancy;
mod stats;

pub use document::GridDocument;
pub use occupancy::OccupancyGrid;
pub use stats::{BoardKpi, FacilityLoad};
