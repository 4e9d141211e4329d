//! Placement gestures: drop, undrop, resize, delete.
//!
//! [`PlacementController`] validates a gesture against the occupancy grid,
//! saves the new grid, and then updates the task and facility records.
//! Observers registered with [`PlacementController::on_change`] receive a
//! [`GridEvent`] for every committed change.

mod controller;
mod journal;

pub use controller::PlacementController;

use crate::models::CellKey;

/// Committed change to the local grid.
#[derive(Debug, Clone, PartialEq)]
pub enum GridEvent {
    /// A task now occupies `keys`.
    Occupied { task_id: String, keys: Vec<CellKey> },
    /// `cells` cells of a task were removed.
    Released { task_id: String, cells: usize },
    /// The whole grid was replaced by a stored revision.
    Replaced { version: u64 },
}

/// Grid change observer.
pub type GridListener = Box<dyn Fn(&GridEvent) + Send + Sync>;
