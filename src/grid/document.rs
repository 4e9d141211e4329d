//! Persisted grid snapshot.
//!
//! The unit of persistence is the whole cell map of one workspace. Each
//! document carries the version it was derived from; stores accept a write
//! only when that version matches what they hold (compare-and-swap).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::OccupancyGrid;
use crate::error::PersistenceError;
use crate::models::{CellKey, CellRecord};

/// Serialized cell map of one workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridDocument {
    /// Owning workspace.
    pub workspace_id: String,
    /// Store revision this document was read at (0 = never stored).
    pub version: u64,
    /// Cells keyed by `"{facility_id}-{day_ms}"`.
    pub cells: BTreeMap<CellKey, CellRecord>,
}

impl GridDocument {
    /// Creates an empty, never-stored document.
    pub fn new(workspace_id: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            version: 0,
            cells: BTreeMap::new(),
        }
    }

    /// Snapshots a grid at the given base version.
    pub fn from_grid(workspace_id: impl Into<String>, version: u64, grid: &OccupancyGrid) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            version,
            cells: grid.cells().clone(),
        }
    }

    /// Rebuilds the in-memory grid.
    pub fn to_grid(&self) -> OccupancyGrid {
        OccupancyGrid::from_cells(self.cells.clone())
    }

    /// Encodes as JSON.
    pub fn to_json(&self) -> Result<String, PersistenceError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes from JSON.
    pub fn from_json(json: &str) -> Result<Self, PersistenceError> {
        Ok(serde_json::from_str(json)?)
    }
}
