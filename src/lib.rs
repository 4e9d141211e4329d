//! Production-scheduling board core.
//!
//! Tasks measured in work-days are placed onto facilities along a daily
//! timeline. A task's span on the board is its duration divided by the
//! facility's manpower, and no two tasks may share a facility-day.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `Task`, `Facility`, `CellKey`, `CellRecord`,
//!   `TimeWindow`
//! - **`sizing`**: Span length and pixel geometry
//! - **`grid`**: The occupancy grid, its stored document form, and load KPIs
//! - **`view`**: Month, quarter, and year timelines and the projection of
//!   day-level occupancy into them
//! - **`placement`**: Drop, undrop, resize, and delete gestures with
//!   versioned saves and rollback
//! - **`store`**: Collaborator traits plus in-memory implementations
//! - **`validation`**: Cross-checks of tasks, facilities, and grid
//! - **`config`**: Board settings loaded from TOML
//! - **`error`**: Error taxonomy
//!
//! # Example
//!
//! ```
//! use schedule_board::models::{Facility, Task, DAY_MS};
//! use schedule_board::placement::PlacementController;
//! use schedule_board::store::{MemoryFacilityStore, MemoryGridPersistence, MemoryTaskStore};
//! use schedule_board::view::ViewKind;
//!
//! let tasks = MemoryTaskStore::with_tasks([Task::new("T1", "P1", "W1").with_duration(4)]);
//! let facilities = MemoryFacilityStore::with_facilities([Facility::new("F1", "W1").with_manpower(2)]);
//! let mut board = PlacementController::new("W1", tasks, facilities, MemoryGridPersistence::new(), ViewKind::Month);
//!
//! let day = 1_700_006_400_000;
//! let keys = board.drop_task("T1", "F1", day).unwrap();
//! assert_eq!(keys.len(), 2);
//! assert!(board.grid().query("F1", day + DAY_MS).is_some());
//! ```

pub mod config;
pub mod error;
pub mod grid;
pub mod models;
pub mod placement;
pub mod sizing;
pub mod store;
pub mod validation;
pub mod view;

pub use error::{BoardError, PersistenceError, Result};
