//! Scheduling board domain models.
//!
//! Provides the data types shared by the grid, view, and placement
//! subsystems.
//!
//! # Domain Mappings
//!
//! | schedule-board | Manufacturing | Construction |
//! |----------------|--------------|--------------|
//! | Facility | Work station | Crew |
//! | Task | Production order | Work package |
//! | Cell | Station-day | Crew-day |

mod cell;
mod facility;
mod task;
mod time;

pub use cell::{CellKey, CellRecord, CellState};
pub use facility::{reindex_facilities, Facility};
pub use task::Task;
pub use time::{add_days, day_floor, days_between, TimeWindow, DAY_MS};
