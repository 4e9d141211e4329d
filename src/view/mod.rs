//! Calendar views of the board.
//!
//! Three zoom levels render the same occupancy at different granularities:
//!
//! | View | Bucket | Columns | Editable |
//! |------|--------|---------|----------|
//! | `1 mies.` | 1 day | 25 | yes |
//! | `3 mies.` | 7 days | 13 | no |
//! | `1 rok` | 30 days | 12 | no |
//!
//! Views are derived data: regenerate them whenever the project window or
//! the zoom selection changes. They are never persisted.
//!
//! # Usage
//!
//! ```
//! use schedule_board::config::BoardConfig;
//! use schedule_board::view::{generate_view, ViewKind};
//!
//! let config = BoardConfig::default();
//! let view = generate_view(ViewKind::Quarter, 1_700_000_000_000, 1_710_000_000_000, &config);
//! assert_eq!(view.columns.len(), 13);
//! assert!(!view.is_editable);
//! ```

mod generator;
mod projector;

pub use generator::{
    anchored_bucket_start, generate_month_view, generate_quarter_view, generate_view,
    generate_year_view,
};
pub use projector::{project, ProjectedGrid, ProjectedTask};

use serde::{Deserialize, Serialize};

use crate::config::BoardConfig;
use crate::models::{add_days, TimeWindow};

/// Zoom level of the timeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewKind {
    /// Day-granular month view.
    #[default]
    #[serde(rename = "1 mies.")]
    Month,
    /// Week-granular quarter view.
    #[serde(rename = "3 mies.")]
    Quarter,
    /// 30-day-granular year view.
    #[serde(rename = "1 rok")]
    Year,
}

impl ViewKind {
    /// All views, finest first.
    pub const ALL: [ViewKind; 3] = [ViewKind::Month, ViewKind::Quarter, ViewKind::Year];

    /// Display name shown in the zoom selector.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Month => "1 mies.",
            Self::Quarter => "3 mies.",
            Self::Year => "1 rok",
        }
    }

    /// Looks a view up by display name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Fixed number of columns.
    pub fn column_count(&self) -> usize {
        match self {
            Self::Month => 25,
            Self::Quarter => 13,
            Self::Year => 12,
        }
    }

    /// Days aggregated into one column.
    pub fn days_per_bucket(&self) -> u32 {
        match self {
            Self::Month => 1,
            Self::Quarter => 7,
            Self::Year => 30,
        }
    }

    /// Only the day-granular view accepts drag/drop edits.
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Month)
    }
}

/// One column of a view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    /// Header text.
    pub label: String,
    /// First day of the bucket (ms).
    pub bucket_start: i64,
    /// Rendered width (px).
    pub pixel_width: f64,
    /// Whether the bucket starts on or before the project end.
    pub in_project: bool,
}

/// A generated calendar view.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    /// Zoom level.
    pub kind: ViewKind,
    /// Columns in ascending bucket order.
    pub columns: Vec<Column>,
    /// Width of every column (px).
    pub cell_width: f64,
    /// Project start/end the view was generated for.
    pub project: TimeWindow,
    /// Whether direct edits are accepted.
    pub is_editable: bool,
    /// Projected occupancy, filled by [`View::project`].
    pub cells: ProjectedGrid,
}

impl View {
    /// Display name.
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Time covered by the columns.
    pub fn range(&self) -> TimeWindow {
        match (self.columns.first(), self.columns.last()) {
            (Some(first), Some(last)) => TimeWindow::new(
                first.bucket_start,
                add_days(last.bucket_start, i64::from(self.kind.days_per_bucket())),
            ),
            _ => TimeWindow::new(0, 0),
        }
    }

    /// Start of the bucket containing `day`: the closest bucket start not
    /// after `day`. `None` when `day` lies outside the view.
    pub fn bucket_start_for(&self, day: i64) -> Option<i64> {
        if !self.range().contains(day) {
            return None;
        }
        let idx = self.columns.partition_point(|c| c.bucket_start <= day);
        idx.checked_sub(1).map(|i| self.columns[i].bucket_start)
    }

    /// Column index containing `day`.
    pub fn column_index_for(&self, day: i64) -> Option<usize> {
        let start = self.bucket_start_for(day)?;
        self.columns.iter().position(|c| c.bucket_start == start)
    }

    /// Fills [`cells`](Self::cells) from a day-granular grid.
    pub fn project(&mut self, grid: &crate::grid::OccupancyGrid) {
        self.cells = project(grid, self);
    }

    /// Same view shifted by `offset` whole pages (negative = earlier).
    ///
    /// The projected cells are cleared; project again after paging.
    pub fn page(&self, offset: i64, config: &BoardConfig) -> View {
        let Some(first) = self.columns.first() else {
            return self.clone();
        };
        let page_days = self.kind.column_count() as i64 * i64::from(self.kind.days_per_bucket());
        let origin = add_days(first.bucket_start, offset * page_days);
        generator::generate_at(self.kind, origin, self.project, config)
    }
}
