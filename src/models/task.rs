//! Task model.
//!
//! A task is a unit of work measured in work-days. It is either sitting in
//! the side tray (unplaced) or anchored to a facility on a start day.
//!
//! # Placement Invariant
//! `facility_id.is_none() == start_time.is_none()`. The only way to change
//! either field is through [`Task::place`] and [`Task::unplace`].

use serde::{Deserialize, Serialize};

/// A task to be placed on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique task identifier.
    pub id: String,
    /// Owning project.
    pub project_id: String,
    /// Owning workspace.
    pub workspace_id: String,
    /// Human-readable name.
    pub title: String,
    /// Work-days required.
    pub duration: u32,
    /// Facility the task is placed on. `None` = in the side tray.
    facility_id: Option<String>,
    /// Start day timestamp (ms). `None` iff `facility_id` is `None`.
    start_time: Option<i64>,
    /// Tasks that must be done before this one.
    pub required_tasks: Vec<String>,
    /// Tasks that depend on this one.
    pub required_by_tasks: Vec<String>,
    /// Completion percentage (0-100).
    pub progress: u8,
}

impl Task {
    /// Creates an unplaced one-day task.
    pub fn new(
        id: impl Into<String>,
        project_id: impl Into<String>,
        workspace_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            project_id: project_id.into(),
            workspace_id: workspace_id.into(),
            title: String::new(),
            duration: 1,
            facility_id: None,
            start_time: None,
            required_tasks: Vec::new(),
            required_by_tasks: Vec::new(),
            progress: 0,
        }
    }

    /// Sets the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the duration in work-days.
    pub fn with_duration(mut self, duration: u32) -> Self {
        self.duration = duration;
        self
    }

    /// Sets the progress (clamped to 100).
    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = progress.min(100);
        self
    }

    /// Adds a prerequisite task id.
    pub fn with_required(mut self, task_id: impl Into<String>) -> Self {
        self.required_tasks.push(task_id.into());
        self
    }

    /// Adds a dependent task id.
    pub fn with_required_by(mut self, task_id: impl Into<String>) -> Self {
        self.required_by_tasks.push(task_id.into());
        self
    }

    /// Facility the task is placed on.
    pub fn facility_id(&self) -> Option<&str> {
        self.facility_id.as_deref()
    }

    /// Start day of the placement.
    pub fn start_time(&self) -> Option<i64> {
        self.start_time
    }

    /// Whether the task is on the timeline.
    pub fn is_placed(&self) -> bool {
        self.facility_id.is_some()
    }

    /// `(facility_id, start_day)` of the placement, if any.
    pub fn placement(&self) -> Option<(&str, i64)> {
        match (&self.facility_id, self.start_time) {
            (Some(f), Some(s)) => Some((f.as_str(), s)),
            _ => None,
        }
    }

    /// Anchors the task on a facility and day.
    pub fn place(&mut self, facility_id: impl Into<String>, start_day: i64) {
        self.facility_id = Some(facility_id.into());
        self.start_time = Some(start_day);
    }

    /// Moves the task back to the side tray.
    pub fn unplace(&mut self) {
        self.facility_id = None;
        self.start_time = None;
    }

    /// Builder form of [`Task::place`].
    pub fn placed_at(mut self, facility_id: impl Into<String>, start_day: i64) -> Self {
        self.place(facility_id, start_day);
        self
    }
}
