//! Facility model.
//!
//! A facility is a work station tasks are scheduled onto. Its manpower
//! divides a task's work-days into the number of day-cells the task
//! occupies on the board.

use serde::{Deserialize, Serialize};

/// A work station with finite manpower capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Facility {
    /// Unique facility identifier.
    pub id: String,
    /// Owning workspace.
    pub workspace_id: String,
    /// Sort rank within the workspace (see [`reindex_facilities`]).
    pub index: usize,
    /// Human-readable name.
    pub title: String,
    /// Display colour, the primary sort key of the facility list.
    pub color: String,
    /// Number of workers. Zero blocks placement.
    pub manpower: u32,
    /// Tasks currently placed on this facility.
    pub task_ids: Vec<String>,
}

impl Facility {
    /// Creates a facility with one worker.
    pub fn new(id: impl Into<String>, workspace_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            workspace_id: workspace_id.into(),
            index: 0,
            title: String::new(),
            color: String::new(),
            manpower: 1,
            task_ids: Vec::new(),
        }
    }

    /// Sets the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the display colour.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    /// Sets the manpower.
    pub fn with_manpower(mut self, manpower: u32) -> Self {
        self.manpower = manpower;
        self
    }

    /// Whether the task is listed on this facility.
    pub fn has_task(&self, task_id: &str) -> bool {
        self.task_ids.iter().any(|t| t == task_id)
    }

    /// Appends a task id if not yet listed. Returns `true` if added.
    pub fn attach_task(&mut self, task_id: &str) -> bool {
        if self.has_task(task_id) {
            return false;
        }
        self.task_ids.push(task_id.to_string());
        true
    }

    /// Removes a task id. Returns `true` if it was listed.
    pub fn detach_task(&mut self, task_id: &str) -> bool {
        let before = self.task_ids.len();
        self.task_ids.retain(|t| t != task_id);
        self.task_ids.len() != before
    }
}

/// Sorts facilities by colour then title and rewrites `index` as 0..n.
pub fn reindex_facilities(facilities: &mut [Facility]) {
    facilities.sort_by(|a, b| a.color.cmp(&b.color).then_with(|| a.title.cmp(&b.title)));
    for (i, f) in facilities.iter_mut().enumerate() {
        f.index = i;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facility_builder() {
        let f = Facility::new("F1", "W1")
            .with_title("Spawalnia")
            .with_color("#ff0000")
            .with_manpower(3);

        assert_eq!(f.id, "F1");
        assert_eq!(f.workspace_id, "W1");
        assert_eq!(f.title, "Spawalnia");
        assert_eq!(f.manpower, 3);
        assert!(f.task_ids.is_empty());
    }

    #[test]
    fn test_attach_detach() {
        let mut f = Facility::new("F1", "W1");
        assert!(f.attach_task("T1"));
        assert!(!f.attach_task("T1")); // no duplicates
        assert!(f.has_task("T1"));
        assert!(f.detach_task("T1"));
        assert!(!f.detach_task("T1"));
        assert!(f.task_ids.is_empty());
    }

    #[test]
    fn test_reindex_by_color_then_title() {
        let mut list = vec![
            Facility::new("a", "W").with_color("blue").with_title("Zeta"),
            Facility::new("b", "W").with_color("amber").with_title("Mill"),
            Facility::new("c", "W").with_color("blue").with_title("Alpha"),
        ];
        reindex_facilities(&mut list);

        let ids: Vec<&str> = list.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
        assert_eq!(list[2].index, 2);
    }
}
