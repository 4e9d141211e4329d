//! Board consistency checks.
//!
//! Cross-checks task records, facility records, and the occupancy grid.
//! Detects:
//! - Duplicate IDs and facility IDs that cells cannot encode
//! - Half-set placements and placements on unknown facilities
//! - Facility task lists out of sync with task placements
//! - Cells of unknown or unplaced tasks
//! - Spans whose cells do not match the task's computed span
//! - Dangling or one-sided dependency links
//! - Circular dependencies (DAG validation)
//!
//! # Reference
//! Cormen et al. (2009), "Introduction to Algorithms", Ch. 22.4 (Topological Sort)

use std::collections::{HashMap, HashSet};

use crate::grid::OccupancyGrid;
use crate::models::{CellKey, CellState, Facility, Task};
use crate::sizing::span_length;

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Two entities share the same ID.
    DuplicateId,
    /// A facility ID that does not survive the cell key string form.
    InvalidId,
    /// Only one of facility and start day is set.
    PartialPlacement,
    /// A task is placed on a facility that doesn't exist.
    UnknownFacility,
    /// Facility task list disagrees with task placements.
    RosterMismatch,
    /// A cell belongs to an unknown task or to a task that isn't placed.
    OrphanCell,
    /// A placed task's cells differ from its computed span.
    SpanMismatch,
    /// A dependency references a task that doesn't exist.
    InvalidDependency,
    /// A dependency is missing its reverse link.
    AsymmetricDependency,
    /// Dependency graph contains a cycle.
    CyclicDependency,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Validates tasks, facilities, and grid against each other.
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_board(tasks: &[Task], facilities: &[Facility], grid: &OccupancyGrid) -> ValidationResult {
    let mut errors = Vec::new();

    let mut facility_map: HashMap<&str, &Facility> = HashMap::new();
    for f in facilities {
        if !CellKey::is_valid_facility_id(&f.id) {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidId,
                format!("Facility ID '{}' cannot be used in cell keys", f.id),
            ));
        }
        if facility_map.insert(f.id.as_str(), f).is_some() {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate facility ID: {}", f.id),
            ));
        }
    }

    let mut task_map: HashMap<&str, &Task> = HashMap::new();
    for t in tasks {
        if task_map.insert(t.id.as_str(), t).is_some() {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate task ID: {}", t.id),
            ));
        }
    }

    check_placements(tasks, &facility_map, &task_map, grid, &mut errors);
    check_cells(&task_map, &facility_map, grid, &mut errors);
    check_dependencies(tasks, &task_map, &mut errors);

    if let Some(cycle_err) = detect_cycles(tasks) {
        errors.push(cycle_err);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_placements(
    tasks: &[Task],
    facilities: &HashMap<&str, &Facility>,
    task_map: &HashMap<&str, &Task>,
    grid: &OccupancyGrid,
    errors: &mut Vec<ValidationError>,
) {
    for task in tasks {
        if task.facility_id().is_some() != task.start_time().is_some() {
            errors.push(ValidationError::new(
                ValidationErrorKind::PartialPlacement,
                format!("Task '{}' has only half of a placement", task.id),
            ));
            continue;
        }
        let Some((facility_id, start_day)) = task.placement() else {
            continue;
        };
        let Some(facility) = facilities.get(facility_id) else {
            errors.push(ValidationError::new(
                ValidationErrorKind::UnknownFacility,
                format!("Task '{}' is placed on unknown facility '{}'", task.id, facility_id),
            ));
            continue;
        };
        if !facility.has_task(&task.id) {
            errors.push(ValidationError::new(
                ValidationErrorKind::RosterMismatch,
                format!("Facility '{}' does not list placed task '{}'", facility_id, task.id),
            ));
        }
        if let Some(message) = span_problem(task, facility, start_day, grid) {
            errors.push(ValidationError::new(ValidationErrorKind::SpanMismatch, message));
        }
    }

    for facility in facilities.values() {
        for task_id in &facility.task_ids {
            let placed_here = task_map
                .get(task_id.as_str())
                .is_some_and(|t| t.facility_id() == Some(facility.id.as_str()));
            if !placed_here {
                errors.push(ValidationError::new(
                    ValidationErrorKind::RosterMismatch,
                    format!("Facility '{}' lists task '{}' which is not placed there", facility.id, task_id),
                ));
            }
        }
    }
}

/// Describes how a task's cells deviate from its computed span.
fn span_problem(task: &Task, facility: &Facility, start_day: i64, grid: &OccupancyGrid) -> Option<String> {
    let len = span_length(task.duration, facility.manpower);
    if len == 0 {
        return Some(format!(
            "Task '{}' is placed on facility '{}' which has no manpower",
            task.id, facility.id
        ));
    }

    // count first: keys are only built for spans the grid can actually hold
    let owned = grid.task_cells(&task.id).count();
    if owned != len {
        return Some(format!("Task '{}' owns {} cells, expected {}", task.id, owned, len));
    }

    let keys = OccupancyGrid::span_keys(&facility.id, start_day, len);
    for (i, key) in keys.iter().enumerate() {
        let intact = grid.get(key).is_some_and(|r| {
            r.task_id == task.id && r.state == CellState::for_offset(i, len) && r.source_key == keys[0]
        });
        if !intact {
            return Some(format!("Task '{}' has a broken cell at {}", task.id, key));
        }
    }
    None
}

fn check_cells(
    tasks: &HashMap<&str, &Task>,
    facilities: &HashMap<&str, &Facility>,
    grid: &OccupancyGrid,
    errors: &mut Vec<ValidationError>,
) {
    let mut reported: HashSet<&str> = HashSet::new();
    for (key, record) in grid.iter() {
        if !facilities.contains_key(key.facility_id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::OrphanCell,
                format!("Cell {} is on unknown facility", key),
            ));
            continue;
        }
        let placed = tasks
            .get(record.task_id.as_str())
            .is_some_and(|t| t.is_placed());
        if !placed && reported.insert(record.task_id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::OrphanCell,
                format!("Cell {} belongs to unknown or unplaced task '{}'", key, record.task_id),
            ));
        }
    }
}

fn check_dependencies(tasks: &[Task], task_map: &HashMap<&str, &Task>, errors: &mut Vec<ValidationError>) {
    for task in tasks {
        for req in &task.required_tasks {
            match task_map.get(req.as_str()) {
                None => errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidDependency,
                    format!("Task '{}' requires unknown task '{}'", task.id, req),
                )),
                Some(other) if !other.required_by_tasks.contains(&task.id) => {
                    errors.push(ValidationError::new(
                        ValidationErrorKind::AsymmetricDependency,
                        format!("Task '{}' requires '{}' but is not listed as its dependent", task.id, req),
                    ))
                }
                Some(_) => {}
            }
        }
        for dep in &task.required_by_tasks {
            match task_map.get(dep.as_str()) {
                None => errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidDependency,
                    format!("Task '{}' is required by unknown task '{}'", task.id, dep),
                )),
                Some(other) if !other.required_tasks.contains(&task.id) => {
                    errors.push(ValidationError::new(
                        ValidationErrorKind::AsymmetricDependency,
                        format!("Task '{}' lists dependent '{}' which does not require it", task.id, dep),
                    ))
                }
                Some(_) => {}
            }
        }
    }
}

/// Detects cycles in the dependency graph using DFS.
///
/// # Algorithm
/// Topological sort via DFS over `required_tasks` edges. If a back-edge is
/// found (visiting a node currently in the recursion stack), a cycle exists.
///
/// # Reference
/// Cormen et al. (2009), "Introduction to Algorithms", Ch. 22.4
fn detect_cycles(tasks: &[Task]) -> Option<ValidationError> {
    // prerequisite → dependents
    let mut adj: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut all_ids: Vec<&str> = Vec::new();

    for task in tasks {
        all_ids.push(&task.id);
        for req in &task.required_tasks {
            adj.entry(req.as_str()).or_default().push(task.id.as_str());
        }
    }

    let mut visited = HashSet::new();
    let mut in_stack = HashSet::new();

    for &node in &all_ids {
        if !visited.contains(node) && has_cycle_dfs(node, &adj, &mut visited, &mut in_stack) {
            return Some(ValidationError::new(
                ValidationErrorKind::CyclicDependency,
                format!("Circular dependency detected involving task '{node}'"),
            ));
        }
    }

    None
}

fn has_cycle_dfs<'a>(
    node: &'a str,
    adj: &HashMap<&'a str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
    in_stack: &mut HashSet<&'a str>,
) -> bool {
    visited.insert(node);
    in_stack.insert(node);

    if let Some(neighbors) = adj.get(node) {
        for &next in neighbors {
            if in_stack.contains(next) {
                return true;
            }
            if !visited.contains(next) && has_cycle_dfs(next, adj, visited, in_stack) {
                return true;
            }
        }
    }

    in_stack.remove(node);
    false
}
