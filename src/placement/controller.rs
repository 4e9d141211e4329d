//! Placement controller.
//!
//! Owns the local copy of a workspace's occupancy grid and turns user
//! gestures into grid, task, and facility writes.
//!
//! # Transactions
//!
//! Every gesture runs in the same order:
//!
//! 1. Validate against the local grid without mutating it.
//! 2. Build the new grid on a copy and save it with a version check.
//! 3. On a version conflict, reload the stored grid and re-apply the gesture
//!    to it, up to `max_save_retries` times.
//! 4. Write the task and facility records. If one of those writes fails,
//!    the records already written are restored and the previous grid is
//!    saved back over the new one.
//!
//! The local grid and version change only after all writes succeeded, so a
//! failed gesture leaves the controller as it was.

use std::collections::BTreeMap;
use std::sync::mpsc;

use parking_lot::Mutex;

use super::journal::{self, StoreOp};
use super::{GridEvent, GridListener};
use crate::config::BoardConfig;
use crate::error::{BoardError, PersistenceError, Result};
use crate::grid::{GridDocument, OccupancyGrid};
use crate::models::{reindex_facilities, CellKey, Facility, Task};
use crate::store::{FacilityStore, GridPersistence, Subscription, TaskStore, ViewSelection};

/// Outcome of a saved grid write, before the store writes ran.
struct Commit {
    base: OccupancyGrid,
    next: OccupancyGrid,
    version: u64,
    events: Vec<GridEvent>,
}

/// Applies placement gestures for one workspace.
pub struct PlacementController<T, F, P, S> {
    workspace_id: String,
    config: BoardConfig,
    grid: OccupancyGrid,
    version: u64,
    tasks: T,
    facilities: F,
    persistence: P,
    selection: S,
    listeners: Vec<GridListener>,
    inbox: Option<mpsc::Receiver<GridDocument>>,
}

impl<T, F, P, S> PlacementController<T, F, P, S>
where
    T: TaskStore,
    F: FacilityStore,
    P: GridPersistence,
    S: ViewSelection,
{
    /// Creates a controller with an empty local grid.
    ///
    /// Call [`load`](Self::load) to pick up the stored grid.
    pub fn new(workspace_id: impl Into<String>, tasks: T, facilities: F, persistence: P, selection: S) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            config: BoardConfig::default(),
            grid: OccupancyGrid::new(),
            version: 0,
            tasks,
            facilities,
            persistence,
            selection,
            listeners: Vec::new(),
            inbox: None,
        }
    }

    /// Sets the configuration.
    pub fn with_config(mut self, config: BoardConfig) -> Self {
        self.config = config;
        self
    }

    /// Workspace whose grid this controller edits.
    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    /// Active configuration.
    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// Local grid.
    pub fn grid(&self) -> &OccupancyGrid {
        &self.grid
    }

    /// Version of the stored document the local grid matches.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Task store.
    pub fn tasks(&self) -> &T {
        &self.tasks
    }

    /// Task store, for record edits made outside a gesture.
    ///
    /// Duration changes made here are picked up by the next gesture on the
    /// task; its cells are released by their recorded span either way.
    pub fn tasks_mut(&mut self) -> &mut T {
        &mut self.tasks
    }

    /// Facility store.
    pub fn facilities(&self) -> &F {
        &self.facilities
    }

    /// Facility store, for record edits made outside a gesture.
    pub fn facilities_mut(&mut self) -> &mut F {
        &mut self.facilities
    }

    /// Grid document store.
    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    /// View selection that gates edits.
    pub fn selection(&self) -> &S {
        &self.selection
    }

    /// Registers a callback run after every committed grid change.
    pub fn on_change(&mut self, listener: impl Fn(&GridEvent) + Send + Sync + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Replaces the local grid with the stored document.
    pub fn load(&mut self) -> Result<()> {
        let (grid, version) = match self.persistence.load_snapshot(&self.workspace_id)? {
            Some(doc) => (doc.to_grid(), doc.version),
            None => (OccupancyGrid::new(), 0),
        };
        tracing::info!(
            workspace_id = %self.workspace_id,
            version,
            cells = grid.len(),
            "loaded grid"
        );
        self.grid = grid;
        self.version = version;
        self.emit(&[GridEvent::Replaced { version }]);
        Ok(())
    }

    /// Applies a document pushed by the backend.
    ///
    /// Only documents of this workspace that are newer than the local
    /// version are applied. Returns whether the local grid changed.
    pub fn apply_remote(&mut self, document: GridDocument) -> bool {
        if document.workspace_id != self.workspace_id || document.version <= self.version {
            if document.version < self.version {
                tracing::warn!(
                    workspace_id = %self.workspace_id,
                    local = self.version,
                    remote = document.version,
                    "ignoring stale remote grid"
                );
            }
            return false;
        }
        let version = document.version;
        self.grid = document.to_grid();
        self.version = version;
        tracing::info!(workspace_id = %self.workspace_id, version, "applied remote grid");
        self.emit(&[GridEvent::Replaced { version }]);
        true
    }

    /// Subscribes to stored revisions of this workspace's grid.
    ///
    /// Revisions are queued until [`sync_remote`](Self::sync_remote) applies
    /// them. Dropping the returned handle stops the feed.
    pub fn watch(&mut self) -> Subscription {
        let (sender, receiver) = mpsc::channel();
        let sender = Mutex::new(sender);
        self.inbox = Some(receiver);
        self.persistence.subscribe(
            &self.workspace_id,
            std::sync::Arc::new(move |doc: &GridDocument| {
                // receiver gone means the controller was dropped
                let _ = sender.lock().send(doc.clone());
            }),
        )
    }

    /// Applies queued remote revisions. Returns how many changed the grid.
    pub fn sync_remote(&mut self) -> usize {
        let pending: Vec<GridDocument> = match &self.inbox {
            Some(inbox) => inbox.try_iter().collect(),
            None => return 0,
        };
        let mut applied = 0;
        for doc in pending {
            if self.apply_remote(doc) {
                applied += 1;
            }
        }
        applied
    }

    /// Places `task_id` on `facility_id` starting at `start_day`.
    ///
    /// A placed task is moved: its old span is released in the same write.
    /// Returns the occupied keys.
    pub fn drop_task(&mut self, task_id: &str, facility_id: &str, start_day: i64) -> Result<Vec<CellKey>> {
        self.ensure_editable()?;
        let task = self.task(task_id)?;
        if task.duration == 0 {
            return Err(BoardError::ZeroDuration(task.id));
        }
        let target = self.facility(facility_id)?;
        let previous = task.placement().map(|(f, day)| (f.to_string(), day));
        let previous_facility = previous.as_ref().and_then(|(f, _)| self.facilities.get(f));
        let config = self.config.clone();

        let mut placed = task.clone();
        placed.place(&target.id, start_day);

        let mut ops = Vec::with_capacity(3);
        if let Some(old) = &previous_facility {
            ops.push(StoreOp::Detach {
                facility_id: old.id.clone(),
                task_id: task.id.clone(),
            });
        }
        ops.push(StoreOp::Attach {
            facility_id: target.id.clone(),
            task_id: task.id.clone(),
        });
        ops.push(StoreOp::UpsertTask(placed));

        let events = self.transact(
            "drop",
            |grid| {
                let mut events = Vec::with_capacity(2);
                if let Some((old_facility, old_day)) = &previous {
                    let cells = release_placement(grid, &task.id, old_facility, *old_day);
                    if cells > 0 {
                        events.push(GridEvent::Released {
                            task_id: task.id.clone(),
                            cells,
                        });
                    }
                }
                let keys = grid.occupy_with(&target, &task, start_day, &config)?;
                events.push(GridEvent::Occupied {
                    task_id: task.id.clone(),
                    keys,
                });
                Ok(events)
            },
            ops,
        )?;
        Ok(occupied_keys(events))
    }

    /// Removes a task from the grid. Returns the number of released cells;
    /// an unplaced task releases nothing.
    pub fn undrop_task(&mut self, task_id: &str) -> Result<usize> {
        self.ensure_editable()?;
        let task = self.task(task_id)?;
        let Some((facility_id, start_day)) = task.placement().map(|(f, d)| (f.to_string(), d)) else {
            tracing::debug!(task_id, "undrop of unplaced task");
            return Ok(0);
        };
        let mut unplaced = task.clone();
        unplaced.unplace();

        let mut ops = Vec::with_capacity(2);
        if self.facilities.get(&facility_id).is_some() {
            ops.push(StoreOp::Detach {
                facility_id: facility_id.clone(),
                task_id: task.id.clone(),
            });
        }
        ops.push(StoreOp::UpsertTask(unplaced));

        let events = self.transact(
            "undrop",
            |grid| {
                let cells = release_placement(grid, &task.id, &facility_id, start_day);
                Ok(vec![GridEvent::Released {
                    task_id: task.id.clone(),
                    cells,
                }])
            },
            ops,
        )?;
        Ok(released_count(&events))
    }

    /// Changes a task's duration and re-spans it in place.
    ///
    /// A placed task keeps its facility and start day. If the new span
    /// collides with another task the gesture fails and the old span stays.
    /// Returns the occupied keys (empty for an unplaced task).
    pub fn resize_task(&mut self, task_id: &str, duration: u32) -> Result<Vec<CellKey>> {
        self.ensure_editable()?;
        if duration == 0 {
            return Err(BoardError::ZeroDuration(task_id.to_string()));
        }
        let task = self.task(task_id)?;
        let resized = task.clone().with_duration(duration);

        let Some((facility_id, start_day)) = task.placement().map(|(f, d)| (f.to_string(), d)) else {
            self.write_records("resize", vec![StoreOp::UpsertTask(resized)])?;
            return Ok(Vec::new());
        };
        let facility = self.facility(&facility_id)?;
        let config = self.config.clone();

        let events = self.transact(
            "resize",
            |grid| {
                let cells = release_placement(grid, &task.id, &facility.id, start_day);
                let keys = grid.occupy_with(&facility, &resized, start_day, &config)?;
                Ok(vec![
                    GridEvent::Released {
                        task_id: task.id.clone(),
                        cells,
                    },
                    GridEvent::Occupied {
                        task_id: task.id.clone(),
                        keys,
                    },
                ])
            },
            vec![StoreOp::UpsertTask(resized.clone())],
        )?;
        Ok(occupied_keys(events))
    }

    /// Deletes a task.
    ///
    /// Releases its span, detaches it from its facility, and removes its id
    /// from the dependency lists of the tasks it was linked to. Returns the
    /// deleted record.
    pub fn delete_task(&mut self, task_id: &str) -> Result<Task> {
        let task = self.task(task_id)?;
        let placement = task.placement().map(|(f, d)| (f.to_string(), d));
        let facility = placement.as_ref().and_then(|(f, _)| self.facilities.get(f));

        let mut ops = Vec::new();
        if let Some(facility) = &facility {
            ops.push(StoreOp::Detach {
                facility_id: facility.id.clone(),
                task_id: task.id.clone(),
            });
        }
        ops.extend(self.unlink_dependencies(&task).into_values().map(StoreOp::UpsertTask));
        ops.push(StoreOp::RemoveTask(task.id.clone()));

        match &placement {
            Some((facility_id, start_day)) => {
                self.transact(
                    "delete task",
                    |grid| {
                        let cells = release_placement(grid, &task.id, facility_id, *start_day);
                        Ok(vec![GridEvent::Released {
                            task_id: task.id.clone(),
                            cells,
                        }])
                    },
                    ops,
                )?;
            }
            None => self.write_records("delete task", ops)?,
        }
        Ok(task)
    }

    /// Deletes a facility and unplaces every task on it.
    ///
    /// Returns the ids of the unplaced tasks.
    pub fn delete_facility(&mut self, facility_id: &str) -> Result<Vec<String>> {
        let facility = self.facility(facility_id)?;

        let mut task_ids: Vec<String> = facility.task_ids.clone();
        for (_, record) in self.grid.facility_cells(facility_id) {
            if !task_ids.contains(&record.task_id) {
                task_ids.push(record.task_id.clone());
            }
        }

        let mut unplaced = Vec::new();
        let mut ops = Vec::new();
        for id in &task_ids {
            let Some(mut task) = self.tasks.get(id) else {
                continue;
            };
            if task.facility_id() == Some(facility_id) {
                task.unplace();
                unplaced.push(task.id.clone());
                ops.push(StoreOp::UpsertTask(task));
            }
        }
        ops.push(StoreOp::RemoveFacility(facility.id.clone()));

        if self.grid.facility_cells(facility_id).next().is_some() {
            let owned = facility.id.clone();
            self.transact(
                "delete facility",
                |grid| {
                    let mut released: BTreeMap<String, usize> = BTreeMap::new();
                    for (_, record) in grid.release_all(&owned) {
                        *released.entry(record.task_id).or_insert(0) += 1;
                    }
                    Ok(released
                        .into_iter()
                        .map(|(task_id, cells)| GridEvent::Released { task_id, cells })
                        .collect())
                },
                ops,
            )?;
        } else {
            self.write_records("delete facility", ops)?;
        }
        Ok(unplaced)
    }

    /// Re-sorts the workspace's facilities by color then title and stores
    /// the new indices.
    pub fn reindex_facilities(&mut self) -> Result<()> {
        let mut facilities = self.facilities.list(&self.workspace_id);
        reindex_facilities(&mut facilities);
        let ops = facilities.into_iter().map(StoreOp::UpsertFacility).collect();
        self.write_records("reindex facilities", ops)
    }

    fn ensure_editable(&self) -> Result<()> {
        let kind = self.selection.selected();
        if kind.is_editable() {
            Ok(())
        } else {
            Err(BoardError::ReadOnlyView(kind))
        }
    }

    fn task(&self, task_id: &str) -> Result<Task> {
        self.tasks
            .get(task_id)
            .ok_or_else(|| BoardError::TaskNotFound(task_id.to_string()))
    }

    fn facility(&self, facility_id: &str) -> Result<Facility> {
        self.facilities
            .get(facility_id)
            .ok_or_else(|| BoardError::FacilityNotFound(facility_id.to_string()))
    }

    /// Linked tasks with `task`'s id removed from their dependency lists.
    fn unlink_dependencies(&self, task: &Task) -> BTreeMap<String, Task> {
        let mut touched: BTreeMap<String, Task> = BTreeMap::new();
        for id in task.required_tasks.iter().chain(&task.required_by_tasks) {
            if id == &task.id || touched.contains_key(id) {
                continue;
            }
            if let Some(mut linked) = self.tasks.get(id) {
                linked.required_tasks.retain(|t| t != &task.id);
                linked.required_by_tasks.retain(|t| t != &task.id);
                touched.insert(id.clone(), linked);
            }
        }
        touched
    }

    /// Store-only gesture: no grid write.
    fn write_records(&mut self, gesture: &str, ops: Vec<StoreOp>) -> Result<()> {
        journal::apply(&mut self.tasks, &mut self.facilities, ops)?;
        tracing::info!(workspace_id = %self.workspace_id, gesture, "records updated");
        Ok(())
    }

    fn transact<M>(&mut self, gesture: &str, mutate: M, ops: Vec<StoreOp>) -> Result<Vec<GridEvent>>
    where
        M: Fn(&mut OccupancyGrid) -> Result<Vec<GridEvent>>,
    {
        let commit = self.save_grid(gesture, &mutate)?;

        if let Err(err) = journal::apply(&mut self.tasks, &mut self.facilities, ops) {
            self.compensate(gesture, commit, &err);
            return Err(err.into());
        }

        tracing::info!(
            workspace_id = %self.workspace_id,
            gesture,
            version = commit.version,
            cells = commit.next.len(),
            "grid committed"
        );
        self.grid = commit.next;
        self.version = commit.version;
        self.emit(&commit.events);
        Ok(commit.events)
    }

    fn save_grid<M>(&self, gesture: &str, mutate: &M) -> Result<Commit>
    where
        M: Fn(&mut OccupancyGrid) -> Result<Vec<GridEvent>>,
    {
        let mut base = self.grid.clone();
        let mut version = self.version;
        let mut retries = 0;

        loop {
            let mut next = base.clone();
            let events = mutate(&mut next)?;
            let document = GridDocument::from_grid(&self.workspace_id, version, &next);

            match self.persistence.save_snapshot(&self.workspace_id, &document) {
                Ok(saved) => {
                    return Ok(Commit {
                        base,
                        next,
                        version: saved,
                        events,
                    })
                }
                Err(PersistenceError::VersionConflict { actual, .. }) if retries < self.config.max_save_retries => {
                    retries += 1;
                    tracing::warn!(
                        workspace_id = %self.workspace_id,
                        gesture,
                        expected = version,
                        actual,
                        retries,
                        "stored grid moved on, retrying on latest"
                    );
                    match self.persistence.load_snapshot(&self.workspace_id)? {
                        Some(latest) => {
                            base = latest.to_grid();
                            version = latest.version;
                        }
                        None => {
                            base = OccupancyGrid::new();
                            version = 0;
                        }
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Saves the pre-gesture grid over a commit whose store writes failed.
    fn compensate(&mut self, gesture: &str, commit: Commit, cause: &PersistenceError) {
        let document = GridDocument::from_grid(&self.workspace_id, commit.version, &commit.base);
        match self.persistence.save_snapshot(&self.workspace_id, &document) {
            Ok(version) => {
                tracing::warn!(
                    workspace_id = %self.workspace_id,
                    gesture,
                    version,
                    error = %cause,
                    "record write failed, grid restored"
                );
                self.grid = commit.base;
                self.version = version;
            }
            Err(restore) => {
                // stored grid keeps the gesture; mirror it so the next write is not stale
                tracing::warn!(
                    workspace_id = %self.workspace_id,
                    gesture,
                    error = %cause,
                    restore_error = %restore,
                    "record write failed and grid could not be restored"
                );
                self.grid = commit.next;
                self.version = commit.version;
            }
        }
    }

    fn emit(&self, events: &[GridEvent]) {
        for event in events {
            for listener in &self.listeners {
                listener(event);
            }
        }
    }
}

impl<T, F, P, S> std::fmt::Debug for PlacementController<T, F, P, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlacementController")
            .field("workspace_id", &self.workspace_id)
            .field("version", &self.version)
            .field("cells", &self.grid.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Releases the span a task was written with at its recorded placement.
///
/// The span is found by its source key, so a duration or manpower edit made
/// since the write does not change what is removed. When nothing is found
/// there (the grid was rebased onto another editor's placement) the task's
/// cells are found by id.
fn release_placement(grid: &mut OccupancyGrid, task_id: &str, facility_id: &str, start_day: i64) -> usize {
    match grid.release_span(&CellKey::new(facility_id, start_day), task_id) {
        0 => grid.release_task(task_id),
        cells => cells,
    }
}

fn occupied_keys(events: Vec<GridEvent>) -> Vec<CellKey> {
    events
        .into_iter()
        .find_map(|event| match event {
            GridEvent::Occupied { keys, .. } => Some(keys),
            _ => None,
        })
        .unwrap_or_default()
}

fn released_count(events: &[GridEvent]) -> usize {
    events
        .iter()
        .map(|event| match event {
            GridEvent::Released { cells, .. } => *cells,
            _ => 0,
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConflictPolicy;
    use crate::models::{CellState, DAY_MS};
    use crate::store::{MemoryFacilityStore, MemoryGridPersistence, MemoryTaskStore, SharedSelection};
    use crate::validation::{validate_board, ValidationErrorKind};
    use crate::view::ViewKind;
    use std::sync::Arc;

    const D: i64 = 1_700_006_400_000;

    type Controller = PlacementController<MemoryTaskStore, MemoryFacilityStore, MemoryGridPersistence, SharedSelection>;

    fn stores() -> (MemoryTaskStore, MemoryFacilityStore) {
        let tasks = MemoryTaskStore::with_tasks([
            Task::new("T1", "P1", "W1").with_duration(3),
            Task::new("T2", "P1", "W1").with_duration(2),
            Task::new("T3", "P1", "W1")
                .with_duration(1)
                .with_required("T1")
                .with_required_by("T2"),
        ]);
        let facilities = MemoryFacilityStore::with_facilities([
            Facility::new("F1", "W1"),
            Facility::new("F2", "W1").with_manpower(2),
        ]);
        (tasks, facilities)
    }

    fn controller(persistence: &MemoryGridPersistence) -> (Controller, SharedSelection) {
        let (tasks, facilities) = stores();
        let selection = SharedSelection::new(ViewKind::Month);
        let controller = PlacementController::new("W1", tasks, facilities, persistence.clone(), selection.clone());
        (controller, selection)
    }

    #[test]
    fn test_drop_writes_grid_and_records() {
        let persistence = MemoryGridPersistence::new();
        let (mut c, _) = controller(&persistence);

        let keys = c.drop_task("T1", "F1", D).unwrap();

        assert_eq!(keys.len(), 3);
        assert_eq!(c.grid().len(), 3);
        assert_eq!(c.grid().query("F1", D).unwrap().state, CellState::OccupiedStart);
        assert_eq!(c.grid().query("F1", D + 2 * DAY_MS).unwrap().state, CellState::OccupiedEnd);
        assert_eq!(c.tasks().get("T1").unwrap().placement(), Some(("F1", D)));
        assert!(c.facilities().get("F1").unwrap().has_task("T1"));
        assert_eq!(c.version(), 1);
        assert_eq!(persistence.version("W1"), 1);
    }

    #[test]
    fn test_move_between_facilities() {
        let persistence = MemoryGridPersistence::new();
        let (mut c, _) = controller(&persistence);
        c.drop_task("T1", "F1", D).unwrap();

        let keys = c.drop_task("T1", "F2", D + 5 * DAY_MS).unwrap();

        // 3 days on 2 people rounds to 2 cells
        assert_eq!(keys.len(), 2);
        assert_eq!(c.grid().facility_cells("F1").count(), 0);
        assert_eq!(c.grid().facility_cells("F2").count(), 2);
        assert!(!c.facilities().get("F1").unwrap().has_task("T1"));
        assert!(c.facilities().get("F2").unwrap().has_task("T1"));
        assert_eq!(c.version(), 2);
    }

    #[test]
    fn test_conflict_leaves_everything_unchanged() {
        let persistence = MemoryGridPersistence::new();
        let (mut c, _) = controller(&persistence);
        c.drop_task("T1", "F1", D).unwrap();
        let before = c.grid().clone();

        let err = c.drop_task("T2", "F1", D + DAY_MS).unwrap_err();

        assert!(matches!(err, BoardError::CellConflict { ref occupant, .. } if occupant == "T1"));
        assert_eq!(c.grid(), &before);
        assert_eq!(c.version(), 1);
        assert_eq!(persistence.version("W1"), 1);
        assert!(!c.tasks().get("T2").unwrap().is_placed());
        assert!(!c.facilities().get("F1").unwrap().has_task("T2"));
    }

    #[test]
    fn test_overwrite_policy() {
        let persistence = MemoryGridPersistence::new();
        let (c, _) = controller(&persistence);
        let mut c = c.with_config(BoardConfig::default().with_conflict_policy(ConflictPolicy::Overwrite));
        c.drop_task("T1", "F1", D).unwrap();

        c.drop_task("T2", "F1", D + DAY_MS).unwrap();

        assert_eq!(c.grid().query("F1", D + DAY_MS).unwrap().task_id, "T2");
        assert_eq!(c.grid().query("F1", D).unwrap().task_id, "T1");
    }

    #[test]
    fn test_undrop() {
        let persistence = MemoryGridPersistence::new();
        let (mut c, _) = controller(&persistence);
        c.drop_task("T1", "F1", D).unwrap();

        assert_eq!(c.undrop_task("T1").unwrap(), 3);
        assert!(c.grid().is_empty());
        assert!(!c.tasks().get("T1").unwrap().is_placed());
        assert!(!c.facilities().get("F1").unwrap().has_task("T1"));

        // already unplaced: nothing to do, nothing written
        assert_eq!(c.undrop_task("T1").unwrap(), 0);
        assert_eq!(persistence.version("W1"), 2);
    }

    #[test]
    fn test_undrop_after_manpower_edit_clears_span() {
        let persistence = MemoryGridPersistence::new();
        let (mut c, _) = controller(&persistence);
        c.resize_task("T1", 4).unwrap();
        c.drop_task("T1", "F1", D).unwrap();
        assert_eq!(c.grid().task_cells("T1").count(), 4);

        // 4 days on 2 people would span 2 cells; the grid still holds 4
        let mut f1 = c.facilities().get("F1").unwrap();
        f1.manpower = 2;
        c.facilities_mut().upsert(f1).unwrap();

        assert_eq!(c.undrop_task("T1").unwrap(), 4);
        assert!(c.grid().is_empty());
        let tasks: Vec<Task> = c.tasks().all().cloned().collect();
        let facilities: Vec<Facility> = c.facilities().all().cloned().collect();
        // the fixture's one-sided dependency links are reported too; only the grid matters here
        let problems = validate_board(&tasks, &facilities, c.grid()).err().unwrap_or_default();
        assert!(problems
            .iter()
            .all(|e| !matches!(e.kind, ValidationErrorKind::SpanMismatch | ValidationErrorKind::OrphanCell)));
    }

    #[test]
    fn test_move_after_duration_edit_leaves_one_span() {
        let persistence = MemoryGridPersistence::new();
        let (mut c, _) = controller(&persistence);
        c.resize_task("T1", 4).unwrap();
        c.drop_task("T1", "F1", D).unwrap();

        let mut t1 = c.tasks().get("T1").unwrap();
        t1.duration = 1;
        c.tasks_mut().upsert(t1).unwrap();

        let keys = c.drop_task("T1", "F1", D + 30 * DAY_MS).unwrap();

        assert_eq!(keys, vec![CellKey::new("F1", D + 30 * DAY_MS)]);
        assert_eq!(c.grid().task_cells("T1").count(), 1);
        assert_eq!(c.grid().len(), 1);
    }

    #[test]
    fn test_resize_after_manpower_edit_replaces_whole_span() {
        let persistence = MemoryGridPersistence::new();
        let (mut c, _) = controller(&persistence);
        c.drop_task("T1", "F1", D).unwrap();
        let mut f1 = c.facilities().get("F1").unwrap();
        f1.manpower = 3;
        c.facilities_mut().upsert(f1).unwrap();

        // 6 days on 3 people: 2 cells, none of the old 3-cell span left over
        let keys = c.resize_task("T1", 6).unwrap();

        assert_eq!(keys.len(), 2);
        assert_eq!(c.grid().task_cells("T1").count(), 2);
        assert!(c.grid().query("F1", D + 2 * DAY_MS).is_none());
    }

    #[test]
    fn test_span_cap_from_config() {
        let persistence = MemoryGridPersistence::new();
        let (c, _) = controller(&persistence);
        let mut c = c.with_config(BoardConfig::default().with_max_span_days(2));

        let err = c.drop_task("T1", "F1", D).unwrap_err();

        assert!(matches!(err, BoardError::SpanTooLong { span: 3, max: 2, .. }));
        assert!(c.grid().is_empty());
        assert_eq!(persistence.version("W1"), 0);
        assert!(!c.tasks().get("T1").unwrap().is_placed());

        // same task on two people fits
        assert_eq!(c.drop_task("T1", "F2", D).unwrap().len(), 2);
    }

    #[test]
    fn test_huge_duration_rejected() {
        let persistence = MemoryGridPersistence::new();
        let (mut c, _) = controller(&persistence);
        c.drop_task("T1", "F1", D).unwrap();

        let err = c.resize_task("T1", u32::MAX).unwrap_err();

        assert!(matches!(err, BoardError::SpanTooLong { .. }));
        assert_eq!(c.grid().task_cells("T1").count(), 3);
        assert_eq!(c.tasks().get("T1").unwrap().duration, 3);
    }

    #[test]
    fn test_facility_id_ending_in_dash_rejected() {
        let persistence = MemoryGridPersistence::new();
        let (mut c, _) = controller(&persistence);
        c.facilities_mut().upsert(Facility::new("F-", "W1")).unwrap();

        let err = c.drop_task("T1", "F-", D).unwrap_err();

        assert!(matches!(err, BoardError::InvariantViolation(_)));
        assert!(c.grid().is_empty());
        assert_eq!(persistence.version("W1"), 0);
    }

    #[test]
    fn test_resize_grows_span() {
        let persistence = MemoryGridPersistence::new();
        let (mut c, _) = controller(&persistence);
        c.drop_task("T1", "F1", D).unwrap();

        let keys = c.resize_task("T1", 5).unwrap();

        assert_eq!(keys.len(), 5);
        assert_eq!(c.grid().len(), 5);
        assert_eq!(c.tasks().get("T1").unwrap().duration, 5);
        assert_eq!(c.tasks().get("T1").unwrap().placement(), Some(("F1", D)));
    }

    #[test]
    fn test_resize_into_neighbor_fails() {
        let persistence = MemoryGridPersistence::new();
        let (mut c, _) = controller(&persistence);
        c.drop_task("T1", "F1", D).unwrap();
        c.drop_task("T2", "F1", D + 3 * DAY_MS).unwrap();

        let err = c.resize_task("T1", 4).unwrap_err();

        assert!(matches!(err, BoardError::CellConflict { .. }));
        assert_eq!(c.grid().task_cells("T1").count(), 3);
        assert_eq!(c.tasks().get("T1").unwrap().duration, 3);
    }

    #[test]
    fn test_resize_zero_rejected() {
        let persistence = MemoryGridPersistence::new();
        let (mut c, _) = controller(&persistence);
        assert!(matches!(c.resize_task("T1", 0), Err(BoardError::ZeroDuration(_))));
    }

    #[test]
    fn test_resize_unplaced_updates_record_only() {
        let persistence = MemoryGridPersistence::new();
        let (mut c, _) = controller(&persistence);
        assert!(c.resize_task("T2", 7).unwrap().is_empty());
        assert_eq!(c.tasks().get("T2").unwrap().duration, 7);
        assert_eq!(persistence.version("W1"), 0);
    }

    #[test]
    fn test_read_only_view_refuses_edits() {
        let persistence = MemoryGridPersistence::new();
        let (mut c, selection) = controller(&persistence);
        selection.select(ViewKind::Quarter);

        let err = c.drop_task("T1", "F1", D).unwrap_err();
        assert!(matches!(err, BoardError::ReadOnlyView(ViewKind::Quarter)));

        selection.select(ViewKind::Month);
        assert!(c.drop_task("T1", "F1", D).is_ok());
    }

    #[test]
    fn test_zero_manpower() {
        let persistence = MemoryGridPersistence::new();
        let (mut c, _) = controller(&persistence);
        c.facilities_mut()
            .upsert(Facility::new("F0", "W1").with_manpower(0))
            .unwrap();

        assert!(matches!(c.drop_task("T1", "F0", D), Err(BoardError::ZeroManpower(_))));
        assert_eq!(persistence.version("W1"), 0);
    }

    #[test]
    fn test_unknown_ids() {
        let persistence = MemoryGridPersistence::new();
        let (mut c, _) = controller(&persistence);
        assert!(matches!(c.drop_task("nope", "F1", D), Err(BoardError::TaskNotFound(_))));
        assert!(matches!(c.drop_task("T1", "nope", D), Err(BoardError::FacilityNotFound(_))));
    }

    #[test]
    fn test_delete_task_cleans_links() {
        let persistence = MemoryGridPersistence::new();
        let (mut c, _) = controller(&persistence);
        c.tasks_mut()
            .upsert(
                Task::new("T1", "P1", "W1")
                    .with_duration(3)
                    .with_required_by("T3"),
            )
            .unwrap();
        c.tasks_mut()
            .upsert(Task::new("T2", "P1", "W1").with_duration(2).with_required("T3"))
            .unwrap();
        c.drop_task("T3", "F1", D).unwrap();

        let deleted = c.delete_task("T3").unwrap();

        assert_eq!(deleted.id, "T3");
        assert!(c.tasks().get("T3").is_none());
        assert!(c.tasks().get("T1").unwrap().required_by_tasks.is_empty());
        assert!(c.tasks().get("T2").unwrap().required_tasks.is_empty());
        assert!(c.grid().is_empty());
        assert!(!c.facilities().get("F1").unwrap().has_task("T3"));
    }

    #[test]
    fn test_delete_unplaced_task_skips_grid() {
        let persistence = MemoryGridPersistence::new();
        let (mut c, _) = controller(&persistence);
        c.delete_task("T2").unwrap();
        assert!(c.tasks().get("T2").is_none());
        assert_eq!(persistence.version("W1"), 0);
    }

    #[test]
    fn test_delete_facility_unplaces_tasks() {
        let persistence = MemoryGridPersistence::new();
        let (mut c, _) = controller(&persistence);
        c.drop_task("T1", "F1", D).unwrap();
        c.drop_task("T2", "F1", D + 5 * DAY_MS).unwrap();
        c.drop_task("T3", "F2", D).unwrap();

        let mut unplaced = c.delete_facility("F1").unwrap();
        unplaced.sort();

        assert_eq!(unplaced, vec!["T1".to_string(), "T2".to_string()]);
        assert!(c.facilities().get("F1").is_none());
        assert_eq!(c.grid().facility_cells("F1").count(), 0);
        assert_eq!(c.grid().facility_cells("F2").count(), 1);
        assert!(!c.tasks().get("T1").unwrap().is_placed());
        assert!(c.tasks().get("T3").unwrap().is_placed());
    }

    #[test]
    fn test_stale_writer_retries_on_latest() {
        let persistence = MemoryGridPersistence::new();
        let (mut a, _) = controller(&persistence);
        let (mut b, _) = controller(&persistence);

        a.drop_task("T1", "F1", D).unwrap();
        b.drop_task("T2", "F1", D + 10 * DAY_MS).unwrap();

        assert_eq!(b.version(), 2);
        assert_eq!(b.grid().task_cells("T1").count(), 3);
        assert_eq!(b.grid().task_cells("T2").count(), 2);
    }

    #[test]
    fn test_stale_writer_conflicts_with_latest() {
        let persistence = MemoryGridPersistence::new();
        let (mut a, _) = controller(&persistence);
        let (mut b, _) = controller(&persistence);

        a.drop_task("T1", "F1", D).unwrap();
        let err = b.drop_task("T2", "F1", D + DAY_MS).unwrap_err();

        assert!(matches!(err, BoardError::CellConflict { .. }));
        assert!(b.grid().is_empty());
        assert_eq!(b.version(), 0);
        assert_eq!(persistence.version("W1"), 1);
    }

    #[test]
    fn test_no_retries_surfaces_version_conflict() {
        let persistence = MemoryGridPersistence::new();
        let (mut a, _) = controller(&persistence);
        let (b, _) = controller(&persistence);
        let mut b = b.with_config(BoardConfig::default().with_max_save_retries(0));

        a.drop_task("T1", "F1", D).unwrap();
        let err = b.drop_task("T2", "F1", D + 10 * DAY_MS).unwrap_err();

        assert!(err.is_transient());
        assert!(matches!(
            err,
            BoardError::Persistence(PersistenceError::VersionConflict { expected: 0, actual: 1, .. })
        ));
    }

    #[test]
    fn test_record_failure_restores_grid() {
        let persistence = MemoryGridPersistence::new();
        let (mut c, _) = controller(&persistence);
        c.tasks_mut().set_unavailable(true);

        let err = c.drop_task("T1", "F1", D).unwrap_err();

        assert!(matches!(err, BoardError::Persistence(PersistenceError::Unavailable(_))));
        assert!(c.grid().is_empty());
        assert_eq!(persistence.version("W1"), 2);
        assert_eq!(c.version(), 2);
        let stored = persistence.load_snapshot("W1").unwrap().unwrap();
        assert!(stored.cells.is_empty());
        assert!(!c.facilities().get("F1").unwrap().has_task("T1"));
    }

    #[test]
    fn test_backend_down_changes_nothing() {
        let persistence = MemoryGridPersistence::new();
        let (mut c, _) = controller(&persistence);
        persistence.set_unavailable(true);

        assert!(c.drop_task("T1", "F1", D).unwrap_err().is_transient());
        assert!(c.grid().is_empty());
        assert!(!c.tasks().get("T1").unwrap().is_placed());
    }

    #[test]
    fn test_apply_remote_only_newer() {
        let persistence = MemoryGridPersistence::new();
        let (mut a, _) = controller(&persistence);
        let (mut b, _) = controller(&persistence);
        a.drop_task("T1", "F1", D).unwrap();

        let latest = persistence.load_snapshot("W1").unwrap().unwrap();
        assert!(b.apply_remote(latest.clone()));
        assert_eq!(b.grid(), a.grid());
        assert!(!b.apply_remote(latest));

        let stale = GridDocument::new("W1");
        assert!(!b.apply_remote(stale));
        assert_eq!(b.version(), 1);
    }

    #[test]
    fn test_watch_and_sync() {
        let persistence = MemoryGridPersistence::new();
        let (mut a, _) = controller(&persistence);
        let (mut b, _) = controller(&persistence);
        let _sub = b.watch();

        a.drop_task("T1", "F1", D).unwrap();
        a.drop_task("T2", "F2", D).unwrap();

        assert_eq!(b.sync_remote(), 2);
        assert_eq!(b.version(), 2);
        assert_eq!(b.grid(), a.grid());
        assert_eq!(b.sync_remote(), 0);
    }

    #[test]
    fn test_load_existing_grid() {
        let persistence = MemoryGridPersistence::new();
        let (mut a, _) = controller(&persistence);
        a.drop_task("T1", "F1", D).unwrap();

        let (mut b, _) = controller(&persistence);
        b.load().unwrap();
        assert_eq!(b.version(), 1);
        assert_eq!(b.grid().len(), 3);
    }

    #[test]
    fn test_listeners_see_committed_events() {
        let persistence = MemoryGridPersistence::new();
        let (mut c, _) = controller(&persistence);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        c.on_change(move |event| sink.lock().push(event.clone()));

        c.drop_task("T1", "F1", D).unwrap();
        let _ = c.drop_task("T2", "F1", D);
        c.drop_task("T1", "F1", D + DAY_MS).unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 3);
        assert!(matches!(&seen[0], GridEvent::Occupied { keys, .. } if keys.len() == 3));
        assert_eq!(
            seen[1],
            GridEvent::Released {
                task_id: "T1".into(),
                cells: 3
            }
        );
    }

    #[test]
    fn test_reindex_facilities() {
        let persistence = MemoryGridPersistence::new();
        let (mut c, _) = controller(&persistence);
        c.facilities_mut()
            .upsert(Facility::new("F1", "W1").with_color("red").with_title("Saw"))
            .unwrap();
        c.facilities_mut()
            .upsert(Facility::new("F2", "W1").with_color("blue").with_title("Lathe"))
            .unwrap();

        c.reindex_facilities().unwrap();

        let order: Vec<String> = c.facilities().list("W1").into_iter().map(|f| f.id).collect();
        assert_eq!(order, vec!["F2".to_string(), "F1".to_string()]);
    }
}
