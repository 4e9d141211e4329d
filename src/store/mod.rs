//! Collaborator interfaces consumed by the placement core.
//!
//! The core never owns the task list, the facility list, or the remote
//! grid document. It reaches them through these traits so that a cloud
//! document store, a test double, or the in-memory implementations in
//! [`memory`] can be injected.
//!
//! # Consistency Model
//! Grid documents are written whole. [`GridPersistence::save_snapshot`] is a
//! compare-and-swap on the document version, so a writer holding a stale
//! copy is told so instead of silently discarding another client's change.

pub mod memory;

pub use memory::{MemoryFacilityStore, MemoryGridPersistence, MemoryTaskStore};

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

use crate::error::PersistenceError;
use crate::grid::GridDocument;
use crate::models::{Facility, Task};
use crate::view::ViewKind;

/// Task records.
pub trait TaskStore {
    /// Looks a task up.
    fn get(&self, task_id: &str) -> Option<Task>;

    /// Inserts or replaces a task.
    fn upsert(&mut self, task: Task) -> Result<(), PersistenceError>;

    /// Deletes a task, returning the removed record.
    fn remove(&mut self, task_id: &str) -> Result<Option<Task>, PersistenceError>;

    /// Tasks of a project.
    fn list(&self, project_id: &str) -> Vec<Task>;
}

/// Facility records.
pub trait FacilityStore {
    /// Looks a facility up.
    fn get(&self, facility_id: &str) -> Option<Facility>;

    /// Adds a task id to a facility's task list.
    fn attach_task(&mut self, facility_id: &str, task_id: &str) -> Result<(), PersistenceError>;

    /// Removes a task id from a facility's task list.
    fn detach_task(&mut self, facility_id: &str, task_id: &str) -> Result<(), PersistenceError>;

    /// Inserts or replaces a facility.
    fn upsert(&mut self, facility: Facility) -> Result<(), PersistenceError>;

    /// Deletes a facility, returning the removed record.
    fn remove(&mut self, facility_id: &str) -> Result<Option<Facility>, PersistenceError>;

    /// Facilities of a workspace, in `index` order.
    fn list(&self, workspace_id: &str) -> Vec<Facility>;
}

/// Callback invoked with every stored revision of a watched document.
pub type SnapshotCallback = Arc<dyn Fn(&GridDocument) + Send + Sync>;

/// Remote grid documents, one per workspace.
pub trait GridPersistence {
    /// Reads the current document, if one was ever stored.
    fn load_snapshot(&self, workspace_id: &str) -> Result<Option<GridDocument>, PersistenceError>;

    /// Writes `document` if its `version` equals the stored version
    /// (0 when nothing is stored). Returns the new version.
    fn save_snapshot(&self, workspace_id: &str, document: &GridDocument) -> Result<u64, PersistenceError>;

    /// Watches a workspace document. Dropping the handle unsubscribes.
    fn subscribe(&self, workspace_id: &str, on_change: SnapshotCallback) -> Subscription;
}

/// Handle of a live subscription; unsubscribes when dropped.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wraps the backend's cancellation routine.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle with nothing to cancel.
    pub fn detached() -> Self {
        Self { cancel: None }
    }

    /// Unsubscribes now.
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Externally driven zoom selection.
pub trait ViewSelection {
    /// Currently selected view.
    fn selected(&self) -> ViewKind;
}

impl ViewSelection for ViewKind {
    fn selected(&self) -> ViewKind {
        *self
    }
}

/// Selection shared between the UI that changes it and the core that reads it.
#[derive(Debug, Clone, Default)]
pub struct SharedSelection {
    inner: Arc<Mutex<ViewKind>>,
}

impl SharedSelection {
    /// Creates a selection.
    pub fn new(kind: ViewKind) -> Self {
        Self {
            inner: Arc::new(Mutex::new(kind)),
        }
    }

    /// Changes the selection.
    pub fn select(&self, kind: ViewKind) {
        *self.inner.lock() = kind;
    }
}

impl ViewSelection for SharedSelection {
    fn selected(&self) -> ViewKind {
        *self.inner.lock()
    }
}
