//! In-memory collaborator implementations.
//!
//! [`MemoryGridPersistence`] behaves like a shared document database: clones
//! share one store, documents are kept serialized, writes are versioned, and
//! subscribers are notified after each successful write. Each store has an
//! `unavailable` switch to simulate backend outages.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};

use super::{FacilityStore, GridPersistence, SnapshotCallback, Subscription, TaskStore};
use crate::error::PersistenceError;
use crate::grid::GridDocument;
use crate::models::{Facility, Task};

fn check_available(unavailable: bool) -> Result<(), PersistenceError> {
    if unavailable {
        Err(PersistenceError::Unavailable("store offline".into()))
    } else {
        Ok(())
    }
}

/// Task records held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryTaskStore {
    tasks: BTreeMap<String, Task>,
    unavailable: bool,
}

impl MemoryTaskStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `tasks`.
    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        Self {
            tasks: tasks.into_iter().map(|t| (t.id.clone(), t)).collect(),
            unavailable: false,
        }
    }

    /// Makes every write fail with `Unavailable`.
    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }

    /// All tasks, by id.
    pub fn all(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Number of tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl TaskStore for MemoryTaskStore {
    fn get(&self, task_id: &str) -> Option<Task> {
        self.tasks.get(task_id).cloned()
    }

    fn upsert(&mut self, task: Task) -> Result<(), PersistenceError> {
        check_available(self.unavailable)?;
        self.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    fn remove(&mut self, task_id: &str) -> Result<Option<Task>, PersistenceError> {
        check_available(self.unavailable)?;
        Ok(self.tasks.remove(task_id))
    }

    fn list(&self, project_id: &str) -> Vec<Task> {
        self.tasks
            .values()
            .filter(|t| t.project_id == project_id)
            .cloned()
            .collect()
    }
}

/// Facility records held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryFacilityStore {
    facilities: BTreeMap<String, Facility>,
    unavailable: bool,
}

impl MemoryFacilityStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `facilities`.
    pub fn with_facilities(facilities: impl IntoIterator<Item = Facility>) -> Self {
        Self {
            facilities: facilities.into_iter().map(|f| (f.id.clone(), f)).collect(),
            unavailable: false,
        }
    }

    /// Makes every write fail with `Unavailable`.
    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }

    /// All facilities, by id.
    pub fn all(&self) -> impl Iterator<Item = &Facility> {
        self.facilities.values()
    }

    fn facility_mut(&mut self, facility_id: &str) -> Result<&mut Facility, PersistenceError> {
        check_available(self.unavailable)?;
        self.facilities
            .get_mut(facility_id)
            .ok_or_else(|| PersistenceError::NotFound(format!("facility {facility_id}")))
    }
}

impl FacilityStore for MemoryFacilityStore {
    fn get(&self, facility_id: &str) -> Option<Facility> {
        self.facilities.get(facility_id).cloned()
    }

    fn attach_task(&mut self, facility_id: &str, task_id: &str) -> Result<(), PersistenceError> {
        self.facility_mut(facility_id)?.attach_task(task_id);
        Ok(())
    }

    fn detach_task(&mut self, facility_id: &str, task_id: &str) -> Result<(), PersistenceError> {
        self.facility_mut(facility_id)?.detach_task(task_id);
        Ok(())
    }

    fn upsert(&mut self, facility: Facility) -> Result<(), PersistenceError> {
        check_available(self.unavailable)?;
        self.facilities.insert(facility.id.clone(), facility);
        Ok(())
    }

    fn remove(&mut self, facility_id: &str) -> Result<Option<Facility>, PersistenceError> {
        check_available(self.unavailable)?;
        Ok(self.facilities.remove(facility_id))
    }

    fn list(&self, workspace_id: &str) -> Vec<Facility> {
        let mut list: Vec<Facility> = self
            .facilities
            .values()
            .filter(|f| f.workspace_id == workspace_id)
            .cloned()
            .collect();
        list.sort_by_key(|f| f.index);
        list
    }
}

struct StoredDocument {
    version: u64,
    json: String,
}

#[derive(Default)]
struct Shared {
    documents: HashMap<String, StoredDocument>,
    subscribers: HashMap<String, Vec<(u64, SnapshotCallback)>>,
    next_subscriber: u64,
    unavailable: bool,
}

/// Versioned grid documents shared by every clone of the handle.
#[derive(Clone, Default)]
pub struct MemoryGridPersistence {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryGridPersistence {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every read and write fail with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.shared.lock().unavailable = unavailable;
    }

    /// Stored version of a workspace document (0 = none).
    pub fn version(&self, workspace_id: &str) -> u64 {
        self.shared
            .lock()
            .documents
            .get(workspace_id)
            .map_or(0, |d| d.version)
    }

    /// Number of live subscriptions on a workspace.
    pub fn subscriber_count(&self, workspace_id: &str) -> usize {
        self.shared
            .lock()
            .subscribers
            .get(workspace_id)
            .map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for MemoryGridPersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.shared.lock();
        f.debug_struct("MemoryGridPersistence")
            .field("documents", &shared.documents.len())
            .field("unavailable", &shared.unavailable)
            .finish()
    }
}

impl GridPersistence for MemoryGridPersistence {
    fn load_snapshot(&self, workspace_id: &str) -> Result<Option<GridDocument>, PersistenceError> {
        let shared = self.shared.lock();
        check_available(shared.unavailable)?;
        match shared.documents.get(workspace_id) {
            None => Ok(None),
            Some(stored) => {
                let mut doc = GridDocument::from_json(&stored.json)?;
                doc.version = stored.version;
                Ok(Some(doc))
            }
        }
    }

    fn save_snapshot(&self, workspace_id: &str, document: &GridDocument) -> Result<u64, PersistenceError> {
        let (stored, listeners) = {
            let mut shared = self.shared.lock();
            check_available(shared.unavailable)?;

            let current = shared.documents.get(workspace_id).map_or(0, |d| d.version);
            if document.version != current {
                return Err(PersistenceError::VersionConflict {
                    workspace_id: workspace_id.to_string(),
                    expected: document.version,
                    actual: current,
                });
            }

            let mut stored = document.clone();
            stored.workspace_id = workspace_id.to_string();
            stored.version = current + 1;
            let json = stored.to_json()?;
            shared.documents.insert(
                workspace_id.to_string(),
                StoredDocument {
                    version: stored.version,
                    json,
                },
            );

            let listeners: Vec<SnapshotCallback> = shared
                .subscribers
                .get(workspace_id)
                .map(|subs| subs.iter().map(|(_, cb)| Arc::clone(cb)).collect())
                .unwrap_or_default();
            (stored, listeners)
        };

        tracing::debug!(
            workspace_id,
            version = stored.version,
            cells = stored.cells.len(),
            "stored grid snapshot"
        );
        for listener in listeners {
            listener(&stored);
        }
        Ok(stored.version)
    }

    fn subscribe(&self, workspace_id: &str, on_change: SnapshotCallback) -> Subscription {
        let id = {
            let mut shared = self.shared.lock();
            let id = shared.next_subscriber;
            shared.next_subscriber += 1;
            shared
                .subscribers
                .entry(workspace_id.to_string())
                .or_default()
                .push((id, on_change));
            id
        };

        let weak: Weak<Mutex<Shared>> = Arc::downgrade(&self.shared);
        let workspace_id = workspace_id.to_string();
        Subscription::new(move || {
            if let Some(shared) = weak.upgrade() {
                let mut shared = shared.lock();
                if let Some(subs) = shared.subscribers.get_mut(&workspace_id) {
                    subs.retain(|(sid, _)| *sid != id);
                }
            }
        })
    }
}
