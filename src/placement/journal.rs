//! Undo journal for task and facility store writes.
//!
//! Store writes of one gesture are applied in order. Before each write the
//! journal records the previous record; if a later write fails, the recorded
//! records are written back in reverse order.

use crate::error::PersistenceError;
use crate::models::{Facility, Task};
use crate::store::{FacilityStore, TaskStore};

/// One store write.
#[derive(Debug, Clone)]
pub(crate) enum StoreOp {
    UpsertTask(Task),
    RemoveTask(String),
    Attach { facility_id: String, task_id: String },
    Detach { facility_id: String, task_id: String },
    UpsertFacility(Facility),
    RemoveFacility(String),
}

enum Undo {
    Task { id: String, previous: Option<Task> },
    Facility { id: String, previous: Option<Facility> },
}

/// Applies `ops`; on failure restores every record touched so far.
pub(crate) fn apply<T, F>(tasks: &mut T, facilities: &mut F, ops: Vec<StoreOp>) -> Result<(), PersistenceError>
where
    T: TaskStore,
    F: FacilityStore,
{
    let mut undo: Vec<Undo> = Vec::with_capacity(ops.len());

    for op in ops {
        let result = match op {
            StoreOp::UpsertTask(task) => {
                undo.push(Undo::Task {
                    id: task.id.clone(),
                    previous: tasks.get(&task.id),
                });
                tasks.upsert(task)
            }
            StoreOp::RemoveTask(id) => {
                undo.push(Undo::Task {
                    previous: tasks.get(&id),
                    id: id.clone(),
                });
                tasks.remove(&id).map(|_| ())
            }
            StoreOp::Attach { facility_id, task_id } => {
                undo.push(Undo::Facility {
                    previous: facilities.get(&facility_id),
                    id: facility_id.clone(),
                });
                facilities.attach_task(&facility_id, &task_id)
            }
            StoreOp::Detach { facility_id, task_id } => {
                undo.push(Undo::Facility {
                    previous: facilities.get(&facility_id),
                    id: facility_id.clone(),
                });
                facilities.detach_task(&facility_id, &task_id)
            }
            StoreOp::UpsertFacility(facility) => {
                undo.push(Undo::Facility {
                    id: facility.id.clone(),
                    previous: facilities.get(&facility.id),
                });
                facilities.upsert(facility)
            }
            StoreOp::RemoveFacility(id) => {
                undo.push(Undo::Facility {
                    previous: facilities.get(&id),
                    id: id.clone(),
                });
                facilities.remove(&id).map(|_| ())
            }
        };

        if let Err(err) = result {
            // the failed op's own entry is restored too; it may have partially applied
            rollback(tasks, facilities, undo);
            return Err(err);
        }
    }
    Ok(())
}

fn rollback<T, F>(tasks: &mut T, facilities: &mut F, undo: Vec<Undo>)
where
    T: TaskStore,
    F: FacilityStore,
{
    for entry in undo.into_iter().rev() {
        let restored = match entry {
            Undo::Task { id, previous: Some(task) } => tasks.upsert(task).map_err(|e| (id, e)),
            Undo::Task { id, previous: None } => tasks.remove(&id).map(|_| ()).map_err(|e| (id, e)),
            Undo::Facility { id, previous: Some(facility) } => {
                facilities.upsert(facility).map_err(|e| (id, e))
            }
            Undo::Facility { id, previous: None } => {
                facilities.remove(&id).map(|_| ()).map_err(|e| (id, e))
            }
        };
        if let Err((id, error)) = restored {
            tracing::warn!(record = %id, error = %error, "failed to restore record during rollback");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryFacilityStore, MemoryTaskStore};

    /// Task store whose writes start failing after a fixed number of successes.
    struct FlakyTasks {
        inner: MemoryTaskStore,
        writes_left: usize,
    }

    impl TaskStore for FlakyTasks {
        fn get(&self, task_id: &str) -> Option<Task> {
            self.inner.get(task_id)
        }

        fn upsert(&mut self, task: Task) -> Result<(), PersistenceError> {
            if self.writes_left == 0 {
                return Err(PersistenceError::Unavailable("flaky".into()));
            }
            self.writes_left -= 1;
            self.inner.upsert(task)
        }

        fn remove(&mut self, task_id: &str) -> Result<Option<Task>, PersistenceError> {
            self.inner.remove(task_id)
        }

        fn list(&self, project_id: &str) -> Vec<Task> {
            self.inner.list(project_id)
        }
    }

    #[test]
    fn test_apply_all() {
        let mut tasks = MemoryTaskStore::with_tasks([Task::new("T1", "P1", "W1")]);
        let mut facilities = MemoryFacilityStore::with_facilities([Facility::new("F1", "W1")]);

        apply(
            &mut tasks,
            &mut facilities,
            vec![
                StoreOp::UpsertTask(Task::new("T1", "P1", "W1").placed_at("F1", 0)),
                StoreOp::Attach {
                    facility_id: "F1".into(),
                    task_id: "T1".into(),
                },
            ],
        )
        .unwrap();

        assert!(tasks.get("T1").unwrap().is_placed());
        assert!(facilities.get("F1").unwrap().has_task("T1"));
    }

    #[test]
    fn test_failure_rolls_back_earlier_writes() {
        let mut facilities = MemoryFacilityStore::with_facilities([Facility::new("F1", "W1")]);
        let mut tasks = FlakyTasks {
            inner: MemoryTaskStore::with_tasks([Task::new("T1", "P1", "W1")]),
            writes_left: 1,
        };

        let err = apply(
            &mut tasks,
            &mut facilities,
            vec![
                StoreOp::Attach {
                    facility_id: "F1".into(),
                    task_id: "T1".into(),
                },
                StoreOp::RemoveTask("T1".into()),
                StoreOp::UpsertTask(Task::new("T2", "P1", "W1")),
                StoreOp::UpsertTask(Task::new("T3", "P1", "W1")), // fails
            ],
        )
        .unwrap_err();

        assert!(matches!(err, PersistenceError::Unavailable(_)));
        assert!(!facilities.get("F1").unwrap().has_task("T1"));
        assert!(tasks.get("T2").is_none());
        // T1 restore is an upsert; the flaky store refuses it, so it stays removed
        assert!(tasks.get("T1").is_none());
    }
}
