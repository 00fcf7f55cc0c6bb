use std::collections::HashMap;

use super::task::TaskState;

/// `pid -> TaskState` (spec §3 `ProcessRegistry`). Deliberately thin: the
/// policy for *how* a task gets created (stdio pre-population, FD-table/
/// FS-info sharing, clone-rendez-vous matching) lives on `GlobalState`,
/// which is the only thing that can also allocate the file records those
/// policies need. This type is just the keyed storage plus the handful of
/// lookups every caller needs.
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    tasks: HashMap<i32, TaskState>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        ProcessRegistry {
            tasks: HashMap::new(),
        }
    }

    pub fn get(&self, pid: i32) -> Option<&TaskState> {
        self.tasks.get(&pid)
    }

    pub fn get_mut(&mut self, pid: i32) -> Option<&mut TaskState> {
        self.tasks.get_mut(&pid)
    }

    pub fn contains(&self, pid: i32) -> bool {
        self.tasks.contains_key(&pid)
    }

    pub fn insert(&mut self, task: TaskState) {
        self.tasks.insert(task.pid, task);
    }

    pub fn remove(&mut self, pid: i32) -> Option<TaskState> {
        self.tasks.remove(&pid)
    }

    /// Tasks with an unmatched clone rendez-vous (`clone_rendezvous.child ==
    /// None`), in the order the map happens to iterate them — mirrors the
    /// teacher's `getProcesState` loop, which likewise takes the first
    /// match rather than verifying ptrace ancestry (spec §4.5 notes real
    /// ancestry as the intended discriminant but the reference
    /// implementation doesn't check it either).
    pub fn pending_clone_rendezvous_pids(&self) -> Vec<i32> {
        self.tasks
            .values()
            .filter(|t| {
                t.clone_rendezvous
                    .map(|r| r.child.is_none())
                    .unwrap_or(false)
            })
            .map(|t| t.pid)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&i32, &TaskState)> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
