use std::collections::HashMap;

use super::file_record::FileHandle;

/// A task's view of its file descriptors: `fd -> FileHandle` (spec §3
/// `FdTable`, §4.3). Never owns the `FileRecord`s it points at — those live
/// in `GlobalState`; this table only stores the handle used to look them
/// up, which is what makes `Rc<RefCell<FdTable>>` sharing across tasks
/// (invariant 6, P2) safe to implement as a cheap shared reference rather
/// than a deep structural copy.
#[derive(Debug, Clone, Default)]
pub struct FdTable {
    table: HashMap<i32, FileHandle>,
}

impl FdTable {
    pub fn new() -> Self {
        FdTable {
            table: HashMap::new(),
        }
    }

    /// Inserts or replaces the binding for `fd`.
    pub fn bind(&mut self, fd: i32, handle: FileHandle) {
        self.table.insert(fd, handle);
    }

    pub fn lookup(&self, fd: i32) -> Option<&FileHandle> {
        self.table.get(&fd)
    }

    /// Silently tolerates missing keys (spec §4.3).
    pub fn close(&mut self, fd: i32) {
        self.table.remove(&fd);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&i32, &FileHandle)> {
        self.table.iter()
    }
}
