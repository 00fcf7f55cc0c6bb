//! `rename`/`renameat`/`renameat2` (spec §4.7, §9 Open Question: renames are
//! a one-shot warning with no state migration — the model does not move a
//! `FileRecord` between keys, since nothing downstream depends on rename
//! being observed precisely). Grounded on the original's `rename.cpp`/
//! `.hpp`, which likewise never mutates state but does resolve and log
//! both paths (`RenameBase::entryLog`).

use crate::event_loop::EventSource;
use crate::model::GlobalState;
use crate::resolver;
use crate::syscall_nr::{SYS_RENAME, AT_FDCWD};

use super::SyscallHandler;

const MAX_PATH: usize = 4096;

pub struct Rename {
    has_dirfds: bool,
    old_rel: String,
    new_rel: String,
    old_abs: String,
    new_abs: String,
}

impl Rename {
    pub fn for_nr(nr: i64) -> Self {
        Rename {
            has_dirfds: nr != SYS_RENAME,
            old_rel: String::new(),
            new_rel: String::new(),
            old_abs: String::new(),
            new_abs: String::new(),
        }
    }
}

impl Default for Rename {
    fn default() -> Self {
        Rename::for_nr(SYS_RENAME)
    }
}

impl SyscallHandler for Rename {
    fn entry(&mut self, pid: i32, args: &[u64; 6], source: &dyn EventSource, global: &GlobalState) {
        let (old_at, old_arg, new_at, new_arg) = if self.has_dirfds {
            (args[0] as i32, args[1], args[2] as i32, args[3])
        } else {
            (AT_FDCWD, args[0], AT_FDCWD, args[1])
        };
        self.old_rel = source.read_cstring(pid, old_arg, MAX_PATH);
        self.new_rel = source.read_cstring(pid, new_arg, MAX_PATH);
        self.old_abs = resolver::resolve_deleted(global, pid, &self.old_rel, old_at);
        self.new_abs = resolver::resolve_deleted(global, pid, &self.new_rel, new_at);
    }

    fn exit(
        &mut self,
        _pid: i32,
        global: &mut GlobalState,
        _source: &dyn EventSource,
        retval: i64,
        _is_error: bool,
    ) {
        if retval == 0 {
            global.syscall_warn(
                SYS_RENAME,
                "a traced process renamed a file; this model does not migrate file history across renames",
            );
        }
    }

    fn entry_log(&self, _pid: i32, _global: &GlobalState) -> String {
        format!("({} -> {})", self.old_rel, self.new_rel)
    }

    fn exit_log(&self, _pid: i32, _global: &GlobalState, _retval: i64, _is_error: bool) -> String {
        format!("{} -> {}", self.old_abs, self.new_abs)
    }
}
