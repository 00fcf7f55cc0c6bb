//! Directory and unlink-family syscalls (spec §4.7), grounded on the
//! original's `unlink.cpp`/`.hpp` (`UnlinkBase`/`RmdirBase`/`UnlinkAt`'s
//! `AT_REMOVEDIR` dispatch) and the chdir/mkdir handlers of the same
//! family.

use crate::event_loop::EventSource;
use crate::model::GlobalState;
use crate::resolver;
use crate::syscall_nr::AT_FDCWD;

use super::SyscallHandler;

const MAX_PATH: usize = 4096;
const AT_REMOVEDIR: i32 = 0x200;

#[derive(Default)]
pub struct Chdir {
    rel_path: String,
    abs_path: String,
}

impl SyscallHandler for Chdir {
    fn entry(&mut self, pid: i32, args: &[u64; 6], source: &dyn EventSource, global: &GlobalState) {
        self.rel_path = source.read_cstring(pid, args[0], MAX_PATH);
        self.abs_path = resolver::resolve(global, pid, &self.rel_path, AT_FDCWD, false);
    }
    fn exit(&mut self, pid: i32, global: &mut GlobalState, _source: &dyn EventSource, retval: i64, _is_error: bool) {
        if retval == 0 {
            global.change_directory(pid, self.abs_path.clone());
        }
    }
    fn entry_log(&self, _pid: i32, _global: &GlobalState) -> String {
        format!("({})", self.rel_path)
    }
}

#[derive(Default)]
pub struct Fchdir {
    fd: i32,
}

impl SyscallHandler for Fchdir {
    fn entry(&mut self, _pid: i32, args: &[u64; 6], _source: &dyn EventSource, _global: &GlobalState) {
        self.fd = args[0] as i32;
    }
    fn exit(&mut self, pid: i32, global: &mut GlobalState, _source: &dyn EventSource, retval: i64, _is_error: bool) {
        if retval == 0 {
            global.change_directory_via_fd(pid, self.fd);
        }
    }
    fn entry_log(&self, _pid: i32, _global: &GlobalState) -> String {
        format!("({})", self.fd)
    }
}

#[derive(Default)]
pub struct Mkdir {
    rel_path: String,
    abs_path: String,
}

impl SyscallHandler for Mkdir {
    fn entry(&mut self, pid: i32, args: &[u64; 6], source: &dyn EventSource, global: &GlobalState) {
        self.rel_path = source.read_cstring(pid, args[0], MAX_PATH);
        self.abs_path = resolver::resolve_deleted(global, pid, &self.rel_path, AT_FDCWD);
    }
    fn exit(&mut self, pid: i32, global: &mut GlobalState, _source: &dyn EventSource, retval: i64, _is_error: bool) {
        if retval == 0 {
            global.create_directory(pid, &self.abs_path, &self.rel_path);
        }
    }
    fn entry_log(&self, _pid: i32, _global: &GlobalState) -> String {
        format!("({})", self.rel_path)
    }
}

#[derive(Default)]
pub struct MkdirAt {
    rel_path: String,
    abs_path: String,
}

impl SyscallHandler for MkdirAt {
    fn entry(&mut self, pid: i32, args: &[u64; 6], source: &dyn EventSource, global: &GlobalState) {
        let at = args[0] as i32;
        self.rel_path = source.read_cstring(pid, args[1], MAX_PATH);
        self.abs_path = resolver::resolve_deleted(global, pid, &self.rel_path, at);
    }
    fn exit(&mut self, pid: i32, global: &mut GlobalState, _source: &dyn EventSource, retval: i64, _is_error: bool) {
        if retval == 0 {
            global.create_directory(pid, &self.abs_path, &self.rel_path);
        }
    }
    fn entry_log(&self, _pid: i32, _global: &GlobalState) -> String {
        format!("({})", self.rel_path)
    }
}

#[derive(Default)]
pub struct Rmdir {
    rel_path: String,
    abs_path: String,
}

impl SyscallHandler for Rmdir {
    fn entry(&mut self, pid: i32, args: &[u64; 6], source: &dyn EventSource, global: &GlobalState) {
        self.rel_path = source.read_cstring(pid, args[0], MAX_PATH);
        self.abs_path = resolver::resolve_deleted(global, pid, &self.rel_path, AT_FDCWD);
    }
    fn exit(&mut self, pid: i32, global: &mut GlobalState, _source: &dyn EventSource, retval: i64, _is_error: bool) {
        if retval == 0 {
            global.remove_directory(pid, &self.abs_path);
        }
    }
    fn entry_log(&self, _pid: i32, _global: &GlobalState) -> String {
        format!("({})", self.rel_path)
    }
}

#[derive(Default)]
pub struct Unlink {
    rel_path: String,
    abs_path: String,
}

impl SyscallHandler for Unlink {
    fn entry(&mut self, pid: i32, args: &[u64; 6], source: &dyn EventSource, global: &GlobalState) {
        self.rel_path = source.read_cstring(pid, args[0], MAX_PATH);
        self.abs_path = resolver::resolve_deleted(global, pid, &self.rel_path, AT_FDCWD);
    }
    fn exit(&mut self, pid: i32, global: &mut GlobalState, _source: &dyn EventSource, retval: i64, _is_error: bool) {
        if retval == 0 {
            global.remove_non_directory(pid, &self.abs_path);
        }
    }
    fn entry_log(&self, _pid: i32, _global: &GlobalState) -> String {
        format!("({})", self.rel_path)
    }
}

/// Dispatches between `remove_directory`/`remove_non_directory` at exit
/// based on the `AT_REMOVEDIR` flag, exactly as `UnlinkAt::exit` does in
/// the original.
#[derive(Default)]
pub struct UnlinkAt {
    rel_path: String,
    abs_path: String,
    removedir: bool,
}

impl SyscallHandler for UnlinkAt {
    fn entry(&mut self, pid: i32, args: &[u64; 6], source: &dyn EventSource, global: &GlobalState) {
        let at = args[0] as i32;
        self.rel_path = source.read_cstring(pid, args[1], MAX_PATH);
        let flags = args[2] as i32;
        self.removedir = flags & AT_REMOVEDIR != 0;
        self.abs_path = resolver::resolve_deleted(global, pid, &self.rel_path, at);
    }
    fn exit(&mut self, pid: i32, global: &mut GlobalState, _source: &dyn EventSource, retval: i64, _is_error: bool) {
        if retval != 0 {
            return;
        }
        if self.removedir {
            global.remove_directory(pid, &self.abs_path);
        } else {
            global.remove_non_directory(pid, &self.abs_path);
        }
    }
    fn entry_log(&self, _pid: i32, _global: &GlobalState) -> String {
        format!("({}, removedir={})", self.rel_path, self.removedir)
    }
}

/// `getdents`/`getdents64`: marks the directory behind `fd` as fully
/// enumerated (spec §4.7 "every entry in it becomes observationally
/// required").
#[derive(Default)]
pub struct Getdents {
    fd: i32,
}

impl SyscallHandler for Getdents {
    fn entry(&mut self, _pid: i32, args: &[u64; 6], _source: &dyn EventSource, _global: &GlobalState) {
        self.fd = args[0] as i32;
    }
    fn exit(&mut self, pid: i32, global: &mut GlobalState, _source: &dyn EventSource, retval: i64, _is_error: bool) {
        if retval > 0 {
            global.mark_directory_listed(pid, self.fd);
        }
    }
    fn entry_log(&self, _pid: i32, _global: &GlobalState) -> String {
        format!("({})", self.fd)
    }
}
