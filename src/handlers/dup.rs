//! `dup`/`dup2`/`dup3`/`fcntl(F_DUPFD*)` (spec §4.7): all alias an existing
//! fd under a new number via `GlobalState::alias_fd`, grounded on the
//! original's `dup.cpp` dispatch.

use crate::event_loop::EventSource;
use crate::model::GlobalState;

use super::SyscallHandler;

const F_DUPFD: i64 = 0;
const F_DUPFD_CLOEXEC: i64 = 1030;

#[derive(Default)]
pub struct Dup {
    oldfd: i32,
}

impl SyscallHandler for Dup {
    fn entry(&mut self, _pid: i32, args: &[u64; 6], _source: &dyn EventSource, _global: &GlobalState) {
        self.oldfd = args[0] as i32;
    }
    fn exit(&mut self, pid: i32, global: &mut GlobalState, _source: &dyn EventSource, retval: i64, _is_error: bool) {
        if retval >= 0 {
            global.alias_fd(pid, retval as i32, self.oldfd);
        }
    }
    fn entry_log(&self, _pid: i32, _global: &GlobalState) -> String {
        format!("({})", self.oldfd)
    }
}

#[derive(Default)]
pub struct Dup2 {
    oldfd: i32,
    newfd: i32,
}

impl SyscallHandler for Dup2 {
    fn entry(&mut self, _pid: i32, args: &[u64; 6], _source: &dyn EventSource, _global: &GlobalState) {
        self.oldfd = args[0] as i32;
        self.newfd = args[1] as i32;
    }
    fn exit(&mut self, pid: i32, global: &mut GlobalState, _source: &dyn EventSource, retval: i64, _is_error: bool) {
        // dup2(fd, fd) is a documented no-op: the kernel returns fd without
        // closing or reopening anything.
        if retval >= 0 && self.oldfd != self.newfd {
            global.alias_fd(pid, self.newfd, self.oldfd);
        }
    }
    fn entry_log(&self, _pid: i32, _global: &GlobalState) -> String {
        format!("({}, {})", self.oldfd, self.newfd)
    }
}

#[derive(Default)]
pub struct Dup3 {
    oldfd: i32,
    newfd: i32,
}

impl SyscallHandler for Dup3 {
    fn entry(&mut self, _pid: i32, args: &[u64; 6], _source: &dyn EventSource, _global: &GlobalState) {
        self.oldfd = args[0] as i32;
        self.newfd = args[1] as i32;
    }
    fn exit(&mut self, pid: i32, global: &mut GlobalState, _source: &dyn EventSource, retval: i64, _is_error: bool) {
        if retval >= 0 {
            global.alias_fd(pid, self.newfd, self.oldfd);
        }
    }
    fn entry_log(&self, _pid: i32, _global: &GlobalState) -> String {
        format!("({}, {})", self.oldfd, self.newfd)
    }
}

/// Only the `F_DUPFD`/`F_DUPFD_CLOEXEC` commands alias an fd; every other
/// `fcntl` command is a no-op for this model (spec §4.7).
#[derive(Default)]
pub struct Fcntl {
    fd: i32,
    cmd: i64,
}

impl SyscallHandler for Fcntl {
    fn entry(&mut self, _pid: i32, args: &[u64; 6], _source: &dyn EventSource, _global: &GlobalState) {
        self.fd = args[0] as i32;
        self.cmd = args[1] as i64;
    }
    fn exit(&mut self, pid: i32, global: &mut GlobalState, _source: &dyn EventSource, retval: i64, _is_error: bool) {
        if retval >= 0 && matches!(self.cmd, F_DUPFD | F_DUPFD_CLOEXEC) {
            global.alias_fd(pid, retval as i32, self.fd);
        }
    }
    fn entry_log(&self, _pid: i32, _global: &GlobalState) -> String {
        format!("({}, {})", self.fd, self.cmd)
    }
}
