//! `execve`/`execveat` and the `clone`-family (spec §4.7), grounded on the
//! original's `execve.cpp` and `clone.cpp`.

use tracing::warn;

use crate::event_loop::EventSource;
use crate::model::{CloneRendezvous, GlobalState};
use crate::resolver;
use crate::syscall_nr::AT_FDCWD;

use super::SyscallHandler;

const MAX_PATH: usize = 4096;

const CLONE_FILES: u64 = 0x0400;
const CLONE_FS: u64 = 0x0200;
// Overloads the raw `clone(2)` parent_tid argument slot as a pidfd
// write-back pointer since Linux 5.2; mutually exclusive with
// CLONE_PARENT_SETTID. `clone_args.pidfd` is clone3's dedicated field.
const CLONE_PIDFD: u64 = 0x1000;

/// `execve(path, argv, envp)` / `execveat(dirfd, path, argv, envp, flags)`:
/// resolves the target at entry, registers the executable access (chasing
/// any `#!` shebang) at exit, and warns if the model's own success/failure
/// prediction disagreed with what the kernel actually did (spec §7
/// `ExecProbeMismatch`).
#[derive(Default)]
pub struct Exec {
    abs_path: String,
    rel_path: String,
}

impl SyscallHandler for Exec {
    fn entry(&mut self, pid: i32, args: &[u64; 6], source: &dyn EventSource, global: &GlobalState) {
        let (at, path_arg, nofollow) = (AT_FDCWD, args[0], false);
        self.rel_path = source.read_cstring(pid, path_arg, MAX_PATH);
        self.abs_path = resolver::resolve(global, pid, &self.rel_path, at, nofollow);
    }

    fn exit(&mut self, pid: i32, global: &mut GlobalState, _source: &dyn EventSource, retval: i64, _is_error: bool) {
        let predicted_failed = global.exec_file(pid, &self.abs_path, &self.rel_path, 0, true);
        let actually_failed = retval < 0;
        if predicted_failed != actually_failed {
            warn!(
                "exec of {} {} but the model predicted the opposite",
                self.abs_path,
                if actually_failed { "failed" } else { "succeeded" }
            );
        }
    }

    fn entry_log(&self, _pid: i32, _global: &GlobalState) -> String {
        format!("({})", self.rel_path)
    }
}

/// The `execveat` variant additionally takes a `dirfd` and resolves relative
/// to it, honoring `AT_EMPTY_PATH` the same way the resolver already does
/// for an empty `rel_path` (resolves straight to the dirfd's own target).
#[derive(Default)]
pub struct ExecAt {
    abs_path: String,
    rel_path: String,
}

impl SyscallHandler for ExecAt {
    fn entry(&mut self, pid: i32, args: &[u64; 6], source: &dyn EventSource, global: &GlobalState) {
        let at = args[0] as i32;
        self.rel_path = source.read_cstring(pid, args[1], MAX_PATH);
        self.abs_path = resolver::resolve(global, pid, &self.rel_path, at, false);
    }

    fn exit(&mut self, pid: i32, global: &mut GlobalState, _source: &dyn EventSource, retval: i64, _is_error: bool) {
        let predicted_failed = global.exec_file(pid, &self.abs_path, &self.rel_path, 0, true);
        let actually_failed = retval < 0;
        if predicted_failed != actually_failed {
            warn!(
                "exec of {} {} but the model predicted the opposite",
                self.abs_path,
                if actually_failed { "failed" } else { "succeeded" }
            );
        }
    }

    fn entry_log(&self, _pid: i32, _global: &GlobalState) -> String {
        format!("({})", self.rel_path)
    }
}

/// Which of the four syscalls that spawn a new task this handler instance
/// was dispatched for — each decodes its clone flags differently (spec
/// §4.5 "clone rendez-vous").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneKind {
    Clone,
    Clone3,
    Fork,
    VFork,
}

/// `clone`/`clone3`/`fork`/`vfork`: records the caller's `CLONE_FILES`/
/// `CLONE_FS` intent at exit so the event loop can match the new child's
/// first stop to it (`GlobalState::complete_clone_rendezvous`).
pub struct Clone {
    kind: CloneKind,
    flags: u64,
    // Address, in the caller's address space, of the pidfd write-back slot
    // -- only meaningful when `flags & CLONE_PIDFD` is set. Zero means none.
    pidfd_ptr: u64,
}

impl Clone {
    pub fn for_kind(kind: CloneKind) -> Self {
        Clone { kind, flags: 0, pidfd_ptr: 0 }
    }
}

impl SyscallHandler for Clone {
    fn entry(&mut self, pid: i32, args: &[u64; 6], source: &dyn EventSource, _global: &GlobalState) {
        self.flags = match self.kind {
            // clone(flags, stack, ...): flags in the low word of arg 0,
            // CSIGNAL packed into the same word but irrelevant here.
            CloneKind::Clone => args[0],
            // clone3(struct clone_args *, size): struct clone_args { u64
            // flags; ... } -- flags is the struct's first 8-byte field.
            CloneKind::Clone3 => source
                .read_memory(pid, args[0], 8)
                .ok()
                .and_then(|b| b.get(0..8).map(|s| u64::from_ne_bytes(s.try_into().unwrap())))
                .unwrap_or(0),
            // fork()/vfork() take no flags argument; neither shares the FD
            // table or FS info with the caller (both deep-copy on clone).
            CloneKind::Fork | CloneKind::VFork => 0,
        };
        self.pidfd_ptr = match self.kind {
            // clone(flags, stack, parent_tid, child_tid, tls): CLONE_PIDFD
            // overloads the parent_tid slot (arg 2) as the pidfd pointer.
            CloneKind::Clone => args[2],
            // clone_args.pidfd sits at byte offset 8, right after flags.
            CloneKind::Clone3 => source
                .read_memory(pid, args[0] + 8, 8)
                .ok()
                .and_then(|b| b.get(0..8).map(|s| u64::from_ne_bytes(s.try_into().unwrap())))
                .unwrap_or(0),
            CloneKind::Fork | CloneKind::VFork => 0,
        };
    }

    fn exit(&mut self, pid: i32, global: &mut GlobalState, source: &dyn EventSource, retval: i64, _is_error: bool) {
        if retval <= 0 {
            return;
        }
        if let Some(task) = global.registry.get_mut(pid) {
            task.clone_rendezvous = Some(CloneRendezvous {
                flags: self.flags,
                child: None,
            });
        }
        if self.flags & CLONE_PIDFD != 0 && self.pidfd_ptr != 0 {
            if let Some(pidfd) = source
                .read_memory(pid, self.pidfd_ptr, 4)
                .ok()
                .and_then(|b| b.get(0..4).map(|s| i32::from_ne_bytes(s.try_into().unwrap())))
            {
                global.register_process_fd(pid, retval as i32, pidfd);
            }
        }
    }

    fn entry_log(&self, _pid: i32, _global: &GlobalState) -> String {
        let shares_files = self.flags & CLONE_FILES != 0;
        let shares_fs = self.flags & CLONE_FS != 0;
        format!(
            "({:?}, shares_files={}, shares_fs={})",
            self.kind, shares_files, shares_fs
        )
    }
}
