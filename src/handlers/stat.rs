//! `stat`-family, `access`-family, and `readlink`-family syscalls (spec
//! §4.7): pure probes of the filesystem that never mutate the model,
//! grounded on the original's `stat.hpp` (`StatHandler`/`AccessHandler`/
//! `ReadLinkHandler` — all log-only).

use crate::event_loop::EventSource;
use crate::model::GlobalState;
use crate::resolver;
use crate::syscall_nr::{
    AT_FDCWD, SYS_FACCESSAT, SYS_FACCESSAT2, SYS_FSTAT, SYS_LSTAT, SYS_NEWFSTATAT, SYS_STATX,
};

use super::SyscallHandler;

const MAX_PATH: usize = 4096;

/// Covers `stat`/`fstat`/`lstat`/`newfstatat`/`statx`/`access`/`faccessat`/
/// `faccessat2`. None of these mutate a record's existence tri-states once
/// it has one (spec §4.7: "stat semantics: absence/presence information is
/// not reliable across the trace window") — but the path is still a real
/// observation, so a first-ever probe of a path registers a record for it,
/// seeded from whatever the host shows right now, and every probe logs an
/// access against it. `fstat(fd, buf)` has no path argument at all and is
/// left a pure no-op, same as `FdTouchHandler`.
pub struct StatLike {
    nr: i64,
    nofollow: bool,
    has_path: bool,
    rel_path: String,
    abs_path: String,
}

impl StatLike {
    pub fn for_nr(nr: i64) -> Self {
        StatLike {
            nr,
            nofollow: nr == SYS_LSTAT,
            has_path: nr != SYS_FSTAT,
            rel_path: String::new(),
            abs_path: String::new(),
        }
    }
}

impl SyscallHandler for StatLike {
    fn entry(&mut self, pid: i32, args: &[u64; 6], source: &dyn EventSource, global: &GlobalState) {
        if !self.has_path {
            return;
        }
        let (at, path_arg) = match self.nr {
            // newfstatat/statx/faccessat/faccessat2(dirfd, path, ...): path
            // is the second argument.
            SYS_NEWFSTATAT | SYS_STATX | SYS_FACCESSAT | SYS_FACCESSAT2 => (args[0] as i32, args[1]),
            // stat/lstat/access(path, ...): path is the first argument.
            _ => (AT_FDCWD, args[0]),
        };
        self.rel_path = source.read_cstring(pid, path_arg, MAX_PATH);
        self.abs_path = resolver::resolve(global, pid, &self.rel_path, at, self.nofollow);
    }

    fn exit(
        &mut self,
        pid: i32,
        global: &mut GlobalState,
        _source: &dyn EventSource,
        _retval: i64,
        _is_error: bool,
    ) {
        if !self.has_path {
            return;
        }
        let existed = if self.nofollow {
            std::fs::symlink_metadata(&self.abs_path).is_ok()
        } else {
            std::fs::metadata(&self.abs_path).is_ok()
        };
        global.probe_file(pid, &self.abs_path, &self.rel_path, existed);
    }

    fn entry_log(&self, _pid: i32, _global: &GlobalState) -> String {
        format!("({})", self.rel_path)
    }
}

/// `readlink(path, buf, bufsiz)` / `readlinkat(dirfd, path, buf, bufsiz)`:
/// captures the resolved target string at exit purely for logging, and
/// flags truncation when the kernel filled the caller's buffer completely
/// (`retval == bufsiz`, spec §4.7 — the model does not otherwise track
/// symlink targets).
pub struct Readlink {
    has_dirfd: bool,
    rel_path: String,
    buf_ptr: u64,
    bufsiz: u64,
    target: String,
    truncated: bool,
}

impl Readlink {
    pub fn for_nr(nr: i64) -> Self {
        Readlink {
            has_dirfd: nr == crate::syscall_nr::SYS_READLINKAT,
            rel_path: String::new(),
            buf_ptr: 0,
            bufsiz: 0,
            target: String::new(),
            truncated: false,
        }
    }
}

impl Default for Readlink {
    fn default() -> Self {
        Readlink::for_nr(crate::syscall_nr::SYS_READLINK)
    }
}

impl SyscallHandler for Readlink {
    fn entry(&mut self, pid: i32, args: &[u64; 6], source: &dyn EventSource, _global: &GlobalState) {
        if self.has_dirfd {
            self.rel_path = source.read_cstring(pid, args[1], MAX_PATH);
            self.buf_ptr = args[2];
            self.bufsiz = args[3];
        } else {
            self.rel_path = source.read_cstring(pid, args[0], MAX_PATH);
            self.buf_ptr = args[1];
            self.bufsiz = args[2];
        }
    }

    fn exit(
        &mut self,
        pid: i32,
        _global: &mut GlobalState,
        source: &dyn EventSource,
        retval: i64,
        _is_error: bool,
    ) {
        if retval <= 0 {
            return;
        }
        let len = retval as usize;
        if let Ok(bytes) = source.read_memory(pid, self.buf_ptr, len) {
            self.target = String::from_utf8_lossy(&bytes).into_owned();
        }
        self.truncated = retval as u64 == self.bufsiz;
    }

    fn entry_log(&self, _pid: i32, _global: &GlobalState) -> String {
        format!("({})", self.rel_path)
    }

    fn exit_log(&self, _pid: i32, _global: &GlobalState, _retval: i64, _is_error: bool) -> String {
        if self.target.is_empty() {
            String::new()
        } else if self.truncated {
            format!("-> {} (truncated)", self.target)
        } else {
            format!("-> {}", self.target)
        }
    }
}
