//! `open`/`openat`/`openat2`/`creat` (spec §4.7).

use crate::event_loop::EventSource;
use crate::model::GlobalState;
use crate::resolver;
use crate::syscall_nr::AT_FDCWD;

use super::SyscallHandler;

const O_CREAT: i32 = 0o100;
const O_NOFOLLOW: i32 = 0o400000;
const MAX_PATH: usize = 4096;

#[derive(Default)]
struct OpenCommon {
    rel_path: String,
    resolved_path: String,
    flags: i32,
    existed: bool,
}

impl OpenCommon {
    fn prepare(&mut self, pid: i32, global: &GlobalState, at: i32, rel_path: String, flags: i32) {
        self.rel_path = rel_path;
        self.flags = flags;
        let nofollow = flags & O_NOFOLLOW != 0;
        self.resolved_path = resolver::resolve(global, pid, &self.rel_path, at, nofollow);
        self.existed = std::fs::symlink_metadata(&self.resolved_path).is_ok();
    }

    fn commit(&self, pid: i32, global: &mut GlobalState, retval: i64) {
        if retval >= 0 {
            let fd = retval as i32;
            global.open_handling(
                pid,
                &self.resolved_path,
                &self.rel_path,
                fd,
                self.flags,
                self.existed,
            );
        }
    }

    fn log(&self) -> String {
        format!("({})", self.rel_path)
    }
}

#[derive(Default)]
pub struct Open(OpenCommon);

impl SyscallHandler for Open {
    fn entry(&mut self, pid: i32, args: &[u64; 6], source: &dyn EventSource, global: &GlobalState) {
        let rel_path = source.read_cstring(pid, args[0], MAX_PATH);
        let flags = args[1] as i32;
        self.0.prepare(pid, global, AT_FDCWD, rel_path, flags);
    }
    fn exit(&mut self, pid: i32, global: &mut GlobalState, _source: &dyn EventSource, retval: i64, _is_error: bool) {
        self.0.commit(pid, global, retval);
    }
    fn entry_log(&self, _pid: i32, _global: &GlobalState) -> String {
        self.0.log()
    }
}

#[derive(Default)]
pub struct OpenAt(OpenCommon);

impl SyscallHandler for OpenAt {
    fn entry(&mut self, pid: i32, args: &[u64; 6], source: &dyn EventSource, global: &GlobalState) {
        let at = args[0] as i32;
        let rel_path = source.read_cstring(pid, args[1], MAX_PATH);
        let flags = args[2] as i32;
        self.0.prepare(pid, global, at, rel_path, flags);
    }
    fn exit(&mut self, pid: i32, global: &mut GlobalState, _source: &dyn EventSource, retval: i64, _is_error: bool) {
        self.0.commit(pid, global, retval);
    }
    fn entry_log(&self, _pid: i32, _global: &GlobalState) -> String {
        self.0.log()
    }
}

/// `openat2` carries its flags inside a `struct open_how` the kernel reads
/// from tracee memory, rather than as a plain integer argument.
#[derive(Default)]
pub struct OpenAt2(OpenCommon);

impl SyscallHandler for OpenAt2 {
    fn entry(&mut self, pid: i32, args: &[u64; 6], source: &dyn EventSource, global: &GlobalState) {
        let at = args[0] as i32;
        let rel_path = source.read_cstring(pid, args[1], MAX_PATH);
        // struct open_how { u64 flags; u64 mode; u64 resolve; } -- flags is
        // the first 8-byte field.
        let flags = source
            .read_memory(pid, args[2], 8)
            .ok()
            .and_then(|bytes| bytes.get(0..8).map(|b| u64::from_ne_bytes(b.try_into().unwrap())))
            .unwrap_or(0) as i32;
        self.0.prepare(pid, global, at, rel_path, flags);
    }
    fn exit(&mut self, pid: i32, global: &mut GlobalState, _source: &dyn EventSource, retval: i64, _is_error: bool) {
        self.0.commit(pid, global, retval);
    }
    fn entry_log(&self, _pid: i32, _global: &GlobalState) -> String {
        self.0.log()
    }
}

/// `creat(path, mode)` is `open(path, O_CREAT|O_WRONLY|O_TRUNC, mode)`.
#[derive(Default)]
pub struct Creat(OpenCommon);

impl SyscallHandler for Creat {
    fn entry(&mut self, pid: i32, args: &[u64; 6], source: &dyn EventSource, global: &GlobalState) {
        let rel_path = source.read_cstring(pid, args[0], MAX_PATH);
        const O_WRONLY: i32 = 0o1;
        const O_TRUNC: i32 = 0o1000;
        self.0
            .prepare(pid, global, AT_FDCWD, rel_path, O_CREAT | O_WRONLY | O_TRUNC);
    }
    fn exit(&mut self, pid: i32, global: &mut GlobalState, _source: &dyn EventSource, retval: i64, _is_error: bool) {
        self.0.commit(pid, global, retval);
    }
    fn entry_log(&self, _pid: i32, _global: &GlobalState) -> String {
        self.0.log()
    }
}
