//! `close` (spec §4.7). Read/write-shaped syscalls are handled generically
//! by `FdTouchHandler` in `mod.rs`; `close` is the one FD-table mutation in
//! this family.

use crate::event_loop::EventSource;
use crate::model::GlobalState;

use super::SyscallHandler;

#[derive(Default)]
pub struct Close {
    fd: i32,
}

impl SyscallHandler for Close {
    fn entry(&mut self, _pid: i32, args: &[u64; 6], _source: &dyn EventSource, _global: &GlobalState) {
        self.fd = args[0] as i32;
    }

    fn exit(&mut self, pid: i32, global: &mut GlobalState, _source: &dyn EventSource, retval: i64, _is_error: bool) {
        // A failed close (EBADF, EINTR) still drops the fd on Linux in every
        // case that matters here, but spec §4.7 only requires removing the
        // binding on success to keep state aligned with what the kernel
        // actually did.
        if retval == 0 {
            global.close_fd(pid, self.fd);
        }
    }

    fn entry_log(&self, _pid: i32, _global: &GlobalState) -> String {
        format!("({})", self.fd)
    }
}
