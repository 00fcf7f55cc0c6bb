//! `futex` (spec §4.7): a one-shot warning on `FUTEX_FD`, the single futex
//! operation that (pre-2.6.26, but still a valid argument) hands back a
//! file descriptor and so would require FD-table bookkeeping this model
//! doesn't implement.

use crate::event_loop::EventSource;
use crate::model::GlobalState;
use crate::syscall_nr::SYS_FUTEX;

use super::SyscallHandler;

const FUTEX_CMD_MASK: i32 = 0x7f;
const FUTEX_FD: i32 = 2;

#[derive(Default)]
pub struct Futex {
    is_futex_fd: bool,
}

impl SyscallHandler for Futex {
    fn entry(&mut self, _pid: i32, args: &[u64; 6], _source: &dyn EventSource, _global: &GlobalState) {
        let op = args[1] as i32;
        self.is_futex_fd = op & FUTEX_CMD_MASK == FUTEX_FD;
    }

    fn exit(
        &mut self,
        _pid: i32,
        global: &mut GlobalState,
        _source: &dyn EventSource,
        _retval: i64,
        _is_error: bool,
    ) {
        if self.is_futex_fd {
            global.syscall_warn(
                SYS_FUTEX,
                "FUTEX_FD returns a file descriptor this model does not track",
            );
        }
    }
}
