use std::cell::RefCell;
use std::rc::Rc;

use crate::handlers::SyscallHandler;

use super::fd_table::FdTable;
use super::fs_info::FsInfo;

/// A task's `Outside`/`Inside` state machine (spec §4.5). No other
/// transitions exist; violating this state machine is a fatal
/// `TracerError::ProtocolViolation` (invariant 8 ties this 1:1 to whether
/// `pending_handler` is populated).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallState {
    Outside,
    Inside,
}

/// The in-flight state of a `clone`-family syscall on its caller: the flags
/// decoded at entry, and the child pid once the event loop has matched it
/// to the rendez-vous (spec §4.5, glossary "clone rendez-vous").
#[derive(Debug, Clone, Copy)]
pub struct CloneRendezvous {
    pub flags: u64,
    pub child: Option<i32>,
}

/// Per-task state (spec §3 `TaskState`). `fd_table` and `fs_info` are
/// `Rc<RefCell<_>>` specifically so that `CLONE_FILES`/`CLONE_FS` sharing is
/// "identity" sharing (invariant 6): two tasks that share can literally
/// hold the same `Rc`, so a write through one is visible through the
/// other, with no synchronization needed because the event loop is
/// single-threaded (§5).
pub struct TaskState {
    pub pid: i32,
    pub fd_table: Rc<RefCell<FdTable>>,
    pub fs_info: Rc<RefCell<FsInfo>>,
    pub syscall_state: SyscallState,
    pub pending_handler: Option<Box<dyn SyscallHandler>>,
    pub clone_rendezvous: Option<CloneRendezvous>,
    pub exiting: bool,
}

impl TaskState {
    pub fn new(pid: i32, fd_table: Rc<RefCell<FdTable>>, fs_info: Rc<RefCell<FsInfo>>) -> Self {
        TaskState {
            pid,
            fd_table,
            fs_info,
            syscall_state: SyscallState::Outside,
            pending_handler: None,
            clone_rendezvous: None,
            exiting: false,
        }
    }

    pub fn workdir(&self) -> String {
        self.fs_info.borrow().workdir.clone()
    }
}
