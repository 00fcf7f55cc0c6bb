//! The event loop driver (spec §4.8): owns the `GlobalState`, consumes
//! tracer events, and dispatches syscall handlers. This module defines the
//! tracer boundary (`EventSource`, spec §6) that both the real `ptrace`
//! front end and the test double implement.

use tracing::{debug, warn};

use crate::error::{Result, TracerError};
use crate::handlers;
use crate::model::{GlobalState, SyscallState};

/// The extended ptrace-event marker for a `PTRACE_EVENT_{FORK,VFORK,CLONE,
/// EXEC}` stop, as folded into `status >> 8` by the platform tracer. The
/// core doesn't need to act on these beyond letting the tracee continue —
/// the actual state change happens on the triggering syscall's exit.
pub const PTRACE_EVENT_FORK: i32 = 1;
pub const PTRACE_EVENT_VFORK: i32 = 2;
pub const PTRACE_EVENT_CLONE: i32 = 3;
pub const PTRACE_EVENT_EXEC: i32 = 4;
pub const PTRACE_EVENT_VFORK_DONE: i32 = 5;

/// A single demultiplexed occurrence from the platform tracer (spec §6).
#[derive(Debug, Clone)]
pub enum Event {
    SyscallEntry { pid: i32, nr: i64, args: [u64; 6] },
    SyscallExit { pid: i32, retval: i64, is_error: bool },
    Stop { pid: i32, signo: i32, extended: i32 },
    Exit { pid: i32, code: i32 },
    Signalled { pid: i32, signo: i32 },
    Continued { pid: i32 },
}

/// The "platform tracer" collaborator the core consumes (spec §1, §6). The
/// core never calls `ptrace` directly; it only sees this trait.
pub trait EventSource {
    fn next_event(&mut self) -> Option<Event>;
    fn read_memory(&self, pid: i32, addr: u64, len: usize) -> Result<Vec<u8>>;
    fn read_cstring(&self, pid: i32, addr: u64, max: usize) -> String;
    /// Resume `pid`, forwarding `signal` if it is a real signal the tracee
    /// should receive (as opposed to the ptrace-syscall-stop trap itself).
    fn cont(&mut self, pid: i32, signal: Option<i32>);
}

/// What happened to the root task, once it's known (spec §4.8 step 1: "if
/// the task was the root, return its result to the caller").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    RootExited { code: i32 },
    RootSignalled { signal: i32 },
}

/// Owns the `GlobalState` for the duration of one trace and drives it from
/// an `EventSource` (spec §4.8, §5 "single-threaded cooperative").
pub struct EventLoop {
    pub global: GlobalState,
    log_syscalls: bool,
}

impl EventLoop {
    pub fn new(global: GlobalState, log_syscalls: bool) -> Self {
        EventLoop {
            global,
            log_syscalls,
        }
    }

    /// Runs until the root task terminates or the event source is
    /// exhausted. Returns the root's termination disposition, or `None` if
    /// the source ran dry without ever reporting one (e.g. a scripted test
    /// double that stops short).
    pub fn run(&mut self, source: &mut dyn EventSource) -> Result<Option<Disposition>> {
        while let Some(event) = source.next_event() {
            if let Some(disposition) = self.step(source, event)? {
                return Ok(Some(disposition));
            }
        }
        Ok(None)
    }

    /// Processes one event to completion (spec §4.8's numbered procedure).
    /// Returns `Some(disposition)` iff this event was the root task's
    /// termination.
    pub fn step(
        &mut self,
        source: &mut dyn EventSource,
        event: Event,
    ) -> Result<Option<Disposition>> {
        match event {
            Event::Exit { pid, code } => {
                self.global.mark_exiting(pid);
                if self.global.root_pid == Some(pid) {
                    return Ok(Some(Disposition::RootExited { code }));
                }
            }
            Event::Signalled { pid, signo } => {
                self.global.mark_exiting(pid);
                if self.global.root_pid == Some(pid) {
                    return Ok(Some(Disposition::RootSignalled { signal: signo }));
                }
            }
            Event::Stop { pid, signo, extended } => {
                self.handle_stop(source, pid, signo, extended);
            }
            Event::SyscallEntry { pid, nr, args } => {
                self.handle_entry(source, pid, nr, args)?;
                source.cont(pid, None);
            }
            Event::SyscallExit {
                pid,
                retval,
                is_error,
            } => {
                self.handle_exit(source, pid, retval, is_error)?;
                source.cont(pid, None);
            }
            Event::Continued { pid } => {
                source.cont(pid, None);
            }
        }
        Ok(None)
    }

    fn handle_stop(&mut self, source: &mut dyn EventSource, pid: i32, signo: i32, extended: i32) {
        let is_ptrace_event_stop = matches!(
            extended,
            PTRACE_EVENT_FORK | PTRACE_EVENT_VFORK | PTRACE_EVENT_CLONE | PTRACE_EVENT_EXEC
                | PTRACE_EVENT_VFORK_DONE
        );
        if is_ptrace_event_stop {
            source.cont(pid, None);
        } else {
            // A real signal the tracee should receive, not one of our own
            // syscall-boundary traps.
            source.cont(pid, Some(signo));
        }
    }

    fn handle_entry(
        &mut self,
        source: &mut dyn EventSource,
        pid: i32,
        nr: i64,
        args: [u64; 6],
    ) -> Result<()> {
        if !self.global.registry.contains(pid) {
            if !self.global.complete_clone_rendezvous(pid) {
                self.global.track_new_process(pid);
            }
        }
        if self.global.syscall_state(pid) == SyscallState::Inside {
            return Err(TracerError::ProtocolViolation {
                pid,
                detail: "syscall entry observed while already Inside".to_string(),
            });
        }

        let mut handler = handlers::dispatch(nr);
        handler.entry(pid, &args, source, &self.global);
        if self.log_syscalls {
            debug!(pid, "{}", handler.entry_log(pid, &self.global));
        }

        let task = self
            .global
            .registry
            .get_mut(pid)
            .expect("just created above");
        task.pending_handler = Some(handler);
        self.global.set_syscall_state(pid, SyscallState::Inside);
        Ok(())
    }

    fn handle_exit(
        &mut self,
        source: &mut dyn EventSource,
        pid: i32,
        retval: i64,
        is_error: bool,
    ) -> Result<()> {
        if self.global.syscall_state(pid) != SyscallState::Inside {
            return Err(TracerError::ProtocolViolation {
                pid,
                detail: "syscall exit observed while Outside".to_string(),
            });
        }
        let mut handler = self
            .global
            .registry
            .get_mut(pid)
            .and_then(|t| t.pending_handler.take())
            .expect("invariant 8: Inside implies pending_handler is Some");

        handler.exit(pid, &mut self.global, source, retval, is_error);
        if self.log_syscalls {
            let log = handler.exit_log(pid, &self.global, retval, is_error);
            if !log.is_empty() {
                debug!(pid, "{log}");
            }
        }
        self.global.set_syscall_state(pid, SyscallState::Outside);
        Ok(())
    }

    /// Best-effort `SIGINT` to every known pid (spec §5 "Cancellation").
    /// Sent directly via `kill(2)` rather than through `EventSource`,
    /// because this is a termination request to the tracee, not a signal
    /// to forward at its next syscall stop.
    pub fn cancel(&self) {
        warn!("propagating cancellation to all traced pids; this is not deterministic");
        let pids: Vec<i32> = self.global.registry.iter().map(|(&pid, _)| pid).collect();
        for pid in pids {
            unsafe {
                libc::kill(pid, libc::SIGINT);
            }
        }
    }
}
