//! Unbacked-object creation syscalls (spec §4.7): pipes, sockets, eventfds,
//! timerfds, and epoll instances all synthesize a `FileRecord` with no
//! backing path. Grounded on the original's `pipe.cpp`/`.hpp` (`Pipe::exit`
//! reading both fds back out of tracee memory via `userPtrToOwnPtr`, since
//! the kernel — not the handler — chooses them).

use crate::event_loop::EventSource;
use crate::model::GlobalState;

use super::SyscallHandler;

fn read_two_fds(source: &dyn EventSource, pid: i32, addr: u64) -> Option<[i32; 2]> {
    let bytes = source.read_memory(pid, addr, 8).ok()?;
    let a = i32::from_ne_bytes(bytes.get(0..4)?.try_into().ok()?);
    let b = i32::from_ne_bytes(bytes.get(4..8)?.try_into().ok()?);
    Some([a, b])
}

/// `pipe(int[2])` / `pipe2(int[2], flags)`.
#[derive(Default)]
pub struct Pipe {
    fds_ptr: u64,
}

impl SyscallHandler for Pipe {
    fn entry(&mut self, _pid: i32, args: &[u64; 6], _source: &dyn EventSource, _global: &GlobalState) {
        self.fds_ptr = args[0];
    }
    fn exit(
        &mut self,
        pid: i32,
        global: &mut GlobalState,
        source: &dyn EventSource,
        retval: i64,
        _is_error: bool,
    ) {
        if retval != 0 {
            return;
        }
        if let Some(fds) = read_two_fds(source, pid, self.fds_ptr) {
            global.register_pipe(pid, fds);
        }
    }
    fn entry_log(&self, _pid: i32, _global: &GlobalState) -> String {
        format!("(&{:#x})", self.fds_ptr)
    }
}

/// `socket(domain, type, protocol)`.
#[derive(Default)]
pub struct Socket;

impl SyscallHandler for Socket {
    fn entry(&mut self, _pid: i32, _args: &[u64; 6], _source: &dyn EventSource, _global: &GlobalState) {}
    fn exit(
        &mut self,
        pid: i32,
        global: &mut GlobalState,
        _source: &dyn EventSource,
        retval: i64,
        _is_error: bool,
    ) {
        if retval >= 0 {
            global.register_socket(pid, retval as i32);
        }
    }
}

/// `socketpair(domain, type, protocol, int sv[2])`.
#[derive(Default)]
pub struct SocketPair {
    sv_ptr: u64,
}

impl SyscallHandler for SocketPair {
    fn entry(&mut self, _pid: i32, args: &[u64; 6], _source: &dyn EventSource, _global: &GlobalState) {
        self.sv_ptr = args[3];
    }
    fn exit(
        &mut self,
        pid: i32,
        global: &mut GlobalState,
        source: &dyn EventSource,
        retval: i64,
        _is_error: bool,
    ) {
        if retval != 0 {
            return;
        }
        if let Some(fds) = read_two_fds(source, pid, self.sv_ptr) {
            global.register_socket_pair(pid, fds);
        }
    }
}

/// `eventfd(initval, flags)` / `eventfd2`.
#[derive(Default)]
pub struct EventFd;

impl SyscallHandler for EventFd {
    fn entry(&mut self, _pid: i32, _args: &[u64; 6], _source: &dyn EventSource, _global: &GlobalState) {}
    fn exit(
        &mut self,
        pid: i32,
        global: &mut GlobalState,
        _source: &dyn EventSource,
        retval: i64,
        _is_error: bool,
    ) {
        if retval >= 0 {
            global.register_eventfd(pid, retval as i32);
        }
    }
}

/// `timerfd_create(clockid, flags)`.
#[derive(Default)]
pub struct TimerFd;

impl SyscallHandler for TimerFd {
    fn entry(&mut self, _pid: i32, _args: &[u64; 6], _source: &dyn EventSource, _global: &GlobalState) {}
    fn exit(
        &mut self,
        pid: i32,
        global: &mut GlobalState,
        _source: &dyn EventSource,
        retval: i64,
        _is_error: bool,
    ) {
        if retval >= 0 {
            global.register_timer(pid, retval as i32);
        }
    }
}

/// `epoll_create(size)` / `epoll_create1(flags)`.
#[derive(Default)]
pub struct EpollCreate;

impl SyscallHandler for EpollCreate {
    fn entry(&mut self, _pid: i32, _args: &[u64; 6], _source: &dyn EventSource, _global: &GlobalState) {}
    fn exit(
        &mut self,
        pid: i32,
        global: &mut GlobalState,
        _source: &dyn EventSource,
        retval: i64,
        _is_error: bool,
    ) {
        if retval >= 0 {
            global.register_epoll(pid, retval as i32);
        }
    }
}
