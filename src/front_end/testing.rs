//! A host-independent `EventSource` test double: a fixed script of
//! [`Event`]s plus a fake tracee "memory" to answer `read_memory`/
//! `read_cstring` against. Grounded on the `EventHandler`/`Tracee` split in
//! `proot-rs` (`other_examples/.../process-event.rs.rs`), which keeps the
//! tracing-loop *policy* (here: `event_loop::EventLoop`) decoupled from the
//! concrete source of events the same way — so the loop's correctness can
//! be tested without a real tracee at all.

use std::collections::{HashMap, VecDeque};

use crate::error::{Result, TracerError};
use crate::event_loop::{Event, EventSource};

/// Builds up a fixed sequence of events and canned memory contents, then
/// plays the events back one at a time as `EventLoop::run` consumes them.
#[derive(Default)]
pub struct ScriptedEventSource {
    events: VecDeque<Event>,
    cstrings: HashMap<(i32, u64), String>,
    memory: HashMap<(i32, u64), Vec<u8>>,
    continuations: Vec<(i32, Option<i32>)>,
}

impl ScriptedEventSource {
    pub fn new() -> Self {
        ScriptedEventSource::default()
    }

    pub fn push(mut self, event: Event) -> Self {
        self.events.push_back(event);
        self
    }

    /// Registers the string a `read_cstring(pid, addr, _)` call should
    /// return, standing in for a tracee's `argv`/path buffer.
    pub fn with_cstring(mut self, pid: i32, addr: u64, value: impl Into<String>) -> Self {
        self.cstrings.insert((pid, addr), value.into());
        self
    }

    /// Registers the raw bytes a `read_memory(pid, addr, _)` call should
    /// return, standing in for a tracee's `int[2]`/`struct open_how` buffer.
    pub fn with_memory(mut self, pid: i32, addr: u64, bytes: Vec<u8>) -> Self {
        self.memory.insert((pid, addr), bytes);
        self
    }

    /// What `cont` was called with, in order — lets a test assert the loop
    /// forwarded the right signals and didn't stall on any pid.
    pub fn continuations(&self) -> &[(i32, Option<i32>)] {
        &self.continuations
    }
}

impl EventSource for ScriptedEventSource {
    fn next_event(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    fn read_memory(&self, pid: i32, addr: u64, len: usize) -> Result<Vec<u8>> {
        self.memory
            .get(&(pid, addr))
            .map(|bytes| {
                let mut bytes = bytes.clone();
                bytes.truncate(len);
                bytes
            })
            .ok_or_else(|| {
                TracerError::EventSource(format!(
                    "no scripted memory registered for pid {pid} at {addr:#x}"
                ))
            })
    }

    fn read_cstring(&self, pid: i32, addr: u64, _max: usize) -> String {
        self.cstrings.get(&(pid, addr)).cloned().unwrap_or_default()
    }

    fn cont(&mut self, pid: i32, signal: Option<i32>) {
        self.continuations.push((pid, signal));
    }
}
