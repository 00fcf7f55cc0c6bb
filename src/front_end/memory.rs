//! `ptrace(2)` `PTRACE_PEEKDATA` memory access: the single primitive
//! `read_memory`/`read_cstring` (spec §6) are built on. Grounded on the
//! teacher's own `read_string_from_tracee` — the word-at-a-time loop and
//! the 4096-byte safety cap are carried over unchanged; `read_memory` is
//! new (the teacher never needed arbitrary-length reads, only
//! NUL-terminated strings).

use nix::sys::ptrace;
use nix::unistd::Pid;

use crate::error::{Result, TracerError};

const MAX_CSTRING: usize = 4096;

/// Reads exactly `len` bytes from the tracee's address space starting at
/// `addr`, one machine word (`PTRACE_PEEKDATA` return value) at a time.
pub fn read_memory(pid: i32, addr: u64, len: usize) -> Result<Vec<u8>> {
    if addr == 0 {
        return Err(TracerError::EventSource(format!(
            "cannot read {len} bytes from a null address in pid {pid}"
        )));
    }
    let tid = Pid::from_raw(pid);
    let mut out = Vec::with_capacity(len);
    let mut cursor = addr;
    while out.len() < len {
        let word = ptrace::read(tid, cursor as *mut libc::c_void).map_err(|errno| {
            TracerError::EventSource(format!(
                "ptrace peek at {cursor:#x} in pid {pid} failed: {errno}"
            ))
        })?;
        out.extend_from_slice(&word.to_ne_bytes());
        cursor += 8;
    }
    out.truncate(len);
    Ok(out)
}

/// Reads a NUL-terminated string, capped at `max` bytes. Best-effort: a
/// `ptrace` failure partway through yields whatever was read so far rather
/// than an error (spec §7 `MemoryReadPartial` — the caller treats a short
/// or empty string as "the model doesn't know", not as a fatal condition).
pub fn read_cstring(pid: i32, addr: u64, max: usize) -> String {
    if addr == 0 {
        return String::new();
    }
    let max = max.min(MAX_CSTRING);
    let tid = Pid::from_raw(pid);
    let mut bytes = Vec::new();
    let mut cursor = addr;
    'words: while bytes.len() < max {
        let word = match ptrace::read(tid, cursor as *mut libc::c_void) {
            Ok(w) => w,
            Err(_) => break,
        };
        for byte in word.to_ne_bytes() {
            if byte == 0 {
                break 'words;
            }
            bytes.push(byte);
            if bytes.len() >= max {
                break 'words;
            }
        }
        cursor += 8;
    }
    String::from_utf8_lossy(&bytes).into_owned()
}
