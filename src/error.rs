//! Typed fatal error taxonomy.
//!
//! Only the conditions the source expressed as `assert()` calls are modeled
//! as `Err` here (§7 "fatal", §4.5 "fatal assertion failures"). Every other
//! condition in §7's taxonomy (`MemoryReadPartial`, `PathResolution`,
//! `UnknownFD`, `UnknownSyscall`, `ExecProbeMismatch`) is recoverable by
//! definition and is folded into the model as a warning instead of an
//! error return — see `tracing::warn!` call sites in `handlers` and
//! `resolver`.

use thiserror::Error;

/// A condition that makes the trace unusable and aborts the event loop.
#[derive(Debug, Error)]
pub enum TracerError {
    /// The platform tracer handed us a decode that cannot correspond to any
    /// real syscall boundary (e.g. a syscall-entry whose return-value slot
    /// was not `-ENOSYS`, or a `clone3` struct of the wrong size).
    #[error("tracer decode is inconsistent with the ptrace protocol: {0}")]
    Decode(String),

    /// A task's `Outside`/`Inside` state machine (§4.5) was violated: an
    /// exit was observed while `Outside`, or an entry while already
    /// `Inside`. This can only happen if the platform tracer itself is
    /// buggy or events were dropped.
    #[error("syscall entry/exit protocol violated for pid {pid}: {detail}")]
    ProtocolViolation { pid: i32, detail: String },

    /// The event source reported an operation failure it cannot recover
    /// from on its own (process spawn failure, `waitpid` returning an
    /// unexpected errno other than `ECHILD`).
    #[error("event source failed: {0}")]
    EventSource(String),
}

pub type Result<T> = std::result::Result<T, TracerError>;
