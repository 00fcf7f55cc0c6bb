//! In-memory kernel-surface model for dockerization-by-observation.
//!
//! This crate is split into a host-independent middle-end (the `model`,
//! `resolver`, `handlers` and `event_loop` modules) and a thin Linux
//! `ptrace`-based front end (`front_end`) that feeds it. The middle-end
//! never calls into `ptrace` directly; it only consumes the [`EventSource`]
//! trait from [`event_loop`].

pub mod csv_dump;
pub mod error;
pub mod event_loop;
pub mod front_end;
pub mod handlers;
pub mod model;
pub mod resolver;
pub mod syscall_nr;

pub use error::TracerError;
pub use event_loop::{Disposition, EventLoop, EventSource};
pub use model::GlobalState;
