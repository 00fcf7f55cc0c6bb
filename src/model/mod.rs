//! The in-memory kernel-surface model: file records, descriptor tables,
//! per-task filesystem info, and the process registry that ties them
//! together. See `global::GlobalState` for the owning type.

pub mod access;
pub mod fd_table;
pub mod file_record;
pub mod fs_info;
pub mod global;
pub mod registry;
pub mod task;

pub use access::AccessRecord;
pub use fd_table::FdTable;
pub use file_record::{FileKind, FileRecord, Tristate};
pub use fs_info::FsInfo;
pub use global::GlobalState;
pub use registry::ProcessRegistry;
pub use task::{CloneRendezvous, SyscallState, TaskState};
