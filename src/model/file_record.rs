use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::access::AccessRecord;

/// A fact the model has at most partial knowledge of: `Unknown` until some
/// handler observes enough to decide it, then pinned to `False`/`True`.
/// Mirrors the `std::optional<bool>` fields of the original `file_info`
/// (spec §3's tri-state attributes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Tristate {
    #[default]
    Unknown,
    False,
    True,
}

impl Tristate {
    pub fn is_true(self) -> bool {
        matches!(self, Tristate::True)
    }

    pub fn is_known(self) -> bool {
        !matches!(self, Tristate::Unknown)
    }
}

impl From<bool> for Tristate {
    fn from(value: bool) -> Self {
        if value {
            Tristate::True
        } else {
            Tristate::False
        }
    }
}

/// Tag drawn from spec §3's `kind` set. Absent (`None`) until a handler that
/// actually learns the node's type runs (`open`, `mkdir`, `getdents`, ...);
/// plain `stat`/`access` calls deliberately do not set it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    RegularFile,
    Directory,
    Pipe,
    Socket,
    Process,
    BlockDevice,
    CharDevice,
    Symlink,
    Timer,
    Epoll,
    EventFd,
    Other,
}

/// Stable identity for a `FileRecord` independent of the record's storage
/// location — keyed maps (`GlobalState::files`) can't hand out long-lived
/// `&mut` references, so FD tables and access bookkeeping address records
/// through this handle instead. The `Rc<RefCell<..>>`-shared `FdTable`s hold
/// these, not the records themselves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileHandle {
    Path(String),
    NonFile(usize),
}

/// One filesystem node, or one non-filesystem kernel object (pipe, socket,
/// timer, ...). See spec §3 `FileRecord`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// Canonical absolute path for filesystem nodes, or a synthetic name
    /// (e.g. `pipe_read_17`) for unbacked objects.
    pub realpath: String,
    pub accesses: HashSet<AccessRecord>,
    pub was_ever_created: Tristate,
    pub was_ever_deleted: Tristate,
    pub is_currently_on_disk: Tristate,
    /// Set at most once, at record creation (invariant 4); never mutated
    /// afterwards.
    pub was_initially_on_disk: Tristate,
    pub kind: Option<FileKind>,
    /// True iff the task enumerated this directory (`readdir`/`getdents`),
    /// meaning every entry in it is observationally required.
    pub requires_all_children: bool,
}

impl FileRecord {
    /// A record for a path reached for the first time, keyed by `realpath`.
    pub fn new_filesystem(realpath: impl Into<String>, was_initially_on_disk: Tristate) -> Self {
        FileRecord {
            realpath: realpath.into(),
            accesses: HashSet::new(),
            was_ever_created: Tristate::Unknown,
            was_ever_deleted: Tristate::Unknown,
            is_currently_on_disk: was_initially_on_disk,
            was_initially_on_disk,
            kind: None,
            requires_all_children: false,
        }
    }

    /// A record for a kernel object with no path of its own, stored in
    /// `non_file_records` rather than keyed by path.
    pub fn new_unbacked(synthetic_name: impl Into<String>, kind: FileKind) -> Self {
        FileRecord {
            realpath: synthetic_name.into(),
            accesses: HashSet::new(),
            was_ever_created: Tristate::False,
            was_ever_deleted: Tristate::False,
            is_currently_on_disk: Tristate::False,
            was_initially_on_disk: Tristate::False,
            kind: Some(kind),
            requires_all_children: false,
        }
    }

    /// A placeholder standing in for an FD the model never saw created, per
    /// spec §4.2 ("error FD"). All tri-states stay `Unknown`.
    pub fn new_error(synthetic_name: impl Into<String>) -> Self {
        FileRecord {
            realpath: synthetic_name.into(),
            accesses: HashSet::new(),
            was_ever_created: Tristate::Unknown,
            was_ever_deleted: Tristate::Unknown,
            is_currently_on_disk: Tristate::Unknown,
            was_initially_on_disk: Tristate::Unknown,
            kind: None,
            requires_all_children: false,
        }
    }

    /// Idempotent on identical `(pid, relPath, flags, executable, workdir)`
    /// tuples (spec §4.2). Returns whether the access was newly observed.
    pub fn register_access(&mut self, access: AccessRecord) -> bool {
        self.accesses.insert(access)
    }
}
