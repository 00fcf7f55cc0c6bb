use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A single observed attempt at reaching a file: the `(pid, relPath, flags,
/// executable, workdir)` tuple from spec §3. Two opens of the same path by
/// the same task with different flags are distinct `AccessRecord`s — flags
/// participate in equality, per the open question resolved in `DESIGN.md`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessRecord {
    pub pid: i32,
    pub rel_path: PathBuf,
    /// Absent when the file was reached only through a syscall that does
    /// not carry open-flags (e.g. `stat`).
    pub flags: Option<i32>,
    pub executable: bool,
    pub workdir: PathBuf,
}

impl AccessRecord {
    pub fn new(pid: i32, rel_path: impl Into<PathBuf>, workdir: impl Into<PathBuf>) -> Self {
        AccessRecord {
            pid,
            rel_path: rel_path.into(),
            flags: None,
            executable: false,
            workdir: workdir.into(),
        }
    }

    pub fn with_flags(mut self, flags: i32) -> Self {
        self.flags = Some(flags);
        self
    }

    pub fn executable(mut self, executable: bool) -> Self {
        self.executable = executable;
        self
    }
}
