/// Per-task (or shared, via `CLONE_FS`) filesystem context (spec §3/§4.4).
/// `umask` is tracked for completeness but consulted nowhere in this core,
/// matching the original's own comment that it is noted but unused.
#[derive(Debug, Clone)]
pub struct FsInfo {
    pub workdir: String,
    pub chroot: String,
    pub umask: u32,
}

impl FsInfo {
    pub fn new(workdir: impl Into<String>) -> Self {
        FsInfo {
            workdir: workdir.into(),
            chroot: "/".to_string(),
            umask: 0o022,
        }
    }
}
