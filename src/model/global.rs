use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::rc::Rc;

use tracing::warn;

use super::access::AccessRecord;
use super::fd_table::FdTable;
use super::file_record::{FileHandle, FileKind, FileRecord, Tristate};
use super::fs_info::FsInfo;
use super::registry::ProcessRegistry;
use super::task::{CloneRendezvous, SyscallState, TaskState};

const CLONE_FILES: u64 = 0x0400;
const CLONE_FS: u64 = 0x0200;

/// The owning state of the whole trace: the process registry plus the file
/// record store (spec §3 `GlobalState`). Exclusively owned by the event
/// loop (§5 "no process-wide singletons") and borrowed mutably by each
/// handler's `exit`.
pub struct GlobalState {
    pub registry: ProcessRegistry,
    files: HashMap<String, FileRecord>,
    non_file_records: Vec<FileRecord>,
    syscall_warnings: HashSet<i64>,
    pub root_pid: Option<i32>,
    pub initial_workdir: String,
    pub initial_env: Vec<(String, String)>,
    pub initial_argv: Vec<String>,

    first_process_initialised: bool,
    pipe_count: u64,
    socket_count: u64,
    process_fd_count: u64,
    timer_count: u64,
    epoll_count: u64,
    event_count: u64,
    error_count: u64,
    shebang_depth_limit: usize,
}

impl GlobalState {
    pub fn new(
        initial_workdir: impl Into<String>,
        initial_env: Vec<(String, String)>,
        initial_argv: Vec<String>,
    ) -> Self {
        Self::with_shebang_depth_limit(initial_workdir, initial_env, initial_argv, 4)
    }

    /// As [`GlobalState::new`], but with the `#!` chasing recursion cap
    /// (spec §4.7 P7, default 4) overridable — the CLI exposes this as
    /// `--depth-limit` for operators tracing scripts with unusually deep
    /// interpreter chains.
    pub fn with_shebang_depth_limit(
        initial_workdir: impl Into<String>,
        initial_env: Vec<(String, String)>,
        initial_argv: Vec<String>,
        shebang_depth_limit: usize,
    ) -> Self {
        let initial_workdir = initial_workdir.into();
        let mut files = HashMap::new();
        files.insert(
            initial_workdir.clone(),
            FileRecord {
                realpath: initial_workdir.clone(),
                accesses: Default::default(),
                was_ever_created: Tristate::False,
                was_ever_deleted: Tristate::False,
                is_currently_on_disk: Tristate::True,
                was_initially_on_disk: Tristate::True,
                kind: Some(FileKind::Directory),
                requires_all_children: false,
            },
        );

        GlobalState {
            registry: ProcessRegistry::new(),
            files,
            non_file_records: Vec::new(),
            syscall_warnings: HashSet::new(),
            root_pid: None,
            initial_workdir,
            initial_env,
            initial_argv,
            first_process_initialised: false,
            pipe_count: 0,
            socket_count: 0,
            process_fd_count: 0,
            timer_count: 0,
            epoll_count: 0,
            event_count: 0,
            error_count: 0,
            shebang_depth_limit,
        }
    }

    // -- file record store (spec §4.2) --------------------------------

    pub fn lookup_file(&self, realpath: &str) -> Option<&FileRecord> {
        self.files.get(realpath)
    }

    pub fn get_or_create_file(&mut self, realpath: &str, initial_on_disk: Tristate) -> FileHandle {
        if !self.files.contains_key(realpath) {
            self.files.insert(
                realpath.to_string(),
                FileRecord::new_filesystem(realpath, initial_on_disk),
            );
        }
        FileHandle::Path(realpath.to_string())
    }

    pub fn create_unbacked(&mut self, kind: FileKind, synthetic_name: String) -> FileHandle {
        self.non_file_records
            .push(FileRecord::new_unbacked(synthetic_name, kind));
        FileHandle::NonFile(self.non_file_records.len() - 1)
    }

    /// Spec §4.2: failures never propagate; a malformed FD operation
    /// synthesizes a uniquely-named error record instead.
    pub fn create_error_fd(&mut self, warning: &str) -> FileHandle {
        warn!("{warning}");
        self.error_count += 1;
        let name = format!("unknownFD ERROR{}", self.error_count);
        self.files.insert(name.clone(), FileRecord::new_error(&name));
        FileHandle::Path(name)
    }

    pub fn file(&self, handle: &FileHandle) -> Option<&FileRecord> {
        match handle {
            FileHandle::Path(p) => self.files.get(p),
            FileHandle::NonFile(i) => self.non_file_records.get(*i),
        }
    }

    pub fn file_mut(&mut self, handle: &FileHandle) -> Option<&mut FileRecord> {
        match handle {
            FileHandle::Path(p) => self.files.get_mut(p),
            FileHandle::NonFile(i) => self.non_file_records.get_mut(*i),
        }
    }

    pub fn register_access(&mut self, handle: &FileHandle, access: AccessRecord) -> bool {
        self.file_mut(handle)
            .map(|f| f.register_access(access))
            .unwrap_or(false)
    }

    pub fn files_iter(&self) -> impl Iterator<Item = &FileRecord> {
        self.files.values()
    }

    pub fn non_file_records_iter(&self) -> impl Iterator<Item = &FileRecord> {
        self.non_file_records.iter()
    }

    pub fn syscall_warnings(&self) -> &HashSet<i64> {
        &self.syscall_warnings
    }

    /// One-shot warning per syscall number (spec §4.7 `rename`, §7
    /// `UnknownSyscall`).
    pub fn syscall_warn(&mut self, nr: i64, message: &str) {
        if self.syscall_warnings.insert(nr) {
            warn!("{message}");
        }
    }

    // -- task lookups ---------------------------------------------------

    fn task(&self, pid: i32) -> &TaskState {
        self.registry
            .get(pid)
            .unwrap_or_else(|| panic!("pid {pid} has no tracked task state"))
    }

    fn task_mut(&mut self, pid: i32) -> &mut TaskState {
        self.registry
            .get_mut(pid)
            .unwrap_or_else(|| panic!("pid {pid} has no tracked task state"))
    }

    pub fn workdir(&self, pid: i32) -> String {
        self.task(pid).workdir()
    }

    pub fn chroot(&self, pid: i32) -> String {
        self.task(pid).fs_info.borrow().chroot.clone()
    }

    /// `getFilePath<log>` (spec §4.3): resolve `fd` against `pid`'s FD
    /// table. The non-logging form is used by the path resolver, which
    /// must never itself emit a warning for a dirfd it merely couldn't
    /// resolve (the caller decides whether that's news).
    pub fn resolve_fd_path(&self, pid: i32, fd: i32, log: bool) -> Option<String> {
        let task = self.task(pid);
        let handle = task.fd_table.borrow().lookup(fd).cloned();
        match handle {
            Some(h) => self.file(&h).map(|f| f.realpath.clone()),
            None => {
                if log {
                    warn!("unable to resolve file descriptor {fd} for pid {pid}");
                }
                None
            }
        }
    }

    // -- process registry policy (spec §4.5) -----------------------------

    fn new_shared_state(&mut self, workdir: String) -> (Rc<RefCell<FdTable>>, Rc<RefCell<FsInfo>>) {
        (
            Rc::new(RefCell::new(FdTable::new())),
            Rc::new(RefCell::new(FsInfo::new(workdir))),
        )
    }

    /// `trackNewProcess(pid)`: a task observed with no known creator.
    pub fn track_new_process(&mut self, pid: i32) {
        if let Some(existing) = self.registry.get(pid) {
            if existing.exiting {
                self.registry.remove(pid);
            } else {
                return;
            }
        }

        let workdir = self.initial_workdir.clone();
        let (fd_table, fs_info) = self.new_shared_state(workdir);
        self.registry.insert(TaskState::new(pid, fd_table.clone(), fs_info));

        if self.root_pid.is_none() {
            self.root_pid = Some(pid);
        }

        if !self.first_process_initialised {
            let stdin = self.create_unbacked(FileKind::Pipe, "stdin".to_string());
            let stdout = self.create_unbacked(FileKind::Pipe, "stdout".to_string());
            let stderr = self.create_unbacked(FileKind::Pipe, "stderr".to_string());
            let mut table = fd_table.borrow_mut();
            table.bind(0, stdin);
            table.bind(1, stdout);
            table.bind(2, stderr);
            self.first_process_initialised = true;
        }
    }

    /// `trackNewProcess(pid, creator, copy, assumedChildPid, cloneFS)`.
    pub fn track_new_process_with_creator(
        &mut self,
        child_pid: i32,
        creator_pid: i32,
        share_fd_table: bool,
        share_fs_info: bool,
    ) {
        if !self.registry.contains(child_pid) {
            self.track_new_process(child_pid);
        }

        let creator = self.task(creator_pid);
        let creator_fd_table = creator.fd_table.clone();
        let creator_fs_info = creator.fs_info.clone();

        let new_fd_table = if share_fd_table {
            creator_fd_table
        } else {
            Rc::new(RefCell::new(creator_fd_table.borrow().clone()))
        };
        let new_fs_info = if share_fs_info {
            creator_fs_info
        } else {
            Rc::new(RefCell::new(creator_fs_info.borrow().clone()))
        };

        let child = self.task_mut(child_pid);
        child.fd_table = new_fd_table;
        child.fs_info = new_fs_info;
    }

    /// Tries to match `child_pid` to a pending clone rendez-vous (glossary).
    /// Returns `true` if a match completed the rendez-vous, `false` if the
    /// child should be created as parentless (the later clone-exit will
    /// reconcile it).
    pub fn complete_clone_rendezvous(&mut self, child_pid: i32) -> bool {
        let candidates = self.registry.pending_clone_rendezvous_pids();
        let Some(&parent_pid) = candidates.first() else {
            return false;
        };
        let flags = self
            .registry
            .get(parent_pid)
            .and_then(|t| t.clone_rendezvous)
            .map(|r| r.flags)
            .unwrap_or(0);

        let share_fd_table = flags & CLONE_FILES != 0;
        let share_fs_info = flags & CLONE_FS != 0;
        self.track_new_process_with_creator(child_pid, parent_pid, share_fd_table, share_fs_info);

        if let Some(parent) = self.registry.get_mut(parent_pid) {
            parent.clone_rendezvous = Some(CloneRendezvous {
                flags,
                child: Some(child_pid),
            });
        }
        true
    }

    pub fn mark_exiting(&mut self, pid: i32) {
        if let Some(task) = self.registry.get_mut(pid) {
            task.exiting = true;
        }
    }

    pub fn set_syscall_state(&mut self, pid: i32, state: SyscallState) {
        self.task_mut(pid).syscall_state = state;
    }

    pub fn syscall_state(&self, pid: i32) -> SyscallState {
        self.task(pid).syscall_state
    }

    // -- FD table operations (spec §4.3) ---------------------------------

    pub fn bind_fd(&mut self, pid: i32, fd: i32, handle: FileHandle) {
        self.task(pid).fd_table.borrow_mut().bind(fd, handle);
    }

    pub fn close_fd(&mut self, pid: i32, fd: i32) {
        self.task(pid).fd_table.borrow_mut().close(fd);
    }

    /// `registerFdAlias`: `new_fd` becomes another name for whatever
    /// `old_fd` names. If `old_fd` is itself unknown, an error record is
    /// synthesized and bound to *both* fds, so the alias stays observable
    /// (spec §4.3).
    pub fn alias_fd(&mut self, pid: i32, new_fd: i32, old_fd: i32) {
        let existing = self.task(pid).fd_table.borrow().lookup(old_fd).cloned();
        let handle = match existing {
            Some(h) => h,
            None => {
                let h = self.create_error_fd("creating a duplicate of an unresolved file descriptor");
                self.bind_fd(pid, old_fd, h.clone());
                h
            }
        };
        self.bind_fd(pid, new_fd, handle);
    }

    // -- FS info operations (spec §4.4) -----------------------------------

    pub fn change_directory(&mut self, pid: i32, new_workdir: String) {
        self.task(pid).fs_info.borrow_mut().workdir = new_workdir;
    }

    pub fn change_directory_via_fd(&mut self, pid: i32, fd: i32) {
        let target = self.resolve_fd_path(pid, fd, true).unwrap_or_else(|| "/pathError".to_string());
        self.change_directory(pid, target);
    }

    // -- directory / unlink handling (spec §4.7) --------------------------

    pub fn create_directory(&mut self, pid: i32, abs_path: &str, rel_path: &str) {
        let workdir = self.workdir(pid);
        let access = AccessRecord::new(pid, rel_path, workdir);
        if self.files.contains_key(abs_path) {
            let info = self.files.get_mut(abs_path).expect("checked above");
            if info.is_currently_on_disk.is_true() {
                warn!("new directory {abs_path} assumed to already exist");
            }
            info.register_access(access);
            info.kind = Some(FileKind::Directory);
            info.is_currently_on_disk = Tristate::True;
            info.was_ever_created = Tristate::True;
        } else {
            let mut record = FileRecord::new_filesystem(abs_path, Tristate::False);
            record.register_access(access);
            record.kind = Some(FileKind::Directory);
            record.is_currently_on_disk = Tristate::True;
            record.was_ever_created = Tristate::True;
            self.files.insert(abs_path.to_string(), record);
        }
    }

    pub fn remove_directory(&mut self, pid: i32, abs_path: &str) {
        let workdir = self.workdir(pid);
        let access = AccessRecord::new(pid, abs_path, workdir);
        if let Some(info) = self.files.get_mut(abs_path) {
            if !info.is_currently_on_disk.is_true() {
                warn!("directory {abs_path} assumed to not exist");
            }
            match info.kind {
                None => info.kind = Some(FileKind::Directory),
                Some(FileKind::Directory) => {}
                Some(_) => {
                    warn!("rmdir succeeded on {abs_path} but it was not tracked as a directory");
                    info.kind = Some(FileKind::Directory);
                }
            }
            info.register_access(access);
            info.was_ever_deleted = Tristate::True;
            info.is_currently_on_disk = Tristate::False;
        } else {
            let mut record = FileRecord::new_filesystem(abs_path, Tristate::True);
            record.register_access(access);
            record.kind = Some(FileKind::Directory);
            record.was_ever_deleted = Tristate::True;
            record.is_currently_on_disk = Tristate::False;
            record.requires_all_children = false;
            self.files.insert(abs_path.to_string(), record);
        }
    }

    pub fn remove_non_directory(&mut self, pid: i32, abs_path: &str) {
        let workdir = self.workdir(pid);
        let access = AccessRecord::new(pid, abs_path, workdir);
        if let Some(info) = self.files.get_mut(abs_path) {
            if !info.is_currently_on_disk.is_true() {
                warn!("file {abs_path} assumed to not exist");
            }
            if info.kind == Some(FileKind::Directory) {
                warn!("file {abs_path} assumed to be a directory");
                info.kind = None;
            }
            info.register_access(access);
            info.is_currently_on_disk = Tristate::False;
            info.was_ever_deleted = Tristate::True;
        } else {
            let mut record = FileRecord::new_filesystem(abs_path, Tristate::True);
            record.register_access(access);
            record.is_currently_on_disk = Tristate::False;
            record.was_ever_deleted = Tristate::True;
            self.files.insert(abs_path.to_string(), record);
        }
    }

    pub fn mark_directory_listed(&mut self, pid: i32, fd: i32) {
        let handle = self.task(pid).fd_table.borrow().lookup(fd).cloned();
        match handle {
            Some(h) => {
                if let Some(info) = self.file_mut(&h) {
                    info.kind = Some(FileKind::Directory);
                    info.requires_all_children = true;
                }
            }
            None => {
                let h = self.create_error_fd("listing a directory not previously opened");
                self.bind_fd(pid, fd, h);
            }
        }
    }

    /// `stat`/`access`-family probe (spec §4.7): registers that `pid` asked
    /// about `abs_path` without mutating any of the record's existence
    /// tri-states once it exists (stat semantics are not trustworthy enough
    /// to overwrite what `open`/`mkdir`/`unlink` already established). A
    /// path probed for the first time still gets a record, seeded from
    /// whatever the host filesystem shows at probe time — the same
    /// best-effort snapshot `open_handling` takes for a brand-new path.
    pub fn probe_file(&mut self, pid: i32, abs_path: &str, rel_path: &str, existed: bool) {
        let workdir = self.workdir(pid);
        let access = AccessRecord::new(pid, rel_path, workdir);

        if let Some(info) = self.files.get_mut(abs_path) {
            info.register_access(access);
        } else {
            let mut record = FileRecord::new_filesystem(abs_path, Tristate::from(existed));
            record.register_access(access);
            self.files.insert(abs_path.to_string(), record);
        }
    }

    // -- open / exec (spec §4.7) ------------------------------------------

    pub fn open_handling(
        &mut self,
        pid: i32,
        abs_path: &str,
        rel_path: &str,
        fd: i32,
        flags: i32,
        existed: bool,
    ) {
        let workdir = self.workdir(pid);
        let access = AccessRecord::new(pid, rel_path, workdir).with_flags(flags);

        let handle = if let Some(info) = self.files.get_mut(abs_path) {
            if info.is_currently_on_disk.is_true() != existed {
                warn!(
                    "open assumed {abs_path} to {} when it did not",
                    if existed { "exist" } else { "not exist" }
                );
            }
            info.register_access(access);
            info.was_ever_created = Tristate::from(!existed);
            info.is_currently_on_disk = Tristate::True;
            FileHandle::Path(abs_path.to_string())
        } else {
            let mut record = FileRecord::new_filesystem(abs_path, Tristate::from(existed));
            record.register_access(access);
            record.was_ever_created = Tristate::from(!existed);
            record.is_currently_on_disk = Tristate::True;
            self.files.insert(abs_path.to_string(), record);
            FileHandle::Path(abs_path.to_string())
        };
        self.bind_fd(pid, fd, handle);
    }

    /// `execFile`: registers an executable access for `abs_path`, chasing a
    /// `#!` shebang recursively up to depth 4 (spec §4.7, P6/P7). Returns
    /// whether the model believes the exec should have failed (mismatched
    /// against a kernel success means `ExecProbeMismatch`, spec §7).
    pub fn exec_file(
        &mut self,
        pid: i32,
        abs_path: &str,
        rel_path: &str,
        depth: usize,
        force_register: bool,
    ) -> bool {
        let workdir = self.workdir(pid);
        let access = AccessRecord::new(pid, rel_path, workdir).executable(true);

        if let Some(info) = self.files.get_mut(abs_path) {
            info.register_access(access);
            return false;
        }

        let mut do_register = force_register;
        let mut failed = false;

        let mut record = FileRecord::new_filesystem(abs_path, Tristate::True);
        record.kind = Some(FileKind::RegularFile);
        record.register_access(access);

        let Ok(mut file) = std::fs::File::open(abs_path) else {
            if force_register {
                self.files.insert(abs_path.to_string(), record);
            }
            return true;
        };

        let is_executable = std::fs::metadata(abs_path)
            .map(|m| {
                use std::os::unix::fs::PermissionsExt;
                m.permissions().mode() & 0o111 != 0
            })
            .unwrap_or(false);
        if !is_executable && !force_register {
            return true;
        }

        if let Some(target) = try_read_shebang(&mut file) {
            if depth >= self.shebang_depth_limit {
                self.syscall_warn(
                    -1,
                    &format!(
                        "shebang chasing exceeded the recursion depth limit of {}",
                        self.shebang_depth_limit
                    ),
                );
            } else {
                let resolved = if target.starts_with('/') {
                    target
                } else {
                    format!("{}/{}", self.workdir(pid), target)
                };
                failed = self.exec_file(pid, &resolved, &resolved, depth + 1, force_register);
                do_register = do_register || !failed;
            }
        }

        if do_register {
            self.files.insert(abs_path.to_string(), record);
        }
        failed
    }

    // -- unbacked-object registration (spec §4.7) --------------------------

    pub fn register_pipe(&mut self, pid: i32, fds: [i32; 2]) {
        self.pipe_count += 1;
        let n = self.pipe_count;
        let read_end = self.create_unbacked(FileKind::Pipe, format!("pipe_read_{n}"));
        self.bind_fd(pid, fds[0], read_end);
        let write_end = self.create_unbacked(FileKind::Pipe, format!("pipe_write_{n}"));
        self.bind_fd(pid, fds[1], write_end);
    }

    pub fn register_socket(&mut self, pid: i32, fd: i32) {
        self.socket_count += 1;
        let n = self.socket_count;
        let handle = self.create_unbacked(FileKind::Socket, format!("socket_{n}"));
        self.bind_fd(pid, fd, handle);
    }

    pub fn register_socket_pair(&mut self, pid: i32, fds: [i32; 2]) {
        self.socket_count += 1;
        let n = self.socket_count;
        let a = self.create_unbacked(FileKind::Socket, format!("socket_pair_1_{n}"));
        self.bind_fd(pid, fds[0], a);
        let b = self.create_unbacked(FileKind::Socket, format!("socket_pair_2_{n}"));
        self.bind_fd(pid, fds[1], b);
    }

    pub fn register_process_fd(&mut self, pid: i32, other_process: i32, fd: i32) {
        self.process_fd_count += 1;
        let n = self.process_fd_count;
        let handle =
            self.create_unbacked(FileKind::Process, format!("process_{other_process}_{n}"));
        self.bind_fd(pid, fd, handle);
    }

    pub fn register_timer(&mut self, pid: i32, fd: i32) {
        self.timer_count += 1;
        let n = self.timer_count;
        let handle = self.create_unbacked(FileKind::Timer, format!("timer_{n}"));
        self.bind_fd(pid, fd, handle);
    }

    pub fn register_epoll(&mut self, pid: i32, fd: i32) {
        self.epoll_count += 1;
        let n = self.epoll_count;
        let handle = self.create_unbacked(FileKind::Epoll, format!("epoll_{n}"));
        self.bind_fd(pid, fd, handle);
    }

    pub fn register_eventfd(&mut self, pid: i32, fd: i32) {
        self.event_count += 1;
        let n = self.event_count;
        let handle = self.create_unbacked(FileKind::EventFd, format!("event_{n}"));
        self.bind_fd(pid, fd, handle);
    }
}

/// Parses the `#!interpreter` first line, per spec §4.7: skip one optional
/// leading space, stop at the first space/tab/newline.
fn try_read_shebang(file: &mut std::fs::File) -> Option<String> {
    let mut marker = [0u8; 2];
    if file.read_exact(&mut marker).is_err() {
        return None;
    }
    if &marker != b"#!" {
        return None;
    }
    let mut rest = String::new();
    file.take(4096).read_to_string(&mut rest).ok()?;
    let rest = rest.strip_prefix(' ').unwrap_or(&rest);
    let token = rest
        .split(|c: char| c == ' ' || c == '\t' || c == '\n')
        .next()
        .unwrap_or("");
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
