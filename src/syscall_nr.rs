//! x86_64 syscall numbers consumed by the dispatch table in
//! `handlers::dispatch`. Extends the teacher's own flat `const SYS_*: u64`
//! block with every number spec §4.7's handlers need.

pub const SYS_READ: i64 = 0;
pub const SYS_WRITE: i64 = 1;
pub const SYS_OPEN: i64 = 2;
pub const SYS_CLOSE: i64 = 3;
pub const SYS_LSEEK: i64 = 8;
pub const SYS_STAT: i64 = 4;
pub const SYS_FSTAT: i64 = 5;
pub const SYS_LSTAT: i64 = 6;
pub const SYS_PREAD64: i64 = 17;
pub const SYS_PWRITE64: i64 = 18;
pub const SYS_READV: i64 = 19;
pub const SYS_WRITEV: i64 = 20;
pub const SYS_ACCESS: i64 = 21;
pub const SYS_PIPE: i64 = 22;
pub const SYS_IOCTL: i64 = 16;
pub const SYS_DUP: i64 = 32;
pub const SYS_DUP2: i64 = 33;
pub const SYS_SOCKET: i64 = 41;
pub const SYS_CONNECT: i64 = 42;
pub const SYS_SENDFILE: i64 = 40;
pub const SYS_SOCKETPAIR: i64 = 53;
pub const SYS_CLONE: i64 = 56;
pub const SYS_FORK: i64 = 57;
pub const SYS_VFORK: i64 = 58;
pub const SYS_EXECVE: i64 = 59;
pub const SYS_EXIT: i64 = 60;
pub const SYS_FCNTL: i64 = 72;
pub const SYS_FTRUNCATE: i64 = 77;
pub const SYS_GETDENTS: i64 = 78;
pub const SYS_RENAME: i64 = 82;
pub const SYS_MKDIR: i64 = 83;
pub const SYS_RMDIR: i64 = 84;
pub const SYS_CREAT: i64 = 85;
pub const SYS_UNLINK: i64 = 87;
pub const SYS_READLINK: i64 = 89;
pub const SYS_CHDIR: i64 = 80;
pub const SYS_FCHDIR: i64 = 81;
pub const SYS_FUTEX: i64 = 202;
pub const SYS_GETDENTS64: i64 = 217;
pub const SYS_CLOCK_GETTIME: i64 = 228;
pub const SYS_EXIT_GROUP: i64 = 231;
pub const SYS_EPOLL_CREATE: i64 = 213;
pub const SYS_TIMER_CREATE: i64 = 222;
pub const SYS_MKDIRAT: i64 = 258;
pub const SYS_OPENAT: i64 = 257;
pub const SYS_UNLINKAT: i64 = 263;
pub const SYS_RENAMEAT: i64 = 264;
pub const SYS_READLINKAT: i64 = 267;
pub const SYS_FACCESSAT: i64 = 269;
pub const SYS_DUP3: i64 = 292;
pub const SYS_PIPE2: i64 = 293;
pub const SYS_PREADV: i64 = 295;
pub const SYS_PWRITEV: i64 = 296;
pub const SYS_NEWFSTATAT: i64 = 262;
pub const SYS_EVENTFD: i64 = 284;
pub const SYS_EPOLL_CREATE1: i64 = 291;
pub const SYS_EVENTFD2: i64 = 290;
pub const SYS_TIMERFD_CREATE: i64 = 283;
pub const SYS_EXECVEAT: i64 = 322;
pub const SYS_RENAMEAT2: i64 = 316;
pub const SYS_COPY_FILE_RANGE: i64 = 326;
pub const SYS_PREADV2: i64 = 327;
pub const SYS_PWRITEV2: i64 = 328;
pub const SYS_STATX: i64 = 332;
pub const SYS_FACCESSAT2: i64 = 439;
pub const SYS_CLONE3: i64 = 435;
pub const SYS_OPENAT2: i64 = 437;

/// `AT_FDCWD` (`fcntl.h`): resolve relative to the task's CWD rather than a
/// directory fd.
pub const AT_FDCWD: i32 = -100;

/// A human-readable syscall name for logging (`entry_log`/`exit_log`,
/// `syscallWarn` messages). Not exhaustive — falls back to the bare number.
pub fn syscall_name(nr: i64) -> &'static str {
    match nr {
        SYS_READ => "read",
        SYS_WRITE => "write",
        SYS_OPEN => "open",
        SYS_CLOSE => "close",
        SYS_LSEEK => "lseek",
        SYS_STAT => "stat",
        SYS_FSTAT => "fstat",
        SYS_LSTAT => "lstat",
        SYS_PREAD64 => "pread64",
        SYS_PWRITE64 => "pwrite64",
        SYS_READV => "readv",
        SYS_WRITEV => "writev",
        SYS_ACCESS => "access",
        SYS_PIPE => "pipe",
        SYS_IOCTL => "ioctl",
        SYS_DUP => "dup",
        SYS_DUP2 => "dup2",
        SYS_SOCKET => "socket",
        SYS_SENDFILE => "sendfile",
        SYS_SOCKETPAIR => "socketpair",
        SYS_CLONE => "clone",
        SYS_FORK => "fork",
        SYS_VFORK => "vfork",
        SYS_EXECVE => "execve",
        SYS_EXIT => "exit",
        SYS_FCNTL => "fcntl",
        SYS_FTRUNCATE => "ftruncate",
        SYS_GETDENTS => "getdents",
        SYS_RENAME => "rename",
        SYS_MKDIR => "mkdir",
        SYS_RMDIR => "rmdir",
        SYS_CREAT => "creat",
        SYS_UNLINK => "unlink",
        SYS_READLINK => "readlink",
        SYS_CHDIR => "chdir",
        SYS_FCHDIR => "fchdir",
        SYS_FUTEX => "futex",
        SYS_GETDENTS64 => "getdents64",
        SYS_EXIT_GROUP => "exit_group",
        SYS_EPOLL_CREATE => "epoll_create",
        SYS_TIMER_CREATE => "timer_create",
        SYS_MKDIRAT => "mkdirat",
        SYS_OPENAT => "openat",
        SYS_UNLINKAT => "unlinkat",
        SYS_RENAMEAT => "renameat",
        SYS_READLINKAT => "readlinkat",
        SYS_FACCESSAT => "faccessat",
        SYS_DUP3 => "dup3",
        SYS_PIPE2 => "pipe2",
        SYS_PREADV => "preadv",
        SYS_PWRITEV => "pwritev",
        SYS_NEWFSTATAT => "newfstatat",
        SYS_EVENTFD => "eventfd",
        SYS_EPOLL_CREATE1 => "epoll_create1",
        SYS_EVENTFD2 => "eventfd2",
        SYS_TIMERFD_CREATE => "timerfd_create",
        SYS_EXECVEAT => "execveat",
        SYS_RENAMEAT2 => "renameat2",
        SYS_COPY_FILE_RANGE => "copy_file_range",
        SYS_PREADV2 => "preadv2",
        SYS_PWRITEV2 => "pwritev2",
        SYS_STATX => "statx",
        SYS_FACCESSAT2 => "faccessat2",
        SYS_CLONE3 => "clone3",
        SYS_OPENAT2 => "openat2",
        _ => "unknown",
    }
}
