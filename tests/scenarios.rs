//! End-to-end scenarios driven through `EventLoop` against a
//! `ScriptedEventSource` (spec §8). Each test plays back one fixed syscall
//! script and checks the resulting `GlobalState` rather than anything
//! tracer-specific, so none of this depends on a real tracee.

use imagetrace::event_loop::{Event, EventLoop};
use imagetrace::front_end::testing::ScriptedEventSource;
use imagetrace::model::{GlobalState, Tristate};
use imagetrace::syscall_nr::*;

const O_RDONLY: i32 = 0;
const O_WRONLY: i32 = 1;
const O_CREAT: i32 = 0o100;

fn run(global: GlobalState, source: ScriptedEventSource) -> (EventLoop, ScriptedEventSource) {
    let mut event_loop = EventLoop::new(global, false);
    let mut source = source;
    event_loop.run(&mut source).expect("scripted trace runs cleanly");
    (event_loop, source)
}

/// Scenario 1 ("Trivial open"): `openat` + `read` + `close` on a single
/// path produces one `FileRecord` with one access, and the fd no longer
/// resolves once closed (P1, P3).
#[test]
fn trivial_open_read_close() {
    let mut global = GlobalState::new("/tmp/a", Vec::new(), vec!["prog".to_string()]);
    global.track_new_process(100);

    let path_ptr = 0x1000;
    let source = ScriptedEventSource::new()
        .with_cstring(100, path_ptr, "b.txt")
        .push(Event::SyscallEntry {
            pid: 100,
            nr: SYS_OPENAT,
            args: [AT_FDCWD as u64, path_ptr, O_RDONLY as u64, 0, 0, 0],
        })
        .push(Event::SyscallExit {
            pid: 100,
            retval: 7,
            is_error: false,
        })
        .push(Event::SyscallEntry {
            pid: 100,
            nr: SYS_READ,
            args: [7, 0, 10, 0, 0, 0],
        })
        .push(Event::SyscallExit {
            pid: 100,
            retval: 10,
            is_error: false,
        })
        .push(Event::SyscallEntry {
            pid: 100,
            nr: SYS_CLOSE,
            args: [7, 0, 0, 0, 0, 0],
        })
        .push(Event::SyscallExit {
            pid: 100,
            retval: 0,
            is_error: false,
        })
        .push(Event::Exit { pid: 100, code: 0 });

    let (event_loop, _source) = run(global, source);
    let global = &event_loop.global;

    let record = global
        .lookup_file("/tmp/a/b.txt")
        .expect("open should have created a record for b.txt");
    assert_eq!(record.accesses.len(), 1);
    let access = record.accesses.iter().next().expect("one access");
    assert_eq!(access.pid, 100);
    assert_eq!(access.flags, Some(O_RDONLY));
    assert!(!access.executable);

    // P3: close removes the fd -> path lookup.
    assert_eq!(global.resolve_fd_path(100, 7, false), None);
}

/// Scenario 2 ("Shebang"): executing a script whose first line names an
/// interpreter produces two executable accesses — one for the script, one
/// for the interpreter (P6).
#[test]
fn shebang_chases_to_the_interpreter() {
    let script = tempfile::NamedTempFile::new().expect("tempfile");
    std::fs::write(script.path(), b"#!/nonexistent/interp\necho hi\n").expect("write script");
    let script_path = script.path().to_str().expect("utf8 path").to_string();

    let mut global = GlobalState::new("/tmp", Vec::new(), vec![script_path.clone()]);
    global.track_new_process(1);

    let path_ptr = 0x2000;
    let source = ScriptedEventSource::new()
        .with_cstring(1, path_ptr, script_path.clone())
        .push(Event::SyscallEntry {
            pid: 1,
            nr: SYS_EXECVE,
            args: [path_ptr, 0, 0, 0, 0, 0],
        })
        .push(Event::SyscallExit {
            pid: 1,
            retval: 0,
            is_error: false,
        })
        .push(Event::Exit { pid: 1, code: 0 });

    let (event_loop, _source) = run(global, source);
    let global = &event_loop.global;

    let script_record = global
        .lookup_file(&script_path)
        .expect("the script itself should be on record");
    assert!(script_record.accesses.iter().any(|a| a.executable));

    let interp_record = global
        .lookup_file("/nonexistent/interp")
        .expect("the interpreter the shebang named should be on record");
    assert!(interp_record.accesses.iter().any(|a| a.executable));
}

/// Scenario 2b (P7): a chain of shebangs deeper than the configured limit
/// stops recursing and logs a syscall warning instead of looping forever.
#[test]
fn shebang_chase_past_depth_limit_warns_and_stops() {
    let mut interp_paths = Vec::new();
    let mut scripts = Vec::new();
    // Build a chain of 7 scripts, each shebanging the next -- more than
    // enough to exceed the default depth limit of 4 (the chase stops as
    // soon as it would read a 5th interpreter's shebang, so only scripts
    // 0..4 ever get opened).
    for _ in 0..7 {
        let f = tempfile::NamedTempFile::new().expect("tempfile");
        interp_paths.push(f.path().to_str().expect("utf8 path").to_string());
        scripts.push(f);
    }
    for i in 0..6 {
        let shebang = format!("#!{}\n", interp_paths[i + 1]);
        std::fs::write(&interp_paths[i], shebang.as_bytes()).expect("write script");
    }
    // Leave the last one as an empty file (no further shebang).
    std::fs::write(&interp_paths[6], b"").expect("write leaf");

    let root_path = interp_paths[0].clone();
    let mut global = GlobalState::new("/tmp", Vec::new(), vec![root_path.clone()]);
    global.track_new_process(1);

    let path_ptr = 0x3000;
    let source = ScriptedEventSource::new()
        .with_cstring(1, path_ptr, root_path.clone())
        .push(Event::SyscallEntry {
            pid: 1,
            nr: SYS_EXECVE,
            args: [path_ptr, 0, 0, 0, 0, 0],
        })
        .push(Event::SyscallExit {
            pid: 1,
            retval: 0,
            is_error: false,
        })
        .push(Event::Exit { pid: 1, code: 0 });

    let (event_loop, _source) = run(global, source);
    let global = &event_loop.global;

    // The warning is keyed by syscall number -1 (exec_file's own sentinel
    // for "no specific syscall", since the depth check isn't tied to any
    // one of the four exec-family syscall numbers).
    assert!(global.syscall_warnings().contains(&-1));
}

/// Scenario 3 ("Clone sharing"): a `CLONE_FILES|CLONE_FS` child observes
/// the same fd -> path bindings as its parent (P2).
#[test]
fn clone_with_clone_files_shares_the_fd_table() {
    const CLONE_FILES: u64 = 0x0400;
    const CLONE_FS: u64 = 0x0200;
    const SIGCHLD: u64 = 17;
    let flags = CLONE_FILES | CLONE_FS | SIGCHLD;

    let mut global = GlobalState::new("/", Vec::new(), vec!["prog".to_string()]);
    global.track_new_process(1);

    let path_ptr = 0x4000;
    let source = ScriptedEventSource::new()
        .with_cstring(42, path_ptr, "/etc/hosts")
        .push(Event::SyscallEntry {
            pid: 1,
            nr: SYS_CLONE,
            args: [flags, 0, 0, 0, 0, 0],
        })
        .push(Event::SyscallExit {
            pid: 1,
            retval: 42,
            is_error: false,
        })
        .push(Event::SyscallEntry {
            pid: 42,
            nr: SYS_OPENAT,
            args: [AT_FDCWD as u64, path_ptr, O_RDONLY as u64, 0, 0, 0],
        })
        .push(Event::SyscallExit {
            pid: 42,
            retval: 3,
            is_error: false,
        })
        .push(Event::SyscallEntry {
            pid: 1,
            nr: SYS_READ,
            args: [3, 0, 0, 0, 0, 0],
        })
        .push(Event::SyscallExit {
            pid: 1,
            retval: 5,
            is_error: false,
        })
        .push(Event::Exit { pid: 1, code: 0 });

    let (event_loop, _source) = run(global, source);
    let global = &event_loop.global;

    assert_eq!(
        global.resolve_fd_path(1, 3, false).as_deref(),
        Some("/etc/hosts")
    );
    assert_eq!(
        global.resolve_fd_path(42, 3, false).as_deref(),
        Some("/etc/hosts")
    );
}

/// Scenario 4 ("Dup aliasing"): `dup2` makes the new fd resolve to the same
/// record as the fd it was duplicated from, including the stdio records
/// seeded at process creation (P4).
#[test]
fn dup2_aliases_the_same_record() {
    let mut global = GlobalState::new("/", Vec::new(), vec!["prog".to_string()]);
    global.track_new_process(1);

    let source = ScriptedEventSource::new()
        .push(Event::SyscallEntry {
            pid: 1,
            nr: SYS_DUP2,
            args: [1, 10, 0, 0, 0, 0],
        })
        .push(Event::SyscallExit {
            pid: 1,
            retval: 10,
            is_error: false,
        })
        .push(Event::SyscallEntry {
            pid: 1,
            nr: SYS_WRITE,
            args: [10, 0, 0, 0, 0, 0],
        })
        .push(Event::SyscallExit {
            pid: 1,
            retval: 0,
            is_error: false,
        })
        .push(Event::Exit { pid: 1, code: 0 });

    let (event_loop, _source) = run(global, source);
    let global = &event_loop.global;

    assert_eq!(
        global.resolve_fd_path(1, 10, false).as_deref(),
        Some("stdout")
    );
    assert_eq!(global.resolve_fd_path(1, 1, false).as_deref(), Some("stdout"));
}

/// Scenario 5 ("Unlink"): a file created then removed ends up with
/// `was_ever_created = True`, `was_ever_deleted = True`, and
/// `is_currently_on_disk = False` (P8's shape, via `open(O_CREAT)` then
/// `unlink` rather than `mkdir`/`rmdir`).
#[test]
fn unlink_after_create_leaves_a_deleted_record() {
    let mut global = GlobalState::new("/tmp/a", Vec::new(), vec!["prog".to_string()]);
    global.track_new_process(1);

    let name_ptr = 0x5000;
    let source = ScriptedEventSource::new()
        .with_cstring(1, name_ptr, "x")
        .push(Event::SyscallEntry {
            pid: 1,
            nr: SYS_OPENAT,
            args: [
                AT_FDCWD as u64,
                name_ptr,
                (O_CREAT | O_WRONLY) as u64,
                0,
                0,
                0,
            ],
        })
        .push(Event::SyscallExit {
            pid: 1,
            retval: 4,
            is_error: false,
        })
        .push(Event::SyscallEntry {
            pid: 1,
            nr: SYS_WRITE,
            args: [4, 0, 0, 0, 0, 0],
        })
        .push(Event::SyscallExit {
            pid: 1,
            retval: 0,
            is_error: false,
        })
        .push(Event::SyscallEntry {
            pid: 1,
            nr: SYS_CLOSE,
            args: [4, 0, 0, 0, 0, 0],
        })
        .push(Event::SyscallExit {
            pid: 1,
            retval: 0,
            is_error: false,
        })
        .push(Event::SyscallEntry {
            pid: 1,
            nr: SYS_UNLINK,
            args: [name_ptr, 0, 0, 0, 0, 0],
        })
        .push(Event::SyscallExit {
            pid: 1,
            retval: 0,
            is_error: false,
        })
        .push(Event::Exit { pid: 1, code: 0 });

    let (event_loop, _source) = run(global, source);
    let global = &event_loop.global;

    let record = global
        .lookup_file("/tmp/a/x")
        .expect("record for the created-then-unlinked file");
    assert_eq!(record.was_ever_created, Tristate::True);
    assert_eq!(record.was_ever_deleted, Tristate::True);
    assert_eq!(record.is_currently_on_disk, Tristate::False);
}

/// Scenario 6 ("Stat without open"): `stat`-ing a path the process never
/// opened still produces a record, carrying only the probe access (no
/// flags, not marked executable), and its `was_initially_on_disk` reflects
/// whatever the host actually shows.
#[test]
fn stat_on_a_path_never_opened_creates_a_probe_record() {
    let mut global = GlobalState::new("/", Vec::new(), vec!["prog".to_string()]);
    global.track_new_process(1);

    let path_ptr = 0x6000;
    // An absolute path essentially guaranteed not to exist.
    let missing = "/nope-imagetrace-test-path-does-not-exist".to_string();
    let source = ScriptedEventSource::new()
        .with_cstring(1, path_ptr, missing.clone())
        .push(Event::SyscallEntry {
            pid: 1,
            nr: SYS_STAT,
            args: [path_ptr, 0, 0, 0, 0, 0],
        })
        .push(Event::SyscallExit {
            pid: 1,
            retval: -1,
            is_error: true,
        })
        .push(Event::Exit { pid: 1, code: 0 });

    let (event_loop, _source) = run(global, source);
    let global = &event_loop.global;

    let record = global
        .lookup_file(&missing)
        .expect("a stat probe should still produce a record");
    assert_eq!(record.was_initially_on_disk, Tristate::False);
    assert_eq!(record.accesses.len(), 1);
    let access = record.accesses.iter().next().expect("one access");
    assert_eq!(access.flags, None);
    assert!(!access.executable);
    // stat never mutates these once a record exists, but on first creation
    // they remain Unknown until something else observes them.
    assert_eq!(record.was_ever_created, Tristate::Unknown);
    assert_eq!(record.was_ever_deleted, Tristate::Unknown);
}
