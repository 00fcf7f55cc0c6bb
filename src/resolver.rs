//! Path resolution (spec §4.1): `(pid, raw_path, dirfd, flags) -> canonical
//! absolute path`. Never mutates the model; a dirfd it can't resolve or a
//! host-filesystem canonicalization failure are both recoverable (spec §7
//! `PathResolution`) and only ever produce a `tracing::warn!`.

use tracing::warn;

use crate::model::GlobalState;
use crate::syscall_nr::AT_FDCWD;

/// Resolve `raw_path` against `dirfd` (or the task's CWD, if `dirfd ==
/// AT_FDCWD`) into a canonical absolute path. Symlinks are resolved against
/// the host filesystem unless `nofollow` is set, matching the policy a
/// `*at` syscall requests via `AT_SYMLINK_NOFOLLOW`/`O_NOFOLLOW`.
pub fn resolve(global: &GlobalState, pid: i32, raw_path: &str, dirfd: i32, nofollow: bool) -> String {
    let base = base_path(global, pid, raw_path, dirfd);
    canonicalize(&base, nofollow)
}

/// The "deleted" variant (spec §4.1/§4.7): used for paths passed to
/// `unlink`/`rmdir`/`mkdir`, where requiring the target (or, for `mkdir`,
/// the not-yet-existing directory) to already be on the host would be
/// wrong. Lexical normalization only, no host lookup.
pub fn resolve_deleted(global: &GlobalState, pid: i32, raw_path: &str, dirfd: i32) -> String {
    let base = base_path(global, pid, raw_path, dirfd);
    lexical_normalize(&base)
}

fn base_path(global: &GlobalState, pid: i32, raw_path: &str, dirfd: i32) -> String {
    if std::path::Path::new(raw_path).is_absolute() {
        return raw_path.to_string();
    }
    if raw_path.is_empty() {
        return base_dir(global, pid, dirfd);
    }
    let dir = base_dir(global, pid, dirfd);
    format!("{dir}/{raw_path}")
}

fn base_dir(global: &GlobalState, pid: i32, dirfd: i32) -> String {
    if dirfd == AT_FDCWD {
        global.workdir(pid)
    } else {
        match global.resolve_fd_path(pid, dirfd, false) {
            Some(p) => p,
            None => {
                warn!("dirfd {dirfd} for pid {pid} could not be resolved; falling back to a bare concatenation");
                String::new()
            }
        }
    }
}

fn canonicalize(path: &str, nofollow: bool) -> String {
    if nofollow {
        return lexical_normalize(path);
    }
    match std::fs::canonicalize(path) {
        Ok(p) => p.to_string_lossy().into_owned(),
        Err(_) => {
            warn!("cannot resolve {path} to a canonical path on the host; using a lexical join");
            lexical_normalize(path)
        }
    }
}

/// Collapses `.` and `..` components without touching the filesystem
/// (`std::filesystem::weakly_canonical`'s lexical half).
fn lexical_normalize(path: &str) -> String {
    let is_absolute = path.starts_with('/');
    let mut stack: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                if stack.last().map(|c| *c != "..").unwrap_or(false) {
                    stack.pop();
                } else if !is_absolute {
                    stack.push("..");
                }
            }
            other => stack.push(other),
        }
    }
    let joined = stack.join("/");
    if is_absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::lexical_normalize;

    #[test]
    fn collapses_dot_and_dotdot() {
        assert_eq!(lexical_normalize("/tmp/a/../b/./c"), "/tmp/b/c");
        assert_eq!(lexical_normalize("/a/b/../../c"), "/c");
        assert_eq!(lexical_normalize("/../a"), "/a");
    }

    #[test]
    fn idempotent_on_already_normal_paths() {
        let p = "/tmp/a/b.txt";
        assert_eq!(lexical_normalize(p), p);
    }
}
