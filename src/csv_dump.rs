//! The persisted CSV dump (spec §6, "documented, not bit-exact"). Grounded
//! on `original_source/csv/serialisedFileInfo.{hpp,cpp}`: one outer row per
//! `FileRecord` with the exact column list from the spec, and an embedded
//! `AccessedAs` mini-CSV (columns `path, dir, exec, flags`) for that
//! record's accesses, the same nesting the original uses to avoid a
//! separate file per file record. Only serialization is implemented here —
//! the original's `deSerializeFiles` round-trip is a back-end concern this
//! core doesn't need, since within one run the model itself is the source
//! of truth; the CSV exists for inspection and for feeding a separate
//! back-end process, not for resuming a trace.

use std::path::Path;

use csv::WriterBuilder;

use crate::error::{Result, TracerError};
use crate::model::{FileKind, FileRecord, GlobalState, Tristate};

fn tristate_cell(t: Tristate) -> &'static str {
    match t {
        Tristate::Unknown => "",
        Tristate::False => "0",
        Tristate::True => "1",
    }
}

fn file_kind_cell(kind: Option<FileKind>) -> &'static str {
    match kind {
        None => "",
        Some(FileKind::RegularFile) => "regular-file",
        Some(FileKind::Directory) => "directory",
        Some(FileKind::Pipe) => "pipe",
        Some(FileKind::Socket) => "socket",
        Some(FileKind::Process) => "process",
        Some(FileKind::BlockDevice) => "block-device",
        Some(FileKind::CharDevice) => "char-device",
        Some(FileKind::Symlink) => "symlink",
        Some(FileKind::Timer) => "timer",
        Some(FileKind::Epoll) => "epoll",
        Some(FileKind::EventFd) => "eventfd",
        Some(FileKind::Other) => "other",
    }
}

/// Builds the embedded `path,dir,exec,flags` mini-CSV for one record's
/// `accesses` (spec §6). Sorted for determinism — `accesses` is a
/// `HashSet`, and the original's own iteration order isn't a guarantee
/// worth preserving, but a stable dump is.
fn accessed_as_cell(record: &FileRecord) -> Result<String> {
    let mut accesses: Vec<_> = record.accesses.iter().collect();
    accesses.sort_by(|a, b| {
        (a.pid, &a.rel_path, a.flags, a.executable).cmp(&(b.pid, &b.rel_path, b.flags, b.executable))
    });

    let mut writer = WriterBuilder::new().has_headers(false).from_writer(vec![]);
    for access in accesses {
        writer
            .write_record([
                access.rel_path.to_string_lossy().as_ref(),
                access.workdir.to_string_lossy().as_ref(),
                if access.executable { "1" } else { "0" },
                &access.flags.map(|f| f.to_string()).unwrap_or_default(),
            ])
            .map_err(|e| TracerError::EventSource(format!("writing embedded access row: {e}")))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| TracerError::EventSource(format!("flushing embedded access csv: {e}")))?;
    let text = String::from_utf8(bytes)
        .map_err(|e| TracerError::EventSource(format!("embedded access csv was not utf8: {e}")))?;
    Ok(text.trim_end_matches('\n').to_string())
}

/// Writes every `FileRecord` (filesystem-keyed and unbacked alike) as one
/// row to `path`, per spec §6's column list.
pub fn write_csv(global: &GlobalState, path: &Path) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| TracerError::EventSource(format!("opening {}: {e}", path.display())))?;

    writer
        .write_record([
            "RealPath",
            "WasEverCreated",
            "WasEverDeleted",
            "IsCurrentlyOnTheDisk",
            "WasInitiallyOnTheDisk",
            "FileType",
            "AccessedAs",
        ])
        .map_err(|e| TracerError::EventSource(format!("writing csv header: {e}")))?;

    let mut records: Vec<&FileRecord> = global
        .files_iter()
        .chain(global.non_file_records_iter())
        .collect();
    records.sort_by(|a, b| a.realpath.cmp(&b.realpath));

    for record in records {
        let accessed_as = accessed_as_cell(record)?;
        writer
            .write_record([
                record.realpath.as_str(),
                tristate_cell(record.was_ever_created),
                tristate_cell(record.was_ever_deleted),
                tristate_cell(record.is_currently_on_disk),
                tristate_cell(record.was_initially_on_disk),
                file_kind_cell(record.kind),
                &accessed_as,
            ])
            .map_err(|e| {
                TracerError::EventSource(format!("writing csv row for {}: {e}", record.realpath))
            })?;
    }

    writer
        .flush()
        .map_err(|e| TracerError::EventSource(format!("flushing {}: {e}", path.display())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AccessRecord;

    #[test]
    fn dumps_one_row_per_record_with_embedded_accesses() {
        let mut global = GlobalState::new("/tmp", Vec::new(), vec!["true".to_string()]);
        global.track_new_process(1);
        global.open_handling(1, "/tmp/b.txt", "b.txt", 7, 0, false);

        let tmp = tempfile::NamedTempFile::new().expect("tempfile");
        write_csv(&global, tmp.path()).expect("write_csv");

        let contents = std::fs::read_to_string(tmp.path()).expect("read back");
        assert!(contents.contains("RealPath,WasEverCreated"));
        assert!(contents.contains("/tmp/b.txt"));
        assert!(contents.contains("b.txt,/tmp,0,0"));
    }
}
