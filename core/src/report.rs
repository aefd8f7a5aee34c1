//! Failure reports written to `<tested dir>/failed/<case>.txt`.

use crate::{compare::FailureRecord, fs, Error, Result, FAILED_DIR_NAME};
use std::{
    io::Write,
    path::{Path, PathBuf},
};

pub fn failed_dir(tested_dir: &Path) -> PathBuf {
    tested_dir.join(FAILED_DIR_NAME)
}

/// Replaces the `failed` directory with one report per record.
///
/// Nothing from a previous run survives: with no failures the directory is removed and `None`
/// is returned.
pub fn write_failures(tested_dir: &Path, failures: &[FailureRecord]) -> Result<Option<PathBuf>> {
    let dir = failed_dir(tested_dir);

    if failures.is_empty() {
        if fs::remove_dir_if_exists(&dir)? {
            log::info!("removed stale {}", dir.display());
        }
        return Ok(None);
    }

    fs::recreate_dir(&dir)?;
    for record in failures {
        let path = dir.join(format!("{}.txt", record.case));
        let mut file = std::fs::File::create(&path).map_err(Error::fs("create", &path))?;
        write_record(&mut file, record).map_err(Error::fs("write", &path))?;
        log::debug!("wrote {}", path.display());
    }

    Ok(Some(dir))
}

// captured outputs are written as raw bytes, never re-encoded
fn write_record(out: &mut impl Write, record: &FailureRecord) -> std::io::Result<()> {
    writeln!(out, "Kind: {}", record.kind)?;
    writeln!(out, "Reference: {}", record.reference)?;
    writeln!(out, "Candidate: {}", record.candidate)?;
    out.write_all(b"\nExpected: ")?;
    out.write_all(&record.expected)?;
    out.write_all(b"\n\nResult: ")?;
    out.write_all(&record.result)?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{compare::FailureKind, process::Termination};
    use pretty_assertions::assert_eq;

    fn record(case: &str, expected: &[u8], result: &[u8]) -> FailureRecord {
        FailureRecord {
            case: case.into(),
            kind: FailureKind::OutputMismatch,
            expected: expected.to_vec(),
            result: result.to_vec(),
            reference: Termination::Exited(0),
            candidate: Termination::Exited(0),
        }
    }

    #[test]
    fn report_contains_both_outputs_verbatim() {
        let tmp = tempfile::tempdir().unwrap();

        let dir = write_failures(tmp.path(), &[record("add_test", b"42\n", b"43\n")])
            .unwrap()
            .unwrap();

        let contents = std::fs::read_to_string(dir.join("add_test.txt")).unwrap();
        assert_eq!(
            contents,
            "Kind: output mismatch\n\
             Reference: exit code 0\n\
             Candidate: exit code 0\n\
             \n\
             Expected: 42\n\
             \n\
             \n\
             Result: 43\n"
        );
    }

    #[test]
    fn non_utf8_output_is_not_reencoded() {
        let tmp = tempfile::tempdir().unwrap();
        let garbage = [0xff, 0xfe, b'\n'];

        let dir = write_failures(tmp.path(), &[record("bytes", b"ok", &garbage)])
            .unwrap()
            .unwrap();

        let contents = std::fs::read(dir.join("bytes.txt")).unwrap();
        assert!(contents.ends_with(b"Result: \xff\xfe\n"));
    }

    #[test]
    fn one_file_per_failure_and_old_reports_discarded() {
        let tmp = tempfile::tempdir().unwrap();
        let stale = failed_dir(tmp.path());
        std::fs::create_dir(&stale).unwrap();
        std::fs::write(stale.join("old_case.txt"), "old").unwrap();

        write_failures(tmp.path(), &[record("a", b"1", b"2"), record("b", b"3", b"4")]).unwrap();

        let mut names: Vec<_> = std::fs::read_dir(&stale)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn no_failures_leaves_no_failed_dir() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(failed_dir(tmp.path())).unwrap();

        assert_eq!(write_failures(tmp.path(), &[]).unwrap(), None);
        assert!(!failed_dir(tmp.path()).exists());

        assert_eq!(write_failures(tmp.path(), &[]).unwrap(), None);
    }
}
