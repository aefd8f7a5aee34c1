// Thin wrappers over std::fs that attach the action and path to every error

use crate::{Error, Result};
use std::path::{Path, PathBuf};

pub(crate) fn remove_dir_if_exists(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    std::fs::remove_dir_all(path).map_err(Error::fs("remove directory", path))?;
    Ok(true)
}

pub(crate) fn recreate_dir(path: &Path) -> Result<()> {
    remove_dir_if_exists(path)?;
    std::fs::create_dir(path).map_err(Error::fs("create directory", path))
}

// `to` may live inside `from` (compiling `.`), so entries are listed before it is created
pub(crate) fn copy_dir_all(from: &Path, to: &Path) -> Result<()> {
    let entries = std::fs::read_dir(from)
        .and_then(|entries| entries.collect::<std::io::Result<Vec<_>>>())
        .map_err(Error::fs("read directory", from))?;

    std::fs::create_dir_all(to).map_err(Error::fs("create directory", to))?;

    for entry in entries {
        let src = entry.path();
        let dst = to.join(entry.file_name());

        let file_type = entry.file_type().map_err(Error::fs("inspect", &src))?;
        if file_type.is_dir() {
            copy_dir_all(&src, &dst)?;
        } else {
            std::fs::copy(&src, &dst).map_err(Error::fs("copy", &src))?;
        }
    }

    Ok(())
}

pub(crate) fn has_extension(path: &Path, extension: &str, ignore_case: bool) -> bool {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ignore_case => ext.eq_ignore_ascii_case(extension),
        Some(ext) => ext == extension,
        None => false,
    }
}

// files (not directories) directly inside `dir`, sorted by file name
pub(crate) fn files_with_extension(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(Error::fs("read directory", dir))? {
        let entry = entry.map_err(Error::fs("read directory", dir))?;
        let path = entry.path();
        if path.is_file() && has_extension(&path, extension, false) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

pub(crate) fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(Error::fs("read directory", dir))? {
        let entry = entry.map_err(Error::fs("read directory", dir))?;
        let file_type = entry.file_type().map_err(Error::fs("inspect", &entry.path()))?;
        if file_type.is_dir() {
            dirs.push(entry.path());
        }
    }
    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("main.as", "as", false => true)]
    #[test_case("main.AS", "as", false => false)]
    #[test_case("main.AS", "as", true => true)]
    #[test_case("main.abc", "as", true => false)]
    #[test_case("Makefile", "as", true => false)]
    fn extension_matching(name: &str, extension: &str, ignore_case: bool) -> bool {
        has_extension(Path::new(name), extension, ignore_case)
    }

    #[test]
    fn copy_dir_all_copies_nested_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let from = tmp.path().join("from");
        std::fs::create_dir_all(from.join("nested/deeper")).unwrap();
        std::fs::write(from.join("a.as"), "a").unwrap();
        std::fs::write(from.join("nested/deeper/b.as"), "b").unwrap();

        let to = tmp.path().join("to");
        copy_dir_all(&from, &to).unwrap();

        assert_eq!(std::fs::read_to_string(to.join("a.as")).unwrap(), "a");
        assert_eq!(
            std::fs::read_to_string(to.join("nested/deeper/b.as")).unwrap(),
            "b"
        );
    }

    #[test]
    fn copy_dir_all_into_own_subdirectory() {
        let tmp = tempfile::tempdir().unwrap();
        let from = tmp.path().join("suite");
        std::fs::create_dir_all(from.join("include")).unwrap();
        std::fs::write(from.join("a.as"), "a").unwrap();

        let to = from.join("suite.abc");
        copy_dir_all(&from, &to).unwrap();

        assert_eq!(std::fs::read_to_string(to.join("a.as")).unwrap(), "a");
        assert!(to.join("include").is_dir());
        assert!(!to.join("suite.abc").exists());
    }

    #[test]
    fn files_with_extension_is_sorted_and_flat() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["zeta.abc", "alpha.abc", "mid.abc", "notes.txt"] {
            std::fs::write(tmp.path().join(name), "").unwrap();
        }
        std::fs::create_dir(tmp.path().join("dir.abc")).unwrap();

        let names: Vec<_> = files_with_extension(tmp.path(), "abc")
            .unwrap()
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["alpha.abc", "mid.abc", "zeta.abc"]);
    }

    #[test]
    fn recreate_dir_discards_old_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("failed");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("stale.txt"), "old").unwrap();

        recreate_dir(&dir).unwrap();

        assert!(dir.is_dir());
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[test]
    fn remove_missing_dir_is_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(!remove_dir_if_exists(&tmp.path().join("nope")).unwrap());
    }
}
