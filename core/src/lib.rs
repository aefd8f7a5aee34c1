mod fs;

pub mod compare;
pub mod compile;
pub mod process;
pub mod report;
pub mod toolchain;

#[cfg(all(test, unix))]
mod test_utils;

pub use compare::{
    CaseOutcome, Comparison, FailureKind, FailureRecord, RunSummary, Selection, TestCase,
};
pub use compile::{CompileOutcome, CompileSummary, CompiledSource};
pub use process::{Invocation, ProcessOutput, Termination};
pub use toolchain::{CommandSpec, Toolchain};

use std::path::{Path, PathBuf};

/*****************************************************************************************
 * Common Constants
 */

/// Extension of the source programs fed to the compiler
pub const SOURCE_EXTENSION: &str = "as";

/// Extension of the bytecode artifacts produced by the compiler
pub const ARTIFACT_EXTENSION: &str = "abc";

/// Name of the directory, inside the tested directory, that receives failure reports
pub const FAILED_DIR_NAME: &str = "failed";

/*****************************************************************************************
 * Error Types
 */

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Filesystem {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    NotADirectory(PathBuf),
    InvalidDirectoryName(PathBuf),
}

impl Error {
    // adapter for map_err that remembers what was being done to which path
    pub(crate) fn fs(action: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.to_path_buf();
        move |source| Self::Filesystem {
            action,
            path,
            source,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Filesystem { action, path, .. } => {
                write!(f, "Failed to {action} {}", path.display())
            }
            Error::NotADirectory(path) => {
                write!(f, "{} is not a directory", path.display())
            }
            Error::InvalidDirectoryName(path) => {
                write!(f, "Cannot derive a directory name from {}", path.display())
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Filesystem { source, .. } => Some(source),
            Error::NotADirectory(_) | Error::InvalidDirectoryName(_) => None,
        }
    }
}
