//! Compiler stage: turns a directory of source programs into a sibling directory holding only
//! the compiled artifacts.
//!
//! The source tree is copied next to the base directory as `<name>.abc/`, every top level source
//! file is compiled in place (the compiler writes its output beside its input), and finally
//! all subdirectories and source files are removed from the copy.

use crate::{
    fs,
    process::{self, Termination},
    toolchain::Toolchain,
    Error, Result, ARTIFACT_EXTENSION, SOURCE_EXTENSION,
};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub enum CompileOutcome {
    Compiled {
        artifact: PathBuf,
    },
    Failed {
        diagnostics: Vec<u8>,
        termination: Termination,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSource {
    /// File name of the source, relative to the artifact directory
    pub source: PathBuf,
    pub outcome: CompileOutcome,
}

impl CompiledSource {
    pub fn is_compiled(&self) -> bool {
        matches!(self.outcome, CompileOutcome::Compiled { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompileSummary {
    pub output_dir: PathBuf,
    pub sources: Vec<CompiledSource>,
}

impl CompileSummary {
    pub fn compiled(&self) -> usize {
        self.sources.iter().filter(|s| s.is_compiled()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &CompiledSource> {
        self.sources.iter().filter(|s| !s.is_compiled())
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// `<base_dir>/<name of source_dir>.abc`
pub fn output_dir_for(base_dir: &Path, source_dir: &Path) -> Result<PathBuf> {
    let source_dir = base_dir.join(source_dir);
    if !source_dir.is_dir() {
        return Err(Error::NotADirectory(source_dir));
    }

    let resolved = source_dir
        .canonicalize()
        .map_err(Error::fs("resolve", &source_dir))?;
    let name = resolved
        .file_name()
        .ok_or_else(|| Error::InvalidDirectoryName(source_dir.clone()))?;

    let mut dir_name = name.to_os_string();
    dir_name.push(".");
    dir_name.push(ARTIFACT_EXTENSION);
    Ok(base_dir.join(dir_name))
}

/// Rebuilds the artifact directory for `source_dir` from scratch.
///
/// Filesystem errors abort the whole operation, a source that fails to compile is only recorded
/// in the summary. `on_source` is called after each compiler invocation.
pub fn compile(
    toolchain: &Toolchain,
    base_dir: &Path,
    source_dir: &Path,
    mut on_source: impl FnMut(&CompiledSource),
) -> Result<CompileSummary> {
    let output_dir = output_dir_for(base_dir, source_dir)?;
    let source_dir = base_dir.join(source_dir);

    if fs::remove_dir_if_exists(&output_dir)? {
        log::info!("removed previous {}", output_dir.display());
    }
    fs::copy_dir_all(&source_dir, &output_dir)?;
    log::info!(
        "copied {} to {}",
        source_dir.display(),
        output_dir.display()
    );

    let mut sources = Vec::new();
    for path in fs::files_with_extension(&output_dir, SOURCE_EXTENSION)? {
        let compiled = compile_one(toolchain, &output_dir, &path);
        on_source(&compiled);
        sources.push(compiled);
    }

    clean(&output_dir)?;

    Ok(CompileSummary {
        output_dir,
        sources,
    })
}

fn compile_one(toolchain: &Toolchain, output_dir: &Path, path: &Path) -> CompiledSource {
    // files_with_extension only yields paths with a file name
    let file_name = PathBuf::from(path.file_name().unwrap_or_default());
    let artifact = path.with_extension(ARTIFACT_EXTENSION);

    let res = process::run(&toolchain.compile_invocation(&file_name, output_dir));

    // the compiler may exit successfully without writing anything, so the artifact decides
    let outcome = if res.succeeded() && artifact.is_file() {
        CompileOutcome::Compiled { artifact }
    } else {
        log::warn!("{} did not compile ({})", file_name.display(), res.termination);
        CompileOutcome::Failed {
            diagnostics: res.output,
            termination: res.termination,
        }
    };

    CompiledSource {
        source: file_name,
        outcome,
    }
}

// leaves only the compiled artifacts at the top level
fn clean(output_dir: &Path) -> Result<()> {
    for dir in fs::subdirectories(output_dir)? {
        std::fs::remove_dir_all(&dir).map_err(Error::fs("remove directory", &dir))?;
    }

    for entry in std::fs::read_dir(output_dir).map_err(Error::fs("read directory", output_dir))? {
        let path = entry
            .map_err(Error::fs("read directory", output_dir))?
            .path();
        if path.is_file() && fs::has_extension(&path, SOURCE_EXTENSION, true) {
            std::fs::remove_file(&path).map_err(Error::fs("remove", &path))?;
        }
    }

    Ok(())
}
