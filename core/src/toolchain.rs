//! Where the compiler and both interpreters live, and how they are invoked.

use crate::process::Invocation;
use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_JAVA: &str = "java";
pub const DEFAULT_ASC: &str = "redshell/asc.jar";
pub const DEFAULT_BUILTIN: &str = "redshell/builtin.abc";
pub const DEFAULT_TOPLEVEL: &str = "redshell/toplevel.abc";
pub const DEFAULT_REFERENCE: &str = "redshell/redshell";
pub const DEFAULT_CANDIDATE: &str = "avmshell/avmshell";

/// Flag telling the candidate interpreter that its input is a bytecode file
pub const CANDIDATE_ABC_FLAG: &str = "-abc";

/// A program plus the arguments that always precede the per-call ones
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn invocation(&self) -> Invocation {
        Invocation::new(&self.program).args(self.args.iter().cloned())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Toolchain {
    pub compiler: CommandSpec,
    /// Support artifacts imported by every compilation
    pub builtin: PathBuf,
    pub toplevel: PathBuf,
    pub reference: CommandSpec,
    pub candidate: CommandSpec,
    /// Applied to every interpreter run, compilations are never cut short
    pub timeout: Option<Duration>,
}

impl Toolchain {
    /// The layout next to the harness: the compiler jar, support artifacts and the reference
    /// interpreter under `redshell/`, the candidate under `avmshell/`
    pub fn with_defaults(base_dir: &Path) -> Self {
        Self {
            compiler: CommandSpec::new(DEFAULT_JAVA)
                .arg("-jar")
                .arg(base_dir.join(DEFAULT_ASC)),
            builtin: base_dir.join(DEFAULT_BUILTIN),
            toplevel: base_dir.join(DEFAULT_TOPLEVEL),
            reference: CommandSpec::new(base_dir.join(DEFAULT_REFERENCE)),
            candidate: CommandSpec::new(base_dir.join(DEFAULT_CANDIDATE)),
            timeout: None,
        }
    }

    pub(crate) fn compile_invocation(&self, source_file: &Path, working_dir: &Path) -> Invocation {
        self.compiler
            .invocation()
            .arg("-AS3")
            .arg("-import")
            .arg(&self.builtin)
            .arg("-import")
            .arg(&self.toplevel)
            .arg(source_file)
            .working_dir(working_dir)
    }

    pub(crate) fn reference_invocation(&self, artifact: &Path) -> Invocation {
        self.reference
            .invocation()
            .arg(artifact)
            .timeout(self.timeout)
    }

    pub(crate) fn candidate_invocation(&self, artifact: &Path) -> Invocation {
        self.candidate
            .invocation()
            .arg(CANDIDATE_ABC_FLAG)
            .arg(artifact)
            .timeout(self.timeout)
    }
}
