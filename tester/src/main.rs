mod harness;
mod logger;

use anyhow::Context;
use avmtest_core::{toolchain, CommandSpec, Selection, Toolchain};
use std::{
    path::{Path, PathBuf},
    process::ExitCode,
    time::Duration,
};

#[derive(Debug, Clone, Copy, PartialEq, clap::ValueEnum)]
enum Action {
    /// Compile a directory of sources into `<name>.abc`
    Compile,
    /// Run every artifact in a directory under both interpreters and compare
    Test,
}

#[derive(Debug, clap::Parser)]
#[command(about = "AVM2 test suite: compiles test programs and compares the candidate interpreter \
                   against the reference interpreter")]
struct Args {
    #[arg(value_enum)]
    action: Action,

    /// Source directory for `compile`, artifact directory for `test`
    #[arg(value_name = "DIR")]
    input: PathBuf,

    /// Directory every other relative path is resolved against [default: current directory]
    #[arg(long, value_name = "DIR")]
    base_dir: Option<PathBuf>,

    /// Java runtime used to run the compiler
    #[arg(long, value_name = "PATH", default_value = toolchain::DEFAULT_JAVA)]
    java: PathBuf,

    /// ActionScript compiler jar
    #[arg(long, value_name = "PATH", default_value = toolchain::DEFAULT_ASC)]
    asc: PathBuf,

    #[arg(long, value_name = "PATH", default_value = toolchain::DEFAULT_BUILTIN)]
    builtin: PathBuf,

    #[arg(long, value_name = "PATH", default_value = toolchain::DEFAULT_TOPLEVEL)]
    toplevel: PathBuf,

    /// Trusted interpreter whose output is the expected output
    #[arg(long, value_name = "PATH", default_value = toolchain::DEFAULT_REFERENCE)]
    reference: PathBuf,

    /// Interpreter under test, run with `-abc <artifact>`
    #[arg(long, value_name = "PATH", default_value = toolchain::DEFAULT_CANDIDATE)]
    candidate: PathBuf,

    /// Kill an interpreter that runs longer than this
    #[arg(long, value_name = "SECONDS", value_parser = parse_timeout)]
    timeout: Option<Duration>,

    /// Run each interpreter this many times per case and keep the fastest time
    #[arg(
        long,
        value_name = "N",
        default_value_t = 1,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    trials: u32,

    /// Only run the given cases
    #[arg(long, value_name = "CASE")]
    focus: Vec<String>,

    /// Don't run the given cases
    #[arg(long, value_name = "CASE")]
    skip: Vec<String>,

    /// Log more, repeat for even more
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log less
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "verbose")]
    quiet: u8,
}

fn parse_timeout(s: &str) -> Result<Duration, String> {
    let seconds: f64 = s.parse().map_err(|_| format!("{s} is not a number"))?;
    if seconds.is_finite() && seconds > 0.0 {
        Ok(Duration::from_secs_f64(seconds))
    } else {
        Err("must be a positive number of seconds".to_string())
    }
}

// bare program names are left for PATH lookup, anything with a directory is resolved
fn resolve_program(base_dir: &Path, program: &Path) -> PathBuf {
    if program.components().count() > 1 {
        base_dir.join(program)
    } else {
        program.to_path_buf()
    }
}

// the compiler runs inside the artifact directory, so every path handed to it must be absolute
fn resolve_base_dir(cwd: &Path, base_dir: Option<&Path>) -> PathBuf {
    match base_dir {
        Some(dir) => cwd.join(dir),
        None => cwd.to_path_buf(),
    }
}

impl Args {
    fn toolchain(&self, base_dir: &Path) -> Toolchain {
        Toolchain {
            compiler: CommandSpec::new(resolve_program(base_dir, &self.java))
                .arg("-jar")
                .arg(base_dir.join(&self.asc)),
            builtin: base_dir.join(&self.builtin),
            toplevel: base_dir.join(&self.toplevel),
            reference: CommandSpec::new(resolve_program(base_dir, &self.reference)),
            candidate: CommandSpec::new(resolve_program(base_dir, &self.candidate)),
            timeout: self.timeout,
        }
    }

    fn selection(&self) -> Selection {
        Selection {
            focused: self.focus.clone(),
            skipped: self.skip.clone(),
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    use clap::Parser;

    let args = Args::parse();

    logger::init(logger::level_filter(args.verbose, args.quiet))
        .context("Failed to install the logger")?;

    let cwd = std::env::current_dir().context("Failed to read the current directory")?;
    let base_dir = resolve_base_dir(&cwd, args.base_dir.as_deref());
    let toolchain = args.toolchain(&base_dir);
    log::debug!("{toolchain:#?}");

    let harness = harness::Harness::new(&toolchain)
        .selection(args.selection())
        .trials(args.trials as usize);

    let success = match args.action {
        Action::Compile => harness.compile(&base_dir, &args.input)?,
        Action::Test => harness.test(&base_dir.join(&args.input))?,
    };

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
