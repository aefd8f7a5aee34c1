use anyhow::Context;
use avmtest_core::{
    compare::format_speed, compile, report, CaseOutcome, CompileOutcome, CompiledSource,
    Comparison, RunSummary, Selection, Toolchain,
};
use owo_colors::OwoColorize;
use std::path::Path;

const INDENT: &str = "   ";

pub(crate) struct Harness<'a> {
    toolchain: &'a Toolchain,
    selection: Selection,
    trials: usize,
}

impl<'a> Harness<'a> {
    pub(crate) fn new(toolchain: &'a Toolchain) -> Self {
        Self {
            toolchain,
            selection: Selection::default(),
            trials: 1,
        }
    }

    pub(crate) fn selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    pub(crate) fn trials(mut self, trials: usize) -> Self {
        self.trials = trials;
        self
    }

    /// Compiles every source in `source_dir`, returns whether all of them compiled
    pub(crate) fn compile(&self, base_dir: &Path, source_dir: &Path) -> anyhow::Result<bool> {
        println!("Compiling source files...\n");

        let summary = compile::compile(self.toolchain, base_dir, source_dir, |source| {
            println!("{}", compile_line(source));
        })
        .with_context(|| format!("Failed to compile {}", source_dir.display()))?;

        for failure in summary.failures() {
            if let CompileOutcome::Failed { diagnostics, .. } = &failure.outcome {
                println!("\n{} {}", "ERRORS".red(), failure.source.display());
                print!("{}", String::from_utf8_lossy(diagnostics));
            }
        }

        println!();
        let failed = summary.sources.len() - summary.compiled();
        if failed > 0 {
            print!("{} {}, ", failed.red(), "failed".red());
        }
        println!(
            "{}/{} sources compiled into {}",
            summary.compiled(),
            summary.sources.len(),
            summary.output_dir.display()
        );

        Ok(summary.is_success())
    }

    /// Runs every case in `dir`, writes the failure reports and returns whether all cases passed
    pub(crate) fn test(&self, dir: &Path) -> anyhow::Result<bool> {
        println!("Running tests...\n");

        let summary = Comparison::new(self.toolchain)
            .trials(self.trials)
            .run_all(dir, &self.selection, |outcome| {
                println!("{}", outcome_line(outcome));
            })
            .with_context(|| format!("Failed to run the cases in {}", dir.display()))?;

        println!();
        println!("{}", summary_line(&summary));

        if let Some(failed_dir) = report::write_failures(dir, &summary.failures)
            .context("Failed to write the failure reports")?
        {
            println!("Failure reports written to {}", failed_dir.display());
        }

        Ok(summary.all_passed())
    }
}

fn compile_line(source: &CompiledSource) -> String {
    let status = match &source.outcome {
        CompileOutcome::Compiled { .. } => "OK".green().to_string(),
        CompileOutcome::Failed { termination, .. } => {
            format!("{} ({termination})", "FAIL".red())
        }
    };
    format!("{INDENT}{} {}", source.source.display(), status)
}

fn outcome_line(outcome: &CaseOutcome) -> String {
    match outcome {
        CaseOutcome::Passed { case, speed, .. } => {
            format!("{INDENT}{} {case} {}", "PASS".green(), format_speed(*speed))
        }
        CaseOutcome::Failed(record) => {
            format!("{INDENT}{} {}: {}", "FAIL".red(), record.case, record.kind)
        }
        CaseOutcome::Skipped { case } => format!("{INDENT}{} {case}", "SKIP".yellow()),
    }
}

fn summary_line(summary: &RunSummary) -> String {
    let mut line = String::new();
    if summary.skipped > 0 {
        line.push_str(&format!(
            "{} {}, ",
            summary.skipped.yellow(),
            "skipped".yellow()
        ));
    }
    line.push_str(&summary.bright_black().to_string());
    line
}
