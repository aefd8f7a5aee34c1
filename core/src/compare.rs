//! Comparison stage: runs every artifact under both interpreters and compares what they print.
//!
//! A case passes only when the captured outputs are byte-identical. How each interpreter
//! terminated is kept so a failure can say whether the candidate crashed or merely disagreed,
//! but it never changes the verdict.

use crate::{
    fs,
    process::{self, ProcessOutput, Termination},
    toolchain::Toolchain,
    Result, ARTIFACT_EXTENSION,
};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// Below this the candidate's run time is too small to divide by
pub const MIN_MEASURABLE: Duration = Duration::from_micros(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub name: String,
    pub artifact: PathBuf,
}

impl TestCase {
    pub fn from_artifact(artifact: PathBuf) -> Self {
        let name = artifact
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { name, artifact }
    }
}

/// All artifacts directly inside `dir`, ordered by case name
pub fn discover_cases(dir: &Path) -> Result<Vec<TestCase>> {
    let mut cases: Vec<_> = fs::files_with_extension(dir, ARTIFACT_EXTENSION)?
        .into_iter()
        .map(TestCase::from_artifact)
        .collect();
    cases.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(cases)
}

/// Which cases to run; focusing any case skips every case that isn't focused
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub focused: Vec<String>,
    pub skipped: Vec<String>,
}

impl Selection {
    pub fn includes(&self, case: &str) -> bool {
        if self.skipped.iter().any(|name| name == case) {
            return false;
        }
        self.focused.is_empty() || self.focused.iter().any(|name| name == case)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    OutputMismatch,
    CandidateCrashed,
    ReferenceCrashed,
    BothCrashed,
    TimedOut,
    LaunchFailed,
}

impl FailureKind {
    pub fn classify(reference: &Termination, candidate: &Termination) -> Self {
        let either = |f: fn(&Termination) -> bool| f(reference) || f(candidate);

        if either(|t| matches!(t, Termination::LaunchFailed(_))) {
            FailureKind::LaunchFailed
        } else if either(|t| matches!(t, Termination::TimedOut)) {
            FailureKind::TimedOut
        } else {
            match (reference.is_success(), candidate.is_success()) {
                (true, true) => FailureKind::OutputMismatch,
                (true, false) => FailureKind::CandidateCrashed,
                (false, true) => FailureKind::ReferenceCrashed,
                (false, false) => FailureKind::BothCrashed,
            }
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            FailureKind::OutputMismatch => "output mismatch",
            FailureKind::CandidateCrashed => "candidate crashed",
            FailureKind::ReferenceCrashed => "reference crashed",
            FailureKind::BothCrashed => "both crashed",
            FailureKind::TimedOut => "timed out",
            FailureKind::LaunchFailed => "failed to launch",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailureRecord {
    pub case: String,
    pub kind: FailureKind,
    /// What the reference interpreter printed
    pub expected: Vec<u8>,
    /// What the candidate interpreter printed
    pub result: Vec<u8>,
    pub reference: Termination,
    pub candidate: Termination,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaseOutcome {
    Passed {
        case: String,
        speed: Option<f64>,
        reference_elapsed: Duration,
        candidate_elapsed: Duration,
    },
    Failed(FailureRecord),
    Skipped {
        case: String,
    },
}

impl CaseOutcome {
    pub fn case(&self) -> &str {
        match self {
            CaseOutcome::Passed { case, .. } | CaseOutcome::Skipped { case } => case,
            CaseOutcome::Failed(record) => &record.case,
        }
    }
}

/// How many times faster the candidate is than the reference, if that can be measured
pub fn speed_factor(reference: Duration, candidate: Duration) -> Option<f64> {
    if candidate < MIN_MEASURABLE {
        None
    } else {
        Some(reference.as_secs_f64() / candidate.as_secs_f64())
    }
}

pub fn format_speed(speed: Option<f64>) -> String {
    match speed {
        Some(factor) => format!("[{factor:.5}]"),
        None => "[--]".to_string(),
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct RunSummary {
    /// Cases that were actually run
    pub total: usize,
    pub passed: usize,
    pub skipped: usize,
    pub failures: Vec<FailureRecord>,
}

impl RunSummary {
    pub fn record(&mut self, outcome: CaseOutcome) {
        match outcome {
            CaseOutcome::Passed { .. } => {
                self.total += 1;
                self.passed += 1;
            }
            CaseOutcome::Failed(record) => {
                self.total += 1;
                self.failures.push(record);
            }
            CaseOutcome::Skipped { .. } => {
                self.skipped += 1;
            }
        }
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn all_passed(&self) -> bool {
        self.failures.is_empty()
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} tests passed", self.passed, self.total)
    }
}

pub struct Comparison<'a> {
    toolchain: &'a Toolchain,
    trials: usize,
}

impl<'a> Comparison<'a> {
    pub fn new(toolchain: &'a Toolchain) -> Self {
        Self {
            toolchain,
            trials: 1,
        }
    }

    /// Run each interpreter `trials` times per case, alternating which one goes first, and keep
    /// the fastest time of each. Outputs are always taken from the first trial.
    pub fn trials(mut self, trials: usize) -> Self {
        self.trials = trials.max(1);
        self
    }

    pub fn run_case(&self, case: &TestCase) -> CaseOutcome {
        log::debug!("running case {}", case.name);

        let (reference, candidate) = self.execute(case);

        if reference.output == candidate.output {
            if reference.termination != candidate.termination {
                log::info!(
                    "{}: same output but reference ended with {} and candidate with {}",
                    case.name,
                    reference.termination,
                    candidate.termination
                );
            }
            CaseOutcome::Passed {
                case: case.name.clone(),
                speed: speed_factor(reference.elapsed, candidate.elapsed),
                reference_elapsed: reference.elapsed,
                candidate_elapsed: candidate.elapsed,
            }
        } else {
            CaseOutcome::Failed(FailureRecord {
                case: case.name.clone(),
                kind: FailureKind::classify(&reference.termination, &candidate.termination),
                expected: reference.output,
                result: candidate.output,
                reference: reference.termination,
                candidate: candidate.termination,
            })
        }
    }

    /// Runs every selected case in `dir`, handing each outcome to `on_case` as soon as it is known
    pub fn run_all(
        &self,
        dir: &Path,
        selection: &Selection,
        mut on_case: impl FnMut(&CaseOutcome),
    ) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        for case in discover_cases(dir)? {
            let outcome = if selection.includes(&case.name) {
                self.run_case(&case)
            } else {
                CaseOutcome::Skipped { case: case.name }
            };
            on_case(&outcome);
            summary.record(outcome);
        }

        Ok(summary)
    }

    fn execute(&self, case: &TestCase) -> (ProcessOutput, ProcessOutput) {
        let run_reference =
            || process::check(&self.toolchain.reference_invocation(&case.artifact));
        let run_candidate =
            || process::check(&self.toolchain.candidate_invocation(&case.artifact));

        let mut reference = run_reference();
        let mut candidate = run_candidate();

        for trial in 1..self.trials {
            let (r, c) = if trial % 2 == 1 {
                let c = run_candidate();
                (run_reference(), c)
            } else {
                let r = run_reference();
                (r, run_candidate())
            };
            reference.elapsed = reference.elapsed.min(r.elapsed);
            candidate.elapsed = candidate.elapsed.min(c.elapsed);
        }

        (reference, candidate)
    }
}
