//! Running external programs (the compiler and both interpreters).
//!
//! Invocations never fail from the caller's point of view: whatever the child managed to write
//! to stdout and stderr is captured as one combined stream, and how the child ended up is
//! described by [`Termination`]. If the program can't even be started, the launch error's text
//! becomes the captured output so there is always something to diff.

use std::{
    ffi::OsString,
    io::Read,
    path::{Path, PathBuf},
    process::{Child, Command, ExitStatus, Stdio},
    sync::{
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
        Arc, Mutex,
    },
    time::{Duration, Instant},
};

const POLL_INTERVAL: Duration = Duration::from_millis(5);
const READ_CHUNK_SIZE: usize = 8 * 1024;
// how long the pipes may stay open once the timeout has passed, e.g. held by a grandchild
const READER_GRACE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    Exited(i32),
    Signaled(i32),
    TimedOut,
    LaunchFailed(String),
}

impl Termination {
    pub fn is_success(&self) -> bool {
        matches!(self, Termination::Exited(0))
    }
}

impl From<ExitStatus> for Termination {
    fn from(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Termination::Exited(code);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Termination::Signaled(signal);
            }
        }

        // only reachable on platforms that report neither a code nor a signal
        Termination::Exited(-1)
    }
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Termination::Exited(code) => write!(f, "exit code {code}"),
            Termination::Signaled(signal) => write!(f, "killed by signal {signal}"),
            Termination::TimedOut => write!(f, "timed out"),
            Termination::LaunchFailed(reason) => write!(f, "failed to launch ({reason})"),
        }
    }
}

/// A program together with everything needed to run it once
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    program: PathBuf,
    args: Vec<OsString>,
    working_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I>(mut self, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl std::fmt::Display for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutput {
    /// Combined stdout and stderr, in the order the chunks arrived
    pub output: Vec<u8>,
    pub termination: Termination,
    pub elapsed: Duration,
}

impl ProcessOutput {
    pub fn succeeded(&self) -> bool {
        self.termination.is_success()
    }

    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.output)
    }
}

/// Runs the invocation and captures whatever it produces.
pub fn run(invocation: &Invocation) -> ProcessOutput {
    log::debug!("running {invocation}");
    let output = execute(invocation);
    log::debug!(
        "{} finished with {} after {:?}",
        invocation.program.display(),
        output.termination,
        output.elapsed
    );
    output
}

/// Same as [`run`], but an unsuccessful termination is logged as a warning.
pub fn check(invocation: &Invocation) -> ProcessOutput {
    let output = run(invocation);
    if !output.succeeded() {
        log::warn!("`{invocation}` ended with {}", output.termination);
    }
    output
}

fn execute(invocation: &Invocation) -> ProcessOutput {
    let start = Instant::now();

    let mut child = match invocation.command().spawn() {
        Ok(child) => child,
        Err(err) => {
            let reason = err.to_string();
            return ProcessOutput {
                output: format!("failed to launch {}: {reason}", invocation.program.display())
                    .into_bytes(),
                termination: Termination::LaunchFailed(reason),
                elapsed: start.elapsed(),
            };
        }
    };

    // both pipes drain into the same buffer so diagnostics stay interleaved with normal output
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let (done_tx, done_rx) = mpsc::channel();
    let mut readers = 0;
    if let Some(stdout) = child.stdout.take() {
        spawn_reader(stdout, Arc::clone(&buffer), done_tx.clone());
        readers += 1;
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_reader(stderr, Arc::clone(&buffer), done_tx.clone());
        readers += 1;
    }
    drop(done_tx);

    let termination = wait(&mut child, invocation.timeout, start);

    let limit = invocation
        .timeout
        .map(|timeout| timeout.saturating_sub(start.elapsed()) + READER_GRACE);
    match await_readers(&done_rx, readers, limit) {
        Drain::Complete => {}
        Drain::Abandoned => log::warn!(
            "output of {} was still open after the timeout, keeping what was captured so far",
            invocation.program.display()
        ),
        Drain::ReaderLost => log::warn!(
            "an output reader for {} panicked, some output may be lost",
            invocation.program.display()
        ),
    }
    let elapsed = start.elapsed();

    let output = match buffer.lock() {
        Ok(mut guard) => std::mem::take(&mut *guard),
        Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
    };

    ProcessOutput {
        output,
        termination,
        elapsed,
    }
}

// the thread is detached, `done` is signalled once the pipe is closed and never on a panic
fn spawn_reader(
    mut source: impl Read + Send + 'static,
    buffer: Arc<Mutex<Vec<u8>>>,
    done: Sender<()>,
) {
    std::thread::spawn(move || {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match source.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => match buffer.lock() {
                    Ok(mut guard) => guard.extend_from_slice(&chunk[..n]),
                    Err(_) => break,
                },
            }
        }
        // the receiver is gone once the invocation gave up on this reader
        let _ = done.send(());
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drain {
    Complete,
    /// The limit passed while a pipe was still open
    Abandoned,
    /// A reader went away without signalling, i.e. it panicked
    ReaderLost,
}

fn await_readers(done: &Receiver<()>, readers: usize, limit: Option<Duration>) -> Drain {
    let deadline = limit.map(|limit| Instant::now() + limit);
    for _ in 0..readers {
        let received = match deadline {
            Some(deadline) => {
                done.recv_timeout(deadline.saturating_duration_since(Instant::now()))
            }
            None => done.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(()) => {}
            Err(RecvTimeoutError::Timeout) => return Drain::Abandoned,
            Err(RecvTimeoutError::Disconnected) => return Drain::ReaderLost,
        }
    }
    Drain::Complete
}

fn wait(child: &mut Child, timeout: Option<Duration>, start: Instant) -> Termination {
    let timeout = match timeout {
        Some(timeout) => timeout,
        None => {
            return match child.wait() {
                Ok(status) => status.into(),
                Err(err) => Termination::LaunchFailed(format!("failed to wait: {err}")),
            }
        }
    };

    loop {
        match child.try_wait() {
            Ok(Some(status)) => return status.into(),
            Ok(None) if start.elapsed() >= timeout => {
                // if killing fails the child already exited, either way reap it
                let _ = child.kill();
                let _ = child.wait();
                return Termination::TimedOut;
            }
            Ok(None) => std::thread::sleep(POLL_INTERVAL),
            Err(err) => return Termination::LaunchFailed(format!("failed to wait: {err}")),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_utils::{sh, write_script};
    use pretty_assertions::assert_eq;

    #[test]
    fn captures_stdout_and_stderr() {
        let tmp = tempfile::tempdir().unwrap();
        let script = write_script(tmp.path(), "both", "echo out\necho err >&2\n");

        let res = run(&sh(&script));

        assert_eq!(res.termination, Termination::Exited(0));
        let text = res.text();
        assert!(text.contains("out\n"), "{text:?}");
        assert!(text.contains("err\n"), "{text:?}");
    }

    #[test]
    fn non_zero_exit_still_returns_output() {
        let tmp = tempfile::tempdir().unwrap();
        let script = write_script(tmp.path(), "fail", "echo partial\nexit 3\n");

        let res = check(&sh(&script));

        assert_eq!(res.termination, Termination::Exited(3));
        assert_eq!(res.output, b"partial\n");
        assert!(!res.succeeded());
    }

    #[test]
    fn crash_is_reported_as_signal() {
        let tmp = tempfile::tempdir().unwrap();
        let script = write_script(tmp.path(), "crash", "kill -SEGV $$\n");

        let res = check(&sh(&script));

        assert_eq!(res.termination, Termination::Signaled(11));
    }

    #[test]
    fn launch_failure_becomes_captured_text() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("does-not-exist");

        let res = check(&Invocation::new(&missing).arg("-abc"));

        assert!(matches!(res.termination, Termination::LaunchFailed(_)));
        assert!(res.text().starts_with("failed to launch"));
    }

    #[test]
    fn arguments_are_passed_verbatim() {
        let tmp = tempfile::tempdir().unwrap();
        let script = write_script(tmp.path(), "args", "for a; do echo \"[$a]\"; done\n");

        let res = run(&sh(&script).args(["-abc", "with space.abc"]));

        assert_eq!(res.text(), "[-abc]\n[with space.abc]\n");
    }

    #[test]
    fn runs_in_the_given_working_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let script = write_script(tmp.path(), "pwd", "pwd\n");
        let work = tmp.path().join("work");
        std::fs::create_dir(&work).unwrap();

        let res = run(&sh(&script).working_dir(&work));

        let reported = PathBuf::from(res.text().trim_end());
        assert_eq!(
            reported.canonicalize().unwrap(),
            work.canonicalize().unwrap()
        );
    }

    #[test]
    fn stdin_is_not_inherited() {
        let tmp = tempfile::tempdir().unwrap();
        let script = write_script(tmp.path(), "stdin", "cat\necho done\n");

        let res = run(&sh(&script));

        assert_eq!(res.text(), "done\n");
    }

    #[test]
    fn hung_process_is_killed_after_timeout() {
        let tmp = tempfile::tempdir().unwrap();
        let script = write_script(tmp.path(), "hang", "echo started\nexec sleep 30\n");

        let res = run(&sh(&script).timeout(Some(Duration::from_millis(200))));

        assert_eq!(res.termination, Termination::TimedOut);
        assert_eq!(res.output, b"started\n");
        assert!(res.elapsed < Duration::from_secs(10));
    }

    #[test]
    fn timeout_holds_when_a_grandchild_keeps_the_pipes_open() {
        let tmp = tempfile::tempdir().unwrap();
        // no `exec`, so killing the shell leaves `sleep` holding stdout and stderr
        let script = write_script(tmp.path(), "orphan", "echo started\nsleep 5\necho after\n");

        let res = run(&sh(&script).timeout(Some(Duration::from_millis(200))));

        assert_eq!(res.termination, Termination::TimedOut);
        assert_eq!(res.output, b"started\n");
        assert!(res.elapsed < Duration::from_secs(2), "{:?}", res.elapsed);
    }

    #[test]
    fn readers_that_finish_are_complete() {
        let (tx, rx) = mpsc::channel();
        tx.send(()).unwrap();
        tx.send(()).unwrap();

        assert_eq!(await_readers(&rx, 2, None), Drain::Complete);
    }

    #[test]
    fn reader_gone_without_signalling_is_lost() {
        let (tx, rx) = mpsc::channel::<()>();
        let panicking = std::thread::spawn(move || {
            let _tx = tx;
            panic!("reader failed");
        });
        assert!(panicking.join().is_err());

        assert_eq!(await_readers(&rx, 1, None), Drain::ReaderLost);
        assert_eq!(
            await_readers(&rx, 1, Some(Duration::from_millis(10))),
            Drain::ReaderLost
        );
    }

    #[test]
    fn open_pipe_past_the_limit_is_abandoned() {
        let (tx, rx) = mpsc::channel::<()>();

        let start = Instant::now();
        let drain = await_readers(&rx, 1, Some(Duration::from_millis(20)));

        assert_eq!(drain, Drain::Abandoned);
        assert!(start.elapsed() < Duration::from_secs(1));
        drop(tx);
    }

    #[test]
    fn display_shows_program_and_arguments() {
        let inv = Invocation::new("redshell/redshell").args(["-abc", "a.abc"]);
        assert_eq!(inv.to_string(), "redshell/redshell -abc a.abc");
    }

    #[test]
    fn termination_display() {
        assert_eq!(Termination::Exited(1).to_string(), "exit code 1");
        assert_eq!(Termination::Signaled(11).to_string(), "killed by signal 11");
        assert_eq!(Termination::TimedOut.to_string(), "timed out");
    }
}
