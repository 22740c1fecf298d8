//! Helpers for running child processes with timeouts and bounded output.

use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

/// Run a command with a timeout and capture stdout/stderr without risking pipe deadlocks.
///
/// Output is read concurrently while the child runs. `output_limit_bytes` bounds the amount of
/// stdout/stderr stored in memory (bytes beyond this are discarded while still draining the pipe).
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = spawn(&mut cmd)?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

    let (status, timed_out) = wait_or_kill(&mut child, timeout)?;

    let (stdout, stdout_truncated) = join_output(stdout_handle).context("join stdout")?;
    let (stderr, stderr_truncated) = join_output(stderr_handle).context("join stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

/// Next item read from a [`LineStream`].
#[derive(Debug, PartialEq, Eq)]
pub enum StreamItem {
    Line(String),
    /// Stdout was closed.
    Eof,
    /// The stream's deadline passed before the next line arrived.
    TimedOut,
}

/// How a streamed child process ended.
#[derive(Debug)]
pub struct StreamExit {
    pub status: ExitStatus,
    pub stderr: Vec<u8>,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

/// A running child whose stdout is consumed line by line as it is produced.
///
/// A reader thread forwards stdout lines over a channel so the caller can
/// wait for each line with the remaining time budget. Stderr is drained
/// concurrently into a bounded buffer.
pub struct LineStream {
    child: Child,
    lines: Receiver<std::io::Result<String>>,
    stderr: thread::JoinHandle<Result<(Vec<u8>, usize)>>,
    deadline: Instant,
}

impl LineStream {
    #[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), stderr_limit_bytes))]
    pub fn spawn(mut cmd: Command, timeout: Duration, stderr_limit_bytes: usize) -> Result<Self> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!("spawning streamed child process");
        let mut child = spawn(&mut cmd)?;
        let deadline = Instant::now() + timeout;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("stdout was not piped"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("stderr was not piped"))?;

        let (sender, lines) = mpsc::channel();
        thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let failed = line.is_err();
                if sender.send(line).is_err() || failed {
                    break;
                }
            }
        });
        let stderr = thread::spawn(move || read_stream_limited(stderr, stderr_limit_bytes));

        Ok(Self {
            child,
            lines,
            stderr,
            deadline,
        })
    }

    /// Wait for the next stdout line within the remaining time budget.
    pub fn next_line(&mut self) -> Result<StreamItem> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        match self.lines.recv_timeout(remaining) {
            Ok(Ok(line)) => Ok(StreamItem::Line(line)),
            Ok(Err(err)) => Err(err).context("read child stdout"),
            Err(RecvTimeoutError::Timeout) => Ok(StreamItem::TimedOut),
            Err(RecvTimeoutError::Disconnected) => Ok(StreamItem::Eof),
        }
    }

    /// Wait for the child to exit within the remaining budget, killing it
    /// once the budget is spent.
    pub fn finish(mut self) -> Result<StreamExit> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        let (status, timed_out) = wait_or_kill(&mut self.child, remaining)?;
        self.collect(status, timed_out)
    }

    /// Kill the child without waiting for it to finish on its own.
    pub fn kill(mut self) -> Result<StreamExit> {
        if let Err(err) = self.child.kill() {
            debug!(err = %err, "kill streamed child (already exited?)");
        }
        let status = self.child.wait().context("wait command after kill")?;
        self.collect(status, false)
    }

    fn collect(self, status: ExitStatus, timed_out: bool) -> Result<StreamExit> {
        let (stderr, stderr_truncated) = join_output(self.stderr).context("join stderr")?;
        if stderr_truncated > 0 {
            warn!(stderr_truncated, "stderr truncated");
        }
        debug!(exit_code = ?status.code(), timed_out, "streamed command finished");
        Ok(StreamExit {
            status,
            stderr,
            stderr_truncated,
            timed_out,
        })
    }
}

fn spawn(cmd: &mut Command) -> Result<Child> {
    match cmd.spawn() {
        Ok(child) => Ok(child),
        Err(e) => {
            error!(err = %e, program = ?cmd.get_program(), "failed to spawn command");
            Err(e).with_context(|| format!("spawn {}", cmd.get_program().to_string_lossy()))
        }
    }
}

fn wait_or_kill(child: &mut Child, timeout: Duration) -> Result<(ExitStatus, bool)> {
    match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => Ok((status, false)),
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            child.kill().context("kill command")?;
            let status = child.wait().context("wait command after kill")?;
            Ok((status, true))
        }
    }
}

fn join_output(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn captures_output_within_limit() {
        let output = run_command_with_timeout(
            sh("printf 'hello world'; printf 'oops' >&2"),
            Duration::from_secs(10),
            5,
        )
        .expect("run");
        assert!(output.status.success());
        assert_eq!(output.stdout, b"hello");
        assert_eq!(output.stdout_truncated, 6);
        assert_eq!(output.stderr, b"oops");
        assert!(!output.timed_out);
    }

    #[test]
    fn streams_lines_in_order() {
        let mut stream =
            LineStream::spawn(sh("echo one; echo two"), Duration::from_secs(10), 1024)
                .expect("spawn");
        assert_eq!(stream.next_line().expect("line"), StreamItem::Line("one".to_string()));
        assert_eq!(stream.next_line().expect("line"), StreamItem::Line("two".to_string()));
        assert_eq!(stream.next_line().expect("eof"), StreamItem::Eof);
        let exit = stream.finish().expect("finish");
        assert!(exit.status.success());
        assert!(!exit.timed_out);
    }

    #[test]
    fn stream_times_out_and_kills() {
        let mut stream =
            LineStream::spawn(sh("exec sleep 30"), Duration::from_millis(200), 1024)
                .expect("spawn");
        assert_eq!(stream.next_line().expect("timeout"), StreamItem::TimedOut);
        let exit = stream.finish().expect("finish");
        assert!(exit.timed_out);
        assert!(!exit.status.success());
    }
}
