//! Test-command execution with a time budget.
//!
//! Commands run through the platform shell inside the sandbox. Output pipes
//! are drained on background threads so a chatty command cannot block on a
//! full pipe while we wait for it. When the command exits or times out its
//! whole process group is killed, so stray background jobs cannot hold the
//! caller past the time budget.

use log::{debug, warn};
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

/// How a command finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecStatus {
    /// Ran to completion; `code` is `None` when killed by a signal
    Exited { code: Option<i32> },
    /// Exceeded the time budget and was killed
    Timeout { limit: Duration },
    /// Could not be started or waited on
    SpawnFailed { message: String },
}

/// Captured outcome of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    pub status: ExecStatus,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ExecResult {
    /// Exited with status 0.
    pub fn success(&self) -> bool {
        matches!(self.status, ExecStatus::Exited { code: Some(0) })
    }

    pub fn timed_out(&self) -> bool {
        matches!(self.status, ExecStatus::Timeout { .. })
    }

    fn spawn_failed(message: String, elapsed: Duration) -> Self {
        Self {
            status: ExecStatus::SpawnFailed { message },
            stdout: String::new(),
            stderr: String::new(),
            elapsed,
        }
    }
}

fn shell(command: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd
    }
}

/// How long output readers may lag behind the command once its process
/// group is gone. Only a process that left the group keeps a pipe open.
const PIPE_GRACE: Duration = Duration::from_millis(250);

/// Run `command` in `dir`, killing it after `timeout`.
///
/// Never returns an error: failures to start the command are reported as
/// [`ExecStatus::SpawnFailed`]. Background processes the command leaves
/// behind are killed with it.
pub fn exec_cmd(dir: &Path, command: &str, timeout: Option<Duration>) -> ExecResult {
    let start = Instant::now();

    let mut cmd = shell(command);
    cmd.current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            warn!("failed to spawn `{command}`: {err}");
            return ExecResult::spawn_failed(err.to_string(), start.elapsed());
        }
    };

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let waited = match timeout {
        Some(limit) => child.wait_timeout(limit),
        None => child.wait().map(Some),
    };

    match waited {
        Ok(Some(status)) => {
            let elapsed = start.elapsed();
            debug!("`{command}` finished with {status} in {elapsed:?}");
            kill_group(&child);
            ExecResult {
                status: exit_status(status),
                stdout: collect(stdout, command),
                stderr: collect(stderr, command),
                elapsed,
            }
        }
        Ok(None) => {
            let limit = timeout.unwrap_or_default();
            kill_tree(&mut child);
            let elapsed = start.elapsed();
            warn!("`{command}` timed out after {elapsed:?} (limit: {limit:?})");
            ExecResult {
                status: ExecStatus::Timeout { limit },
                stdout: collect(stdout, command),
                stderr: collect(stderr, command),
                elapsed,
            }
        }
        Err(err) => {
            kill_tree(&mut child);
            ExecResult::spawn_failed(format!("failed to wait: {err}"), start.elapsed())
        }
    }
}

fn exit_status(status: ExitStatus) -> ExecStatus {
    ExecStatus::Exited {
        code: status.code(),
    }
}

/// Output accumulated by a reader thread, plus a signal sent at end of stream.
struct PipeReader {
    buf: Arc<Mutex<Vec<u8>>>,
    done: Receiver<()>,
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<PipeReader> {
    pipe.map(|mut pipe| {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let (tx, done) = mpsc::channel();
        let shared = Arc::clone(&buf);
        thread::spawn(move || {
            let mut chunk = [0u8; 8192];
            // A read error leaves whatever arrived before it
            while let Ok(n) = pipe.read(&mut chunk) {
                if n == 0 {
                    break;
                }
                match shared.lock() {
                    Ok(mut buf) => buf.extend_from_slice(&chunk[..n]),
                    Err(_) => break,
                }
            }
            let _ = tx.send(());
        });
        PipeReader { buf, done }
    })
}

fn collect(reader: Option<PipeReader>, command: &str) -> String {
    let Some(reader) = reader else {
        return String::new();
    };
    if let Err(RecvTimeoutError::Timeout) = reader.done.recv_timeout(PIPE_GRACE) {
        warn!("`{command}` left a process holding its output open; output may be partial");
    }
    let buf = match reader.buf.lock() {
        Ok(buf) => buf,
        Err(poisoned) => poisoned.into_inner(),
    };
    let text = String::from_utf8_lossy(&buf).into_owned();
    text
}

/// Kill whatever is left in the command's process group.
fn kill_group(child: &Child) {
    #[cfg(unix)]
    {
        if let Ok(pid) = i32::try_from(child.id()) {
            // SAFETY: kill(2) with a negative pid signals the process group we
            // created for this child; it touches no memory. A group that is
            // already empty yields ESRCH.
            unsafe {
                libc::kill(-pid, libc::SIGKILL);
            }
        }
    }
    #[cfg(not(unix))]
    let _ = child;
}

/// Kill the command and everything it spawned, then reap it.
fn kill_tree(child: &mut Child) {
    kill_group(child);
    let _ = child.kill();
    let _ = child.wait();
}
