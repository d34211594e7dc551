//! Process runner for CODESYS launches.
//!
//! Provides [`SystemProcessRunner`], which spawns the process described by a
//! [`LaunchSpec`], accumulates stdout and stderr as they arrive, and enforces
//! a wall-clock timeout. On expiry the process is asked to stop (SIGTERM to
//! its process group on unix, `taskkill /T` on its process tree on Windows)
//! and force-killed if it is still running after a short grace window.

use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

use super::classify::{self, TIMEOUT_MARKER};
use super::command::LaunchSpec;
use super::executor::{ProcessOutcome, ProcessRunner, SpawnError};

/// Maximum stdout or stderr size kept per stream (10 MiB).
///
/// Output past this limit is still drained so the child never blocks on a
/// full pipe, but it is discarded.
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Read buffer size for each stream.
const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Time between the graceful stop request and the forced kill.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(2);

/// How long to keep reading pipes after the process exited. A grandchild that
/// inherited the pipes can keep them open indefinitely.
const STREAM_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Windows `CREATE_NO_WINDOW` process creation flag.
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Which pipe a reader is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamKind {
    Stdout,
    Stderr,
}

/// Runs launch specs as real OS processes.
#[derive(Debug, Clone)]
pub struct SystemProcessRunner {
    kill_grace: Duration,
}

impl Default for SystemProcessRunner {
    fn default() -> Self {
        Self {
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }
}

impl SystemProcessRunner {
    pub fn with_kill_grace(kill_grace: Duration) -> Self {
        Self { kill_grace }
    }
}

impl ProcessRunner for SystemProcessRunner {
    async fn run(&self, spec: &LaunchSpec, timeout: Duration) -> ProcessOutcome {
        run_process(spec, timeout, self.kill_grace).await
    }
}

fn build_command(spec: &LaunchSpec) -> Command {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .current_dir(&spec.working_directory)
        .envs(spec.env.iter().map(|(k, v)| (k, v)))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Own process group so termination reaches anything the shell started.
    #[cfg(unix)]
    cmd.process_group(0);

    #[cfg(windows)]
    {
        cmd.creation_flags(CREATE_NO_WINDOW);
        if let Some(raw) = &spec.raw_arg {
            cmd.raw_arg(raw);
        }
    }

    cmd
}

/// Spawn `spec`, capture both streams and enforce `timeout`.
pub async fn run_process(spec: &LaunchSpec, timeout: Duration, kill_grace: Duration) -> ProcessOutcome {
    let start = Instant::now();
    let mut cmd = build_command(spec);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            tracing::error!(program = %spec.program.display(), error = %e, "Spawn failed");
            return ProcessOutcome::launch_failed(SpawnError::from(&e));
        }
    };
    tracing::debug!(pid = ?child.id(), "Process started");

    let stdout_buf = Arc::new(Mutex::new(Vec::new()));
    let stderr_buf = Arc::new(Mutex::new(Vec::new()));
    let stdout_task = tokio::spawn(read_stream(
        child.stdout.take(),
        StreamKind::Stdout,
        Arc::clone(&stdout_buf),
    ));
    let stderr_task = tokio::spawn(read_stream(
        child.stderr.take(),
        StreamKind::Stderr,
        Arc::clone(&stderr_buf),
    ));

    let (exit_code, timed_out, wait_error) =
        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::info!(exit_code = ?status.code(), "Process closed");
                (status.code(), false, None)
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Waiting on process failed");
                terminate(&mut child, kill_grace).await;
                (None, false, Some(e))
            }
            Err(_elapsed) => {
                tracing::warn!(timeout_ms = timeout.as_millis() as u64, "Process timeout reached");
                terminate(&mut child, kill_grace).await;
                (None, true, None)
            }
        };

    drain(stdout_task, stderr_task).await;

    let mut stdout = take_text(&stdout_buf);
    let mut stderr = take_text(&stderr_buf);
    if timed_out {
        append_line(&mut stderr, TIMEOUT_MARKER);
    }
    if let Some(e) = wait_error {
        append_line(&mut stderr, &format!("Failed waiting for process: {e}"));
    }
    if stdout.len() >= MAX_OUTPUT_BYTES {
        stdout.push_str("\n[stdout truncated]");
    }

    ProcessOutcome {
        exit_code,
        stdout,
        stderr,
        launch_error: None,
        timed_out,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

/// Append `line` to `text` on a line of its own, without leading blank
/// lines.
fn append_line(text: &mut String, line: &str) {
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(line);
}

/// Ask the process (group or tree) to stop, then force it after `grace`.
///
/// Returns once the child has been reaped.
async fn terminate(child: &mut Child, grace: Duration) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        if signal_group(pid, nix::sys::signal::Signal::SIGTERM) {
            tracing::info!(pid, "SIGTERM sent");
            if tokio::time::timeout(grace, child.wait()).await.is_ok() {
                return;
            }
            tracing::warn!(pid, grace_ms = grace.as_millis() as u64, "SIGTERM ignored, sending SIGKILL");
            signal_group(pid, nix::sys::signal::Signal::SIGKILL);
        }
    }

    // Under the shell strategy the child is cmd.exe and CODESYS its child,
    // so both steps target the whole tree.
    #[cfg(windows)]
    if let Some(pid) = child.id() {
        if taskkill(pid, false).await {
            tracing::info!(pid, "Stop request sent to process tree");
            if tokio::time::timeout(grace, child.wait()).await.is_ok() {
                return;
            }
        }
        tracing::warn!(pid, grace_ms = grace.as_millis() as u64, "Process tree still running, forcing");
        taskkill(pid, true).await;
    }

    #[cfg(not(any(unix, windows)))]
    let _ = grace;

    if let Err(e) = child.start_kill() {
        tracing::debug!(error = %e, "Kill request failed (process likely exited)");
    }
    if let Err(e) = child.wait().await {
        tracing::warn!(error = %e, "Failed to reap killed process");
    }
}

/// Arguments for `taskkill` targeting the tree rooted at `pid`.
#[cfg_attr(not(windows), allow(dead_code))]
fn taskkill_args(pid: u32, force: bool) -> Vec<String> {
    let mut args = vec!["/PID".to_string(), pid.to_string(), "/T".to_string()];
    if force {
        args.push("/F".to_string());
    }
    args
}

#[cfg(windows)]
async fn taskkill(pid: u32, force: bool) -> bool {
    let status = Command::new("taskkill")
        .args(taskkill_args(pid, force))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .creation_flags(CREATE_NO_WINDOW)
        .status()
        .await;
    match status {
        Ok(status) => status.success(),
        Err(e) => {
            tracing::warn!(pid, force, error = %e, "Failed to run taskkill");
            false
        }
    }
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: nix::sys::signal::Signal) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match nix::sys::signal::killpg(nix::unistd::Pid::from_raw(raw), signal) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(pid, ?signal, error = %e, "Signalling process group failed");
            false
        }
    }
}

/// Wait for both readers, giving up after [`STREAM_DRAIN_TIMEOUT`].
async fn drain(
    stdout_task: tokio::task::JoinHandle<()>,
    stderr_task: tokio::task::JoinHandle<()>,
) {
    let stdout_abort = stdout_task.abort_handle();
    let stderr_abort = stderr_task.abort_handle();
    let joined = tokio::time::timeout(STREAM_DRAIN_TIMEOUT, async {
        let _ = stdout_task.await;
        let _ = stderr_task.await;
    })
    .await;
    if joined.is_err() {
        tracing::warn!("Output pipes still open after exit; keeping what was captured");
        stdout_abort.abort();
        stderr_abort.abort();
    }
}

/// Append everything read from `handle` to `buf`, chunk by chunk.
async fn read_stream<R: AsyncRead + Unpin>(
    handle: Option<R>,
    kind: StreamKind,
    buf: Arc<Mutex<Vec<u8>>>,
) {
    let Some(mut reader) = handle else {
        return;
    };
    let mut chunk = vec![0u8; READ_CHUNK_BYTES];
    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(stream = ?kind, error = %e, "Stream read failed");
                break;
            }
        };
        let Some(bytes) = chunk.get(..n) else {
            break;
        };
        log_chunk(kind, bytes);

        let Ok(mut captured) = buf.lock() else {
            break;
        };
        let room = MAX_OUTPUT_BYTES.saturating_sub(captured.len());
        captured.extend_from_slice(bytes.get(..n.min(room)).unwrap_or_default());
    }
}

fn log_chunk(kind: StreamKind, bytes: &[u8]) {
    let text = String::from_utf8_lossy(bytes);
    match kind {
        StreamKind::Stdout => tracing::trace!(chunk = %text, "stdout chunk"),
        StreamKind::Stderr => match classify::detect_stderr_signal(&text) {
            Some(reason) => tracing::warn!(%reason, chunk = %text, "Known failure signature on stderr"),
            None => tracing::trace!(chunk = %text, "stderr chunk"),
        },
    }
}

fn take_text(buf: &Mutex<Vec<u8>>) -> String {
    match buf.lock() {
        Ok(mut bytes) => String::from_utf8_lossy(&std::mem::take(&mut *bytes)).into_owned(),
        Err(_) => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
