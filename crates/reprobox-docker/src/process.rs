//! Running the Docker client as a child process with a time limit and
//! bounded output capture.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::error::DockerError;
use crate::Result;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Bytes discarded beyond the output limit.
    pub truncated: usize,
    pub timed_out: bool,
    pub elapsed: Duration,
}

impl CommandOutput {
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.status.success()
    }

    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim_end().to_string()
    }

    /// Stdout followed by stderr, with a note when output was truncated.
    pub fn combined_text(&self) -> String {
        let mut text = self.stdout_text();
        text.push_str(&String::from_utf8_lossy(&self.stderr));
        if self.truncated > 0 {
            text.push_str(&format!("\n[output truncated {} bytes]\n", self.truncated));
        }
        text
    }

    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX)
    }
}

/// How long to keep draining pipes after the child has exited. A grandchild
/// that inherited the pipes can hold them open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Run `cmd`, killing it once `timeout` elapses.
///
/// Stdout and stderr are drained on reader threads while the child runs so a
/// chatty process can never block on a full pipe; at most
/// `output_limit_bytes` of each stream is kept. Once the child has exited the
/// readers get [`DRAIN_GRACE`] to finish, after which whatever they captured
/// is returned and they are left to run down on their own.
pub fn run_command_with_timeout(
    mut cmd: Command,
    timeout: Option<Duration>,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let started = Instant::now();
    let mut child = cmd.spawn()?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| DockerError::Output("stdout was not piped".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| DockerError::Output("stderr was not piped".to_string()))?;

    let (done_tx, done_rx) = mpsc::channel();
    let stdout_capture = spawn_reader(stdout, output_limit_bytes, done_tx.clone());
    let stderr_capture = spawn_reader(stderr, output_limit_bytes, done_tx);

    let mut timed_out = false;
    let status = match timeout {
        None => child.wait()?,
        Some(limit) => match child.wait_timeout(limit)? {
            Some(status) => status,
            None => {
                warn!(timeout_secs = limit.as_secs(), "Command timed out, killing");
                timed_out = true;
                child.kill()?;
                child.wait()?
            }
        },
    };

    await_readers(&done_rx, 2)?;

    let (stdout, stdout_truncated) = stdout_capture.take();
    let (stderr, stderr_truncated) = stderr_capture.take();
    let truncated = stdout_truncated + stderr_truncated;
    if truncated > 0 {
        warn!(truncated, "Command output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "Command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        truncated,
        timed_out,
        elapsed: started.elapsed(),
    })
}

/// Bytes captured from one stream, shared with its reader thread.
#[derive(Debug, Default, Clone)]
struct Capture(Arc<Mutex<(Vec<u8>, usize)>>);

impl Capture {
    fn lock(&self) -> MutexGuard<'_, (Vec<u8>, usize)> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, chunk: &[u8], limit: usize) {
        let mut captured = self.lock();
        let (buf, truncated) = &mut *captured;
        let keep = chunk.len().min(limit.saturating_sub(buf.len()));
        buf.extend_from_slice(&chunk[..keep]);
        *truncated += chunk.len() - keep;
    }

    fn take(&self) -> (Vec<u8>, usize) {
        std::mem::take(&mut *self.lock())
    }
}

fn spawn_reader<R: Read + Send + 'static>(
    reader: R,
    limit: usize,
    done: Sender<std::io::Result<()>>,
) -> Capture {
    let capture = Capture::default();
    let sink = capture.clone();
    thread::spawn(move || {
        let result = read_stream_limited(reader, limit, &sink);
        let _ = done.send(result);
    });
    capture
}

/// Wait for `readers` completions, giving up once [`DRAIN_GRACE`] passes.
fn await_readers(done: &Receiver<std::io::Result<()>>, readers: usize) -> Result<()> {
    let deadline = Instant::now() + DRAIN_GRACE;
    for _ in 0..readers {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match done.recv_timeout(remaining) {
            Ok(result) => result?,
            Err(RecvTimeoutError::Timeout) => {
                debug!("Output pipes still held open after exit, not waiting");
                break;
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(DockerError::Output("output reader thread panicked".to_string()))
            }
        }
    }
    Ok(())
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize, sink: &Capture) -> std::io::Result<()> {
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            return Ok(());
        }
        sink.push(&chunk[..n], limit);
    }
}
