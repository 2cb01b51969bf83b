// src/exec.rs

//! External process execution
//!
//! Every build-tool invocation goes through these helpers: captured runs for
//! probes, streamed runs for builds. Children inherit a cancellation token;
//! on cancellation the child is killed and the call returns
//! [`Error::Cancelled`]. Each invocation is traced at debug level.

use crate::error::{Error, Result};
use std::path::Path;
use std::process::{ExitStatus, Output, Stdio};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Which stream a line of build output came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// Called once per line of child output, in emission order per stream.
///
/// Lines from the two streams may interleave; the handler must be safe to
/// call concurrently from both producers.
pub type OutputHandler = Arc<dyn Fn(OutputStream, &str) + Send + Sync>;

/// An output handler that forwards lines to the process stdout/stderr
pub fn passthrough_handler() -> OutputHandler {
    Arc::new(|stream, line| match stream {
        OutputStream::Stdout => println!("{}", line),
        OutputStream::Stderr => eprintln!("{}", line),
    })
}

/// An output handler that drops every line
pub fn silent_handler() -> OutputHandler {
    Arc::new(|_, _| {})
}

fn build_command(
    program: &str,
    args: &[&str],
    dir: Option<&Path>,
    envs: &[(String, String)],
) -> Command {
    tracing::debug!(program, ?args, dir = ?dir, "executing command");

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true);
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }
    for (key, value) in envs {
        cmd.env(key, value);
    }
    cmd
}

/// Run a command to completion, capturing stdout and stderr
pub async fn run_capture(
    cancel: &CancellationToken,
    program: &str,
    args: &[&str],
    dir: Option<&Path>,
    envs: &[(String, String)],
) -> Result<Output> {
    let mut cmd = build_command(program, args, dir, envs);
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    tokio::select! {
        _ = cancel.cancelled() => Err(Error::Cancelled),
        output = cmd.output() => Ok(output?),
    }
}

/// Run a command, streaming each output line to `handler`.
///
/// Returns the exit status and the accumulated stderr text (for error
/// reporting by callers). Per-stream ordering is preserved; ordering between
/// the streams is not.
pub async fn run_streaming(
    cancel: &CancellationToken,
    program: &str,
    args: &[&str],
    dir: Option<&Path>,
    envs: &[(String, String)],
    handler: Option<OutputHandler>,
) -> Result<(ExitStatus, String)> {
    let mut cmd = build_command(program, args, dir, envs);
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    let mut child = cmd.spawn()?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::Internal("failed to open child stdout pipe".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::Internal("failed to open child stderr pipe".to_string()))?;

    let stdout_task = tokio::spawn(stream_lines(
        stdout,
        OutputStream::Stdout,
        handler.clone(),
        false,
    ));
    let stderr_task = tokio::spawn(stream_lines(stderr, OutputStream::Stderr, handler, true));

    let status = tokio::select! {
        _ = cancel.cancelled() => {
            let _ = child.kill().await;
            return Err(Error::Cancelled);
        }
        status = child.wait() => status?,
    };

    let _ = stdout_task.await;
    let stderr_text = stderr_task.await.unwrap_or_default();

    Ok((status, stderr_text))
}

/// Read lines from a child stream, forwarding each to the handler.
///
/// Returns the accumulated text when `accumulate` is set.
async fn stream_lines<R: AsyncRead + Unpin>(
    reader: R,
    stream: OutputStream,
    handler: Option<OutputHandler>,
    accumulate: bool,
) -> String {
    let mut lines = BufReader::new(reader).lines();
    let mut collected = String::new();

    while let Ok(Some(line)) = lines.next_line().await {
        if let Some(handler) = &handler {
            handler(stream, &line);
        }
        if accumulate {
            collected.push_str(&line);
            collected.push('\n');
        }
    }

    collected
}
