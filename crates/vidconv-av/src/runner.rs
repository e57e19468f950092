//! Cancellable ffmpeg process execution.

use crate::progress::{parse_progress_line, ProgressLine};
use crate::{Error, Result};
use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

/// Default number of stderr lines kept for error messages.
pub const DEFAULT_STDERR_TAIL: usize = 20;

enum Step {
    Line(std::io::Result<Option<String>>),
    Cancelled,
}

/// Run `program` with `args` until it exits or `cancel` fires.
///
/// Encoded media time read from `-progress pipe:1` output on stdout is passed
/// to `on_time` in seconds. The last `stderr_tail` lines of stderr are kept
/// and attached to the error when the process exits non-zero.
///
/// On cancellation the process is killed and reaped before
/// [`Error::Cancelled`] is returned.
pub async fn run_ffmpeg<F>(
    program: &Path,
    args: &[String],
    cancel: &CancellationToken,
    stderr_tail: usize,
    mut on_time: F,
) -> Result<()>
where
    F: FnMut(f64) + Send,
{
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let tool = program
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| program.to_string_lossy().to_string());

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::tool_not_found(program.display().to_string())
            } else {
                Error::encoding(&tool, format!("failed to spawn: {}", e))
            }
        })?;

    #[cfg(feature = "tracing")]
    tracing::debug!("Spawned {} {}", tool, args.join(" "));

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::encoding(&tool, "stdout was not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::encoding(&tool, "stderr was not captured"))?;

    let keep = stderr_tail.max(1);
    let tail_task = tokio::spawn(async move {
        let mut tail = VecDeque::with_capacity(keep);
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tail.len() == keep {
                tail.pop_front();
            }
            tail.push_back(line);
        }
        tail
    });

    let mut lines = BufReader::new(stdout).lines();
    loop {
        let step = tokio::select! {
            biased;
            _ = cancel.cancelled() => Step::Cancelled,
            line = lines.next_line() => Step::Line(line),
        };

        match step {
            Step::Cancelled => {
                kill(&mut child).await;
                tail_task.abort();
                return Err(Error::Cancelled);
            }
            Step::Line(Ok(Some(line))) => {
                if let Some(ProgressLine::OutTime(secs)) = parse_progress_line(&line) {
                    on_time(secs);
                }
            }
            Step::Line(Ok(None)) => break,
            Step::Line(Err(e)) => {
                kill(&mut child).await;
                tail_task.abort();
                return Err(Error::encoding(&tool, format!("failed to read progress: {}", e)));
            }
        }
    }

    let status = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        status = child.wait() => Some(status),
    };

    let status = match status {
        Some(status) => status?,
        None => {
            kill(&mut child).await;
            tail_task.abort();
            return Err(Error::Cancelled);
        }
    };

    let tail = tail_task.await.unwrap_or_default();

    if !status.success() {
        let detail = tail.into_iter().collect::<Vec<_>>().join("\n");
        let message = if detail.trim().is_empty() {
            format!("exited with {}", status)
        } else {
            format!("exited with {}: {}", status, detail.trim())
        };
        return Err(Error::encoding(tool, message));
    }

    Ok(())
}

async fn kill(child: &mut Child) {
    if let Err(_e) = child.start_kill() {
        #[cfg(feature = "tracing")]
        tracing::debug!("Failed to signal encoder process: {}", _e);
    }
    let _ = child.wait().await;
}
