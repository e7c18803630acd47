//! Launches the external optimizer and waits for it to finish.
//!
//! The optimizer is invoked as `<executable> <workspace>` after its config is
//! written to the workspace. Its stdout and stderr are drained concurrently
//! and forwarded to the log line by line, so a chatty optimizer never blocks
//! on a full pipe. Both streams are drained to EOF before the exit status is
//! collected.

use std::{
    collections::VecDeque,
    io,
    net::SocketAddr,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
    time::Duration,
};

use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::{Child, Command},
};
use tracing::{debug, info, warn};
use tuner_core::Settings;

use crate::protocol::OptimizerConfig;

/// Number of trailing stderr lines kept for error reports.
pub const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to encode optimizer config")]
    EncodeConfig(#[source] serde_json::Error),

    #[error("failed to write optimizer config to {}", path.display())]
    WriteConfig {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to launch {}", executable.display())]
    Launch {
        executable: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read optimizer output")]
    Output(#[source] io::Error),

    #[error("failed to wait for optimizer")]
    Wait(#[source] io::Error),

    #[error("optimizer exited with {status}")]
    Exit {
        status: ExitStatus,
        /// Last lines the optimizer wrote to stderr, oldest first.
        stderr_tail: Vec<String>,
    },

    #[error("optimizer did not finish within {limit:?}")]
    TimedOut { limit: Duration },
}

/// Writes the optimizer config and runs the optimizer to completion.
///
/// With `settings.process_timeout` set, an optimizer still running at the
/// deadline is killed.
///
/// # Errors
///
/// Returns an error if the config cannot be written, the optimizer cannot be
/// launched, exits unsuccessfully, or times out.
pub async fn run(
    settings: &Settings,
    workspace: &Path,
    endpoint: SocketAddr,
) -> Result<(), ProcessError> {
    write_config(settings, workspace, endpoint).await?;

    let mut child = Command::new(&settings.executable)
        .arg(workspace)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ProcessError::Launch {
            executable: settings.executable.clone(),
            source,
        })?;

    info!(
        executable = %settings.executable.display(),
        pid = ?child.id(),
        "optimizer started"
    );

    let Some(limit) = settings.process_timeout else {
        return supervise(&mut child).await;
    };

    let outcome = tokio::time::timeout(limit, supervise(&mut child)).await;
    match outcome {
        Ok(result) => result,
        Err(_) => {
            warn!(?limit, "optimizer timed out, killing it");
            if let Err(err) = child.kill().await {
                warn!(error = %err, "failed to kill optimizer");
            }
            Err(ProcessError::TimedOut { limit })
        }
    }
}

async fn write_config(
    settings: &Settings,
    workspace: &Path,
    endpoint: SocketAddr,
) -> Result<(), ProcessError> {
    let config = OptimizerConfig::new(settings, endpoint);
    let data = serde_json::to_vec_pretty(&config).map_err(ProcessError::EncodeConfig)?;

    let path = OptimizerConfig::path(workspace);
    tokio::fs::write(&path, data)
        .await
        .map_err(|source| ProcessError::WriteConfig {
            path: path.clone(),
            source,
        })?;

    debug!(path = %path.display(), endpoint = %config.endpoint, "optimizer config written");
    Ok(())
}

async fn supervise(child: &mut Child) -> Result<(), ProcessError> {
    let (stdout, stderr) = tokio::join!(
        drain(child.stdout.take(), "stdout"),
        drain(child.stderr.take(), "stderr"),
    );
    stdout.map_err(ProcessError::Output)?;
    let stderr_tail = stderr.map_err(ProcessError::Output)?;

    let status = child.wait().await.map_err(ProcessError::Wait)?;
    if status.success() {
        info!(%status, "optimizer finished");
        return Ok(());
    }

    warn!(%status, stderr = ?stderr_tail, "optimizer failed");
    Err(ProcessError::Exit {
        status,
        stderr_tail: stderr_tail.into(),
    })
}

/// Logs every line of `stream` and returns the last few.
async fn drain<R>(stream: Option<R>, name: &'static str) -> io::Result<VecDeque<String>>
where
    R: AsyncRead + Unpin,
{
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let Some(stream) = stream else {
        return Ok(tail);
    };

    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);
        debug!(stream = name, "{line}");

        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line.to_owned());
    }

    Ok(tail)
}
