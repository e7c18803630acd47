use std::{
    io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
#[error("failed to create workspace {}", path.display())]
pub struct WorkspaceError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Ensures the workspace directory exists and returns its path.
///
/// Without a `root_dir`, a directory named `tuner_<timestamp>` is created
/// under the system temp dir. Existing directories are reused as they are.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub async fn prepare(root_dir: Option<&Path>) -> Result<PathBuf, WorkspaceError> {
    let path = match root_dir {
        Some(dir) => dir.to_path_buf(),
        None => default_dir(),
    };

    tokio::fs::create_dir_all(&path)
        .await
        .map_err(|source| WorkspaceError {
            path: path.clone(),
            source,
        })?;

    debug!(path = %path.display(), "workspace ready");
    Ok(path)
}

fn default_dir() -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    std::env::temp_dir().join(format!("tuner_{stamp}"))
}
