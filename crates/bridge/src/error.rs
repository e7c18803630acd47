use std::{error::Error as StdError, sync::Arc};

use thiserror::Error;
use tuner_core::SettingsError;

use crate::{
    endpoint::{BindError, HandlerError},
    supervisor::ProcessError,
    workspace::WorkspaceError,
};

/// Errors that end an optimization run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid settings")]
    InvalidSettings(#[from] SettingsError),

    #[error("failed to start endpoint")]
    Endpoint(#[from] BindError),

    #[error("failed to prepare workspace")]
    Workspace(#[from] WorkspaceError),

    /// The optimizer failed after one of its requests failed.
    ///
    /// The request failure is the source; the process failure is kept for context.
    #[error("optimizer failed after a request error ({process})")]
    Handler {
        #[source]
        source: Arc<HandlerError>,
        process: ProcessError,
    },

    #[error("optimizer failed")]
    Process(#[source] ProcessError),

    #[error("protocol error: optimizer exited without registering a report")]
    MissingReport,

    #[error("failed to collect the registered report")]
    Estimator(#[source] tokio::task::JoinError),
}

/// Renders an error and its sources as `outer: inner: innermost`.
pub(crate) fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
