use std::net::SocketAddr;

use thiserror::Error;
use tokio::task::JoinError;
use warp::http::StatusCode;

use crate::{estimator::EstimateError, registry::RegisterError};

/// The endpoint could not start listening.
#[derive(Debug, Error)]
#[error("failed to bind endpoint to {address}")]
pub struct BindError {
    pub address: SocketAddr,
    #[source]
    pub source: warp::Error,
}

/// A request the endpoint failed to handle.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("method {method} is not allowed on /{path}")]
    MethodNotAllowed { path: &'static str, method: String },

    #[error("malformed request body on /{path}")]
    Decode {
        path: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("estimate cost")]
    Estimate(#[from] EstimateError),

    #[error("register report")]
    Register(#[from] RegisterError),

    #[error("request handler task failed")]
    Task(#[source] JoinError),
}

impl HandlerError {
    /// HTTP status the failure is answered with.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::Decode { .. } => StatusCode::BAD_REQUEST,
            Self::Estimate(_) | Self::Register(_) | Self::Task(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
