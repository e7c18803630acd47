//! Bridge between an in-process cost function and an out-of-process optimizer.
//!
//! [`optimize`] runs one optimization end to end:
//!
//! - a local HTTP [`Endpoint`] answers the optimizer's cost estimation and
//!   report registration requests through a [`CostEstimator`]
//! - the optimizer config is written to a workspace directory
//! - the external optimizer is launched with that directory and supervised
//!   until it exits
//!
//! The wire format lives in [`protocol`], shared with optimizer-side clients.

mod endpoint;
mod error;
mod estimator;
mod orchestrator;
pub mod protocol;
mod registry;
pub mod supervisor;
pub mod workspace;

pub use endpoint::{BindError, Endpoint, HandlerError};
pub use error::Error;
pub use estimator::{CostEstimator, Estimate, EstimateError};
pub use orchestrator::optimize;
pub use registry::{RegisterError, ReportRegistry};
pub use supervisor::ProcessError;
pub use workspace::WorkspaceError;
