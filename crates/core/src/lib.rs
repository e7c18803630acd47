//! Core types for tuning integer parameters with an external optimizer.
//!
//! This crate is synchronous and does no I/O. It defines:
//!
//! - [`ParameterDescription`]: a tunable parameter, its [`Bound`], and the
//!   [`Mutator`] that applies proposed values to host state
//! - [`CostFunction`]: the host-supplied evaluator and its [`CostError`]
//! - [`EvalContext`]: cancellation and deadline for one evaluation
//! - [`Settings`]: a complete, validatable optimization setup
//! - [`Report`]: the optimizer's final result
//!
//! The process and protocol machinery lives in `tuner-bridge`.

mod cost;
mod parameter;
mod report;
mod settings;

pub use cost::{Cost, CostError, CostFunction, EvalContext, MAX_COST};
pub use parameter::{
    Bound, Mutator, ParameterDescription, ParameterError, ParameterValue, UnknownParameter,
};
pub use report::Report;
pub use settings::{DEFAULT_EXECUTABLE, InitStrategy, Settings, SettingsError};
