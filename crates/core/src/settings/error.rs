use thiserror::Error;

use crate::{Cost, ParameterError};

/// Reasons a [`Settings`](super::Settings) value is rejected.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SettingsError {
    #[error("no parameters to optimize")]
    NoParameters,

    #[error("cost function is missing")]
    MissingCostFunction,

    #[error("invalid parameter '{name}'")]
    Parameter {
        name: String,
        #[source]
        source: ParameterError,
    },

    #[error("parameter '{name}' is declared more than once")]
    DuplicateParameter { name: String },

    #[error("max_evaluations must be greater than zero")]
    ZeroMaxEvaluations,

    #[error("max_iterations must be greater than zero")]
    ZeroMaxIterations,

    #[error(
        "invalid_parameter_combination_cost {cost} must be finite and below f64::MAX; \
         pick a value above any real cost but well below the representable maximum"
    )]
    InvalidCombinationCostTooHigh { cost: Cost },
}
