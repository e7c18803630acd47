use std::{error::Error as StdError, sync::Arc};

use thiserror::Error;
use tracing::{debug, info};
use tuner_core::{
    Cost, CostError, CostFunction, EvalContext, ParameterValue, Report, Settings, SettingsError,
    UnknownParameter,
};

use crate::{
    protocol::EstimateCostResponse,
    registry::{RegisterError, ReportRegistry},
};

/// Outcome of one cost estimation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub cost: Cost,
    /// Set when the cost function declared the combination infeasible.
    pub invalid_parameter_combination: bool,
}

impl From<Estimate> for EstimateCostResponse {
    fn from(estimate: Estimate) -> Self {
        Self {
            cost: estimate.cost,
            invalid_parameter_combination: estimate.invalid_parameter_combination,
        }
    }
}

/// Errors that can occur while estimating a cost.
#[derive(Debug, Error)]
pub enum EstimateError {
    #[error(transparent)]
    UnknownParameter(#[from] UnknownParameter),

    #[error("cost function call failed")]
    CostFunctionFailed(#[source] Box<dyn StdError + Send + Sync>),

    #[error(
        "cost {cost} is not below invalid_parameter_combination_cost {invalid_cost}; \
         raise invalid_parameter_combination_cost above every real cost"
    )]
    MisconfiguredInvalidCost { cost: Cost, invalid_cost: Cost },
}

/// Applies proposed parameter values to host state and evaluates their cost.
///
/// The estimator holds the only mutable run state: the attempt counter and the
/// report registry. Callers must serialize access, since mutation and
/// evaluation of one request must not interleave with another's.
pub struct CostEstimator {
    settings: Arc<Settings>,
    cost_function: Arc<dyn CostFunction>,
    attempts: u64,
    registry: ReportRegistry,
}

impl CostEstimator {
    /// Creates an estimator for validated settings.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::MissingCostFunction`] if no cost function is set.
    pub fn new(settings: Arc<Settings>) -> Result<Self, SettingsError> {
        let cost_function = settings
            .cost_function
            .clone()
            .ok_or(SettingsError::MissingCostFunction)?;

        Ok(Self {
            settings,
            cost_function,
            attempts: 0,
            registry: ReportRegistry::new(),
        })
    }

    /// Applies `values` through their mutators, then evaluates the cost.
    ///
    /// All mutators run, in the given order, before the cost function is
    /// called. An infeasible combination is a successful estimate carrying
    /// the configured sentinel cost.
    ///
    /// # Errors
    ///
    /// Returns an error if a name is unknown, the cost function fails, or a
    /// real cost reaches the infeasibility sentinel.
    pub fn estimate_cost(
        &mut self,
        values: &[ParameterValue],
        ctx: &EvalContext,
    ) -> Result<Estimate, EstimateError> {
        for pv in values {
            self.settings.parameter_by_name(&pv.name)?.apply(pv.value);
        }

        self.attempts += 1;

        let invalid_cost = self.settings.invalid_parameter_combination_cost;
        let estimate = match self.cost_function.evaluate(ctx) {
            Ok(cost) => {
                if cost.is_nan() || cost >= invalid_cost {
                    return Err(EstimateError::MisconfiguredInvalidCost { cost, invalid_cost });
                }
                Estimate {
                    cost,
                    invalid_parameter_combination: false,
                }
            }
            Err(CostError::InvalidParameterCombination) => Estimate {
                cost: invalid_cost,
                invalid_parameter_combination: true,
            },
            Err(CostError::Failed(source)) => {
                return Err(EstimateError::CostFunctionFailed(source));
            }
        };

        debug!(
            attempts = self.attempts,
            request = ?values,
            cost = estimate.cost,
            invalid_parameter_combination = estimate.invalid_parameter_combination,
            "estimate cost"
        );

        Ok(estimate)
    }

    /// Stores the optimizer's final report.
    ///
    /// # Errors
    ///
    /// Returns an error if a report is already stored or `report` is `None`.
    pub fn register_report(&mut self, report: Option<Report>) -> Result<(), RegisterError> {
        self.registry.register(report)?;
        info!(report = ?self.registry.get(), "register report");
        Ok(())
    }

    /// Number of accepted estimate calls so far.
    #[must_use]
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    #[must_use]
    pub fn report(&self) -> Option<&Report> {
        self.registry.get()
    }

    /// Moves the registered report out of the estimator.
    pub fn take_report(&mut self) -> Option<Report> {
        self.registry.take()
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}
