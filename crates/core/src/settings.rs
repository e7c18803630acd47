mod error;
mod init_strategy;

pub use error::SettingsError;
pub use init_strategy::InitStrategy;

use std::{
    collections::HashSet,
    fmt,
    net::{Ipv4Addr, SocketAddr},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use crate::{
    Cost, CostError, CostFunction, EvalContext, MAX_COST, ParameterDescription, UnknownParameter,
};

/// Default executable name of the external optimizer.
pub const DEFAULT_EXECUTABLE: &str = "rbfopt-go-wrapper";

/// Everything needed to run one optimization.
///
/// Construct with [`Settings::new`] and override fields with struct update
/// syntax:
///
/// ```
/// use tuner_core::{Bound, EvalContext, ParameterDescription, Settings};
///
/// let settings = Settings {
///     max_evaluations: 25,
///     ..Settings::new(
///         vec![ParameterDescription::new("x", Bound::new(0, 10), |_| {})],
///         |_: &EvalContext| Ok(0.0),
///     )
/// };
/// assert!(settings.validate().is_ok());
/// ```
#[derive(Clone)]
pub struct Settings {
    /// Parameters to tune, in the order the optimizer sees them.
    pub parameters: Vec<ParameterDescription>,
    pub cost_function: Option<Arc<dyn CostFunction>>,
    /// Upper limit on cost function evaluations.
    pub max_evaluations: u32,
    /// Upper limit on optimizer iterations.
    pub max_iterations: u32,
    /// Cost reported to the optimizer for infeasible combinations.
    ///
    /// Must exceed every real cost and stay well below [`MAX_COST`], since
    /// surrogate-model optimizers degrade when fed extreme values.
    pub invalid_parameter_combination_cost: Cost,
    /// Hides infeasible combinations from optimizer-side plots.
    pub skip_invalid_parameter_combination_on_plots: bool,
    pub init_strategy: InitStrategy,
    /// Workspace for the optimizer's config and artifacts.
    ///
    /// A timestamped directory under the system temp dir is used when unset.
    pub root_dir: Option<PathBuf>,
    /// External optimizer executable, resolved through `PATH` if relative.
    pub executable: PathBuf,
    /// Address the local endpoint binds to. Port `0` picks a free port.
    pub endpoint: SocketAddr,
    /// Deadline applied to each cost function call through [`EvalContext`].
    pub evaluation_timeout: Option<Duration>,
    /// Deadline for the whole optimizer process; it is killed on expiry.
    pub process_timeout: Option<Duration>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            parameters: Vec::new(),
            cost_function: None,
            max_evaluations: 100,
            max_iterations: 1000,
            invalid_parameter_combination_cost: 1e10,
            skip_invalid_parameter_combination_on_plots: false,
            init_strategy: InitStrategy::default(),
            root_dir: None,
            executable: PathBuf::from(DEFAULT_EXECUTABLE),
            endpoint: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
            evaluation_timeout: None,
            process_timeout: None,
        }
    }
}

impl Settings {
    /// Creates settings with default limits for the given parameters and cost function.
    ///
    /// Takes a closure; use [`Settings::with_cost_function`] for a type that
    /// implements [`CostFunction`] itself.
    pub fn new<F>(parameters: Vec<ParameterDescription>, cost_function: F) -> Self
    where
        F: Fn(&EvalContext) -> Result<Cost, CostError> + Send + Sync + 'static,
    {
        Self::with_cost_function(parameters, cost_function)
    }

    /// Creates settings with default limits around any [`CostFunction`].
    pub fn with_cost_function(
        parameters: Vec<ParameterDescription>,
        cost_function: impl CostFunction + 'static,
    ) -> Self {
        Self {
            parameters,
            cost_function: Some(Arc::new(cost_function)),
            ..Self::default()
        }
    }

    /// Checks that the settings describe a runnable optimization.
    ///
    /// # Errors
    ///
    /// Returns the first problem found, in field order.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.parameters.is_empty() {
            return Err(SettingsError::NoParameters);
        }

        if self.cost_function.is_none() {
            return Err(SettingsError::MissingCostFunction);
        }

        let mut seen = HashSet::with_capacity(self.parameters.len());
        for param in &self.parameters {
            param
                .validate()
                .map_err(|source| SettingsError::Parameter {
                    name: param.name.clone(),
                    source,
                })?;

            if !seen.insert(param.name.as_str()) {
                return Err(SettingsError::DuplicateParameter {
                    name: param.name.clone(),
                });
            }
        }

        if self.max_evaluations == 0 {
            return Err(SettingsError::ZeroMaxEvaluations);
        }

        if self.max_iterations == 0 {
            return Err(SettingsError::ZeroMaxIterations);
        }

        let cost = self.invalid_parameter_combination_cost;
        if !cost.is_finite() || cost >= MAX_COST {
            return Err(SettingsError::InvalidCombinationCostTooHigh { cost });
        }

        Ok(())
    }

    /// Finds a parameter by name with a linear scan.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownParameter`] if no parameter has that name.
    pub fn parameter_by_name(&self, name: &str) -> Result<&ParameterDescription, UnknownParameter> {
        self.parameters
            .iter()
            .find(|param| param.name == name)
            .ok_or_else(|| UnknownParameter {
                name: name.to_owned(),
            })
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("parameters", &self.parameters)
            .field(
                "cost_function",
                &self.cost_function.as_ref().map(|_| "<cost function>"),
            )
            .field("max_evaluations", &self.max_evaluations)
            .field("max_iterations", &self.max_iterations)
            .field(
                "invalid_parameter_combination_cost",
                &self.invalid_parameter_combination_cost,
            )
            .field(
                "skip_invalid_parameter_combination_on_plots",
                &self.skip_invalid_parameter_combination_on_plots,
            )
            .field("init_strategy", &self.init_strategy)
            .field("root_dir", &self.root_dir)
            .field("executable", &self.executable)
            .field("endpoint", &self.endpoint)
            .field("evaluation_timeout", &self.evaluation_timeout)
            .field("process_timeout", &self.process_timeout)
            .finish()
    }
}
