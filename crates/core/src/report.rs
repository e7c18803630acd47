#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Cost, ParameterValue};

/// Final result of one optimization run, as registered by the optimizer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Report {
    /// Best cost found.
    pub cost: Cost,
    /// Parameter values at the best cost.
    pub optimum: Vec<ParameterValue>,
    pub iterations: u64,
    pub evaluations: u64,
    /// Evaluations performed with the optimizer's cheap approximation mode.
    pub fast_evaluations: u64,
}

impl Report {
    /// Returns the optimal value of the named parameter.
    #[must_use]
    pub fn optimum_value(&self, name: &str) -> Option<i64> {
        self.optimum
            .iter()
            .find(|pv| pv.name == name)
            .map(|pv| pv.value)
    }
}
