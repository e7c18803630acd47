#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How the external optimizer selects its initial sample points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum InitStrategy {
    /// Latin hypercube design maximizing the minimum distance between points.
    #[default]
    LhdMaximin,
    /// Latin hypercube design minimizing correlation between dimensions.
    LhdCorr,
    /// Every corner of the bounding box.
    AllCorners,
    /// The lower corner and its neighbours.
    LowerCorners,
    /// A random subset of corners.
    RandCorners,
}
