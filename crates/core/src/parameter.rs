use std::{fmt, sync::Arc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Inclusive range an integer parameter may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bound {
    pub from: i64,
    pub to: i64,
}

impl Bound {
    /// Creates an inclusive bound.
    #[must_use]
    pub const fn new(from: i64, to: i64) -> Self {
        Self { from, to }
    }

    /// Returns `true` if `value` lies within the bound.
    #[must_use]
    pub fn contains(&self, value: i64) -> bool {
        (self.from..=self.to).contains(&value)
    }
}

/// Applies a value proposed by the optimizer to host state.
///
/// Closures of the form `Fn(i64)` implement this trait automatically.
/// Mutators run on worker threads, so host state they touch is usually held
/// behind a lock or an atomic.
pub trait Mutator: Send + Sync {
    fn apply(&self, value: i64);
}

impl<F> Mutator for F
where
    F: Fn(i64) + Send + Sync,
{
    fn apply(&self, value: i64) {
        self(value);
    }
}

/// One tunable integer parameter of the host configuration.
#[derive(Clone)]
pub struct ParameterDescription {
    /// Identifier made of ASCII letters, digits, and underscores.
    pub name: String,
    pub bound: Bound,
    pub mutator: Option<Arc<dyn Mutator>>,
}

/// Errors from [`ParameterDescription::validate`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParameterError {
    #[error("name '{name}' must be non-empty and contain only [A-Za-z0-9_]")]
    InvalidName { name: String },

    #[error("mutator is missing")]
    MissingMutator,
}

/// Returned when a parameter name is not part of the settings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("parameter '{name}' does not exist")]
pub struct UnknownParameter {
    pub name: String,
}

impl ParameterDescription {
    /// Creates a parameter that applies values through the `mutator` closure.
    pub fn new<F>(name: impl Into<String>, bound: Bound, mutator: F) -> Self
    where
        F: Fn(i64) + Send + Sync + 'static,
    {
        Self::with_mutator(name, bound, mutator)
    }

    /// Creates a parameter around any [`Mutator`].
    pub fn with_mutator(
        name: impl Into<String>,
        bound: Bound,
        mutator: impl Mutator + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            bound,
            mutator: Some(Arc::new(mutator)),
        }
    }

    /// Checks the name and the presence of a mutator.
    ///
    /// The bound is trusted as given.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not an identifier or the mutator is missing.
    pub fn validate(&self) -> Result<(), ParameterError> {
        if !is_identifier(&self.name) {
            return Err(ParameterError::InvalidName {
                name: self.name.clone(),
            });
        }

        if self.mutator.is_none() {
            return Err(ParameterError::MissingMutator);
        }

        Ok(())
    }

    /// Hands `value` to the mutator. A missing mutator is a no-op.
    pub fn apply(&self, value: i64) {
        if let Some(mutator) = &self.mutator {
            mutator.apply(value);
        }
    }
}

impl fmt::Debug for ParameterDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterDescription")
            .field("name", &self.name)
            .field("bound", &self.bound)
            .field("mutator", &self.mutator.as_ref().map(|_| "<mutator>"))
            .finish()
    }
}

/// A value the optimizer proposes for one named parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParameterValue {
    pub name: String,
    pub value: i64,
}

impl ParameterValue {
    pub fn new(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicI64, Ordering};

    #[test]
    fn accepts_identifier_names() {
        for name in ["x", "max_threads", "Pool2", "_", "42"] {
            let param = ParameterDescription::new(name, Bound::new(0, 1), |_| {});
            assert_eq!(param.validate(), Ok(()), "name {name:?}");
        }
    }

    #[test]
    fn rejects_non_identifier_names() {
        for name in ["", "with space", "dash-ed", "dot.ted", "ünïcode"] {
            let param = ParameterDescription::new(name, Bound::new(0, 1), |_| {});
            assert_eq!(
                param.validate(),
                Err(ParameterError::InvalidName {
                    name: name.to_owned()
                }),
            );
        }
    }

    #[test]
    fn rejects_missing_mutator() {
        let param = ParameterDescription {
            name: "x".into(),
            bound: Bound::new(0, 10),
            mutator: None,
        };
        assert_eq!(param.validate(), Err(ParameterError::MissingMutator));
    }

    #[test]
    fn apply_forwards_to_mutator() {
        let seen = Arc::new(AtomicI64::new(0));
        let param = {
            let seen = Arc::clone(&seen);
            ParameterDescription::new("x", Bound::new(0, 10), move |v| {
                seen.store(v, Ordering::SeqCst);
            })
        };

        param.apply(7);
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    struct PoolSize(Arc<AtomicI64>);

    impl Mutator for PoolSize {
        fn apply(&self, value: i64) {
            self.0.store(value * 2, Ordering::SeqCst);
        }
    }

    #[test]
    fn accepts_mutator_types() {
        let size = Arc::new(AtomicI64::new(0));
        let mutator = PoolSize(Arc::clone(&size));
        let param = ParameterDescription::with_mutator("pool", Bound::new(1, 8), mutator);

        assert_eq!(param.validate(), Ok(()));
        param.apply(3);
        assert_eq!(size.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn bound_is_inclusive() {
        let bound = Bound::new(-2, 3);
        assert!(bound.contains(-2));
        assert!(bound.contains(3));
        assert!(!bound.contains(4));
    }
}
