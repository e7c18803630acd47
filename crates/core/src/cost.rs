use std::{
    error::Error as StdError,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use thiserror::Error;

/// The value returned by a cost function. Lower is better.
pub type Cost = f64;

/// Sentinel cost meaning "worse than any real evaluation".
pub const MAX_COST: Cost = f64::MAX;

/// Errors a cost function may return.
///
/// [`CostError::InvalidParameterCombination`] is not a failure of the run:
/// it tells the optimizer that the proposed combination is infeasible so it
/// can steer away from that region. Any other problem is reported through
/// [`CostError::Failed`] and ends the run.
#[derive(Debug, Error)]
pub enum CostError {
    #[error("invalid parameter combination")]
    InvalidParameterCombination,

    #[error("cost function failed")]
    Failed(#[source] Box<dyn StdError + Send + Sync>),
}

impl CostError {
    /// Wraps any error as a hard cost function failure.
    pub fn failed(err: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Failed(err.into())
    }
}

/// A host-supplied cost function.
///
/// The cost function reads host state that parameter mutators have already
/// updated, so it takes no parameter values of its own. Evaluations are
/// expected to be expensive; long-running implementations should poll
/// [`EvalContext::is_cancelled`] and give up early.
///
/// Closures of the form `Fn(&EvalContext) -> Result<Cost, CostError>`
/// implement this trait automatically.
pub trait CostFunction: Send + Sync {
    /// Evaluates the cost of the current host state.
    ///
    /// # Errors
    ///
    /// Returns [`CostError::InvalidParameterCombination`] for infeasible
    /// combinations and [`CostError::Failed`] for anything else.
    fn evaluate(&self, ctx: &EvalContext) -> Result<Cost, CostError>;
}

impl<F> CostFunction for F
where
    F: Fn(&EvalContext) -> Result<Cost, CostError> + Send + Sync,
{
    fn evaluate(&self, ctx: &EvalContext) -> Result<Cost, CostError> {
        self(ctx)
    }
}

/// Cancellation context handed to every cost function call.
///
/// Clones share the same cancellation flag, so the party that created the
/// context can cancel an evaluation running elsewhere.
#[derive(Clone, Default)]
pub struct EvalContext {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl EvalContext {
    /// Creates a context with no deadline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context that expires at `deadline`.
    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancelled: Arc::default(),
        }
    }

    /// Creates a context that expires `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Returns a clone that shares the cancellation flag and expires
    /// `timeout` from now.
    #[must_use]
    pub fn with_timeout_from_now(&self, timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    /// Cancels the context and all of its clones.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns `true` once the context was cancelled or its deadline passed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the time left before the deadline, if any.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

impl fmt::Debug for EvalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvalContext")
            .field("deadline", &self.deadline)
            .field("cancelled", &self.cancelled.load(Ordering::Acquire))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_cost_functions() {
        let cost_fn = |_: &EvalContext| -> Result<Cost, CostError> { Ok(42.0) };
        let result = cost_fn.evaluate(&EvalContext::new()).expect("should evaluate");
        assert!((result - 42.0).abs() < f64::EPSILON);
    }

    #[test]
    fn cancel_is_shared_between_clones() {
        let ctx = EvalContext::new();
        let observed = ctx.clone();
        assert!(!observed.is_cancelled());

        ctx.cancel();
        assert!(observed.is_cancelled());
    }

    #[test]
    fn expired_deadline_cancels() {
        let ctx = EvalContext::with_deadline(Instant::now());
        assert!(ctx.is_cancelled());
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn no_deadline_never_expires() {
        let ctx = EvalContext::new();
        assert!(ctx.deadline().is_none());
        assert!(ctx.remaining().is_none());
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn timed_clone_shares_cancellation() {
        let ctx = EvalContext::new();
        let timed = ctx.with_timeout_from_now(Duration::from_secs(60));

        assert!(timed.deadline().is_some());
        assert!(ctx.deadline().is_none());
        assert!(!timed.is_cancelled());

        ctx.cancel();
        assert!(timed.is_cancelled());
    }

    #[test]
    fn failed_wraps_source() {
        let err = CostError::failed("simulation diverged");
        let source = std::error::Error::source(&err).expect("should have a source");
        assert_eq!(source.to_string(), "simulation diverged");
    }
}
