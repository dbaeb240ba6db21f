//! Classification of run errors into metric outcomes
//!
//! A failed run is reported as one of four kinds. Only [`FailureKind::Failure`]
//! and [`FailureKind::Timeout`] count against the circuit; bad requests and
//! interrupts are reported but never trip it.

use breaker_machines::{FailureClassifier, FailureContext};
use std::sync::{Arc, Mutex, MutexGuard};

/// Outcome of a failed run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The dependency failed
    Failure,
    /// The dependency did not answer in time
    Timeout,
    /// The caller sent something the dependency rejected
    BadRequest,
    /// The caller gave up on the call
    Interrupt,
}

impl FailureKind {
    /// Whether this outcome counts toward opening the circuit
    pub fn trips(self) -> bool {
        matches!(self, FailureKind::Failure | FailureKind::Timeout)
    }
}

/// Maps a run error to a [`FailureKind`]
///
/// The error is handed over as `&dyn Any` inside the context; downcast it to the
/// concrete error type of the circuit.
///
/// # Examples
///
/// ```rust
/// use breaker_machines_metrics::{ErrorClassifier, FailureKind, PredicateClassifier};
///
/// #[derive(Debug)]
/// enum ApiError {
///     Timeout,
///     NotFound,
/// }
///
/// let classifier = PredicateClassifier::new(|ctx| match ctx.error.downcast_ref::<ApiError>() {
///     Some(ApiError::Timeout) => FailureKind::Timeout,
///     Some(ApiError::NotFound) => FailureKind::BadRequest,
///     None => FailureKind::Failure,
/// });
/// # let _ = classifier;
/// ```
pub trait ErrorClassifier: Send + Sync + std::fmt::Debug {
    fn classify(&self, ctx: &FailureContext<'_>) -> FailureKind;
}

/// Treats every error as a [`FailureKind::Failure`]
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl ErrorClassifier for DefaultClassifier {
    fn classify(&self, _ctx: &FailureContext<'_>) -> FailureKind {
        FailureKind::Failure
    }
}

/// Classifier backed by a closure
pub struct PredicateClassifier<F>
where
    F: Fn(&FailureContext<'_>) -> FailureKind + Send + Sync,
{
    predicate: F,
}

impl<F> PredicateClassifier<F>
where
    F: Fn(&FailureContext<'_>) -> FailureKind + Send + Sync,
{
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<F> ErrorClassifier for PredicateClassifier<F>
where
    F: Fn(&FailureContext<'_>) -> FailureKind + Send + Sync,
{
    fn classify(&self, ctx: &FailureContext<'_>) -> FailureKind {
        (self.predicate)(ctx)
    }
}

impl<F> std::fmt::Debug for PredicateClassifier<F>
where
    F: Fn(&FailureContext<'_>) -> FailureKind + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredicateClassifier")
            .field("predicate", &"<closure>")
            .finish()
    }
}

/// Installs an [`ErrorClassifier`] into the breaker so that only tripping
/// outcomes are recorded as breaker failures
///
/// The kind computed by the breaker is kept until [`TripClassifier::take_last`]
/// so each run error is classified exactly once.
#[derive(Debug)]
pub(crate) struct TripClassifier {
    inner: Arc<dyn ErrorClassifier>,
    last: Mutex<Option<FailureKind>>,
}

impl TripClassifier {
    pub(crate) fn new(inner: Arc<dyn ErrorClassifier>) -> Self {
        Self {
            inner,
            last: Mutex::new(None),
        }
    }

    pub(crate) fn classify(&self, ctx: &FailureContext<'_>) -> FailureKind {
        self.inner.classify(ctx)
    }

    /// Kind computed by the last `should_trip`, cleared on read
    pub(crate) fn take_last(&self) -> Option<FailureKind> {
        self.slot().take()
    }

    fn slot(&self) -> MutexGuard<'_, Option<FailureKind>> {
        self.last
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl FailureClassifier for TripClassifier {
    fn should_trip(&self, ctx: &FailureContext<'_>) -> bool {
        let kind = self.inner.classify(ctx);
        *self.slot() = Some(kind);
        kind.trips()
    }
}
