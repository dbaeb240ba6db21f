//! Circuit breaker wrapper that reports every call to its collectors
//!
//! `breaker-machines` only exposes open/close/half-open callbacks. Per-call
//! outcomes are derived here from the result of [`CircuitBreaker::call`]:
//! - `Ok` is a run success
//! - `Execution` errors go through the [`ErrorClassifier`](crate::ErrorClassifier)
//! - `Open` and `HalfOpenLimitReached` are short circuits
//! - a run without an execution permit is a concurrency rejection

use crate::classifier::{DefaultClassifier, FailureKind, TripClassifier};
use crate::collectors::{MetricsCollectors, TransitionFanout};
use crate::config::Config;
use crate::errors::Error;
use breaker_machines::{BulkheadSemaphore, CircuitBreaker, CircuitError, FailureContext};
use quanta::Clock;
use std::any::Any;
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

/// What happened on the run path of a single call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunOutcome {
    Success,
    Failed(FailureKind),
    ShortCircuit,
    Rejected,
}

impl RunOutcome {
    fn uses_fallback(self) -> bool {
        match self {
            RunOutcome::Success => false,
            RunOutcome::Failed(kind) => kind.trips(),
            RunOutcome::ShortCircuit | RunOutcome::Rejected => true,
        }
    }
}

/// A circuit breaker whose calls and transitions are reported to metrics collectors
pub struct MeteredCircuit {
    name: String,
    breaker: CircuitBreaker,
    collectors: MetricsCollectors,
    transitions: TransitionFanout,
    classifier: Arc<TripClassifier>,
    execution_limit: Option<Arc<BulkheadSemaphore>>,
    fallback_limit: Option<Arc<BulkheadSemaphore>>,
    clock: Clock,
}

impl MeteredCircuit {
    /// Build a circuit from a (merged) configuration
    pub fn new(name: impl Into<String>, config: Config) -> Result<Self, Error> {
        Self::with_clock(name, config, Clock::new())
    }

    /// Same as [`MeteredCircuit::new`], timing calls with `clock`
    pub fn with_clock(name: impl Into<String>, config: Config, clock: Clock) -> Result<Self, Error> {
        let name = name.into();
        config.validate(&name)?;

        let transitions = TransitionFanout::new(config.metrics.circuit.clone());

        let on_open = {
            let transitions = transitions.clone();
            let clock = clock.clone();
            move |circuit: &str| {
                tracing::debug!(circuit, "circuit opened");
                transitions.opened(clock.now());
            }
        };
        let on_close = {
            let transitions = transitions.clone();
            let clock = clock.clone();
            move |circuit: &str| {
                tracing::debug!(circuit, "circuit closed");
                transitions.closed(clock.now());
            }
        };
        let on_half_open = |circuit: &str| tracing::debug!(circuit, "circuit half-open");

        let classifier = Arc::new(TripClassifier::new(
            config
                .classifier
                .clone()
                .unwrap_or_else(|| Arc::new(DefaultClassifier)),
        ));

        let breaker = config
            .breaker_builder(&name)
            .failure_classifier(classifier.clone())
            .on_open(on_open)
            .on_close(on_close)
            .on_half_open(on_half_open)
            .build();

        Ok(Self {
            name,
            breaker,
            collectors: config.metrics,
            transitions,
            classifier,
            execution_limit: config.execution.semaphore(),
            fallback_limit: config.fallback.concurrency_limit,
            clock,
        })
    }

    /// Circuit name, as used in the `name` label
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current breaker state: `"Closed"`, `"Open"` or `"HalfOpen"`
    pub fn state_name(&self) -> &'static str {
        self.breaker.state_name()
    }

    /// Check if the circuit is open
    pub fn is_open(&self) -> bool {
        self.breaker.is_open()
    }

    /// Check if the circuit is closed
    pub fn is_closed(&self) -> bool {
        self.breaker.is_closed()
    }

    /// Collectors receiving this circuit's events
    pub fn collectors(&self) -> &MetricsCollectors {
        &self.collectors
    }

    /// Semaphore guarding the run path
    ///
    /// Hand it to other circuits with [`Config::with_execution_limit`] to share
    /// the permits.
    pub fn execution_limit(&self) -> Option<&Arc<BulkheadSemaphore>> {
        self.execution_limit.as_ref()
    }

    /// Execute `run` with circuit protection
    ///
    /// Errors of `run` are returned unchanged inside [`CircuitError::Execution`].
    pub fn call<T, E, F>(&mut self, run: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Result<T, E> + 'static,
        T: 'static,
        E: 'static,
    {
        self.run_metered(run).0
    }

    /// Execute `run`, falling back to `fallback` when it fails or is rejected
    ///
    /// The fallback receives the run error and is not called for bad requests
    /// or interrupts. Its result replaces the run result; a fallback error is
    /// returned as [`CircuitError::Execution`]. When the fallback concurrency
    /// limit is exhausted the run error is returned as is.
    pub fn call_with_fallback<T, E, F, G>(
        &mut self,
        run: F,
        fallback: G,
    ) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Result<T, E> + 'static,
        G: FnOnce(&CircuitError<E>) -> Result<T, E>,
        T: 'static,
        E: 'static,
    {
        let (result, outcome) = self.run_metered(run);
        match result {
            Ok(value) => Ok(value),
            Err(error) if outcome.uses_fallback() => self.run_fallback(error, fallback),
            Err(error) => Err(error),
        }
    }

    /// Clear recorded events and close the circuit
    ///
    /// Reports a close transition when the circuit was not already closed.
    pub fn reset(&mut self) {
        let was_closed = self.breaker.is_closed();
        self.breaker.reset();
        if !was_closed {
            tracing::debug!(circuit = %self.name, "circuit reset");
            self.transitions.closed(self.clock.now());
        }
    }

    fn run_metered<T, E, F>(&mut self, run: F) -> (Result<T, CircuitError<E>>, RunOutcome)
    where
        F: FnOnce() -> Result<T, E> + 'static,
        T: 'static,
        E: 'static,
    {
        let _permit = match &self.execution_limit {
            Some(limit) => match limit.try_acquire() {
                Some(permit) => Some(permit),
                None => {
                    tracing::debug!(circuit = %self.name, limit = limit.limit(), "run rejected");
                    let rejected = Err(CircuitError::BulkheadFull {
                        circuit: self.name.clone(),
                        limit: limit.limit(),
                    });
                    let outcome = self.observe_run(&rejected, None);
                    return (rejected, outcome);
                }
            },
            None => None,
        };

        // Set only when the breaker actually invoked `run`
        let elapsed = Rc::new(Cell::new(None));

        let timed = {
            let elapsed = Rc::clone(&elapsed);
            let clock = self.clock.clone();
            move || {
                let start = clock.now();
                let result = run();
                elapsed.set(Some(clock.now().duration_since(start)));
                result
            }
        };

        let result = self.breaker.call(timed);
        let outcome = self.observe_run(&result, elapsed.get());
        (result, outcome)
    }

    fn observe_run<T, E: 'static>(
        &self,
        result: &Result<T, CircuitError<E>>,
        elapsed: Option<Duration>,
    ) -> RunOutcome {
        let duration = elapsed.unwrap_or_default();

        let outcome = match result {
            Ok(_) => RunOutcome::Success,
            Err(CircuitError::Execution(error)) => {
                let ctx = FailureContext {
                    circuit_name: &self.name,
                    error: error as &dyn Any,
                    duration: duration.as_secs_f64(),
                };
                // the breaker already classified this error when deciding to trip
                let kind = self
                    .classifier
                    .take_last()
                    .unwrap_or_else(|| self.classifier.classify(&ctx));
                RunOutcome::Failed(kind)
            }
            Err(CircuitError::Open { .. }) | Err(CircuitError::HalfOpenLimitReached { .. }) => {
                RunOutcome::ShortCircuit
            }
            Err(CircuitError::BulkheadFull { .. }) => RunOutcome::Rejected,
        };

        tracing::trace!(circuit = %self.name, ?outcome, ?duration, "run finished");

        let now = self.clock.now();
        match outcome {
            RunOutcome::Success => self.collectors.each_run(|c| c.success(now, duration)),
            RunOutcome::Failed(FailureKind::Failure) => {
                self.collectors.each_run(|c| c.err_failure(now, duration))
            }
            RunOutcome::Failed(FailureKind::Timeout) => {
                self.collectors.each_run(|c| c.err_timeout(now, duration))
            }
            RunOutcome::Failed(FailureKind::BadRequest) => {
                self.collectors.each_run(|c| c.err_bad_request(now, duration))
            }
            RunOutcome::Failed(FailureKind::Interrupt) => {
                self.collectors.each_run(|c| c.err_interrupt(now, duration))
            }
            RunOutcome::ShortCircuit => self.collectors.each_run(|c| c.err_short_circuit(now)),
            RunOutcome::Rejected => {
                self.collectors.each_run(|c| c.err_concurrency_limit_reject(now))
            }
        }

        outcome
    }

    fn run_fallback<T, E, G>(&self, error: CircuitError<E>, fallback: G) -> Result<T, CircuitError<E>>
    where
        G: FnOnce(&CircuitError<E>) -> Result<T, E>,
    {
        let _permit = match &self.fallback_limit {
            Some(limit) => match limit.try_acquire() {
                Some(permit) => Some(permit),
                None => {
                    tracing::debug!(circuit = %self.name, limit = limit.limit(), "fallback rejected");
                    let now = self.clock.now();
                    self.collectors
                        .each_fallback(|c| c.err_concurrency_limit_reject(now));
                    return Err(error);
                }
            },
            None => None,
        };

        let start = self.clock.now();
        let result = fallback(&error);
        let now = self.clock.now();
        let duration = now.duration_since(start);

        match result {
            Ok(value) => {
                self.collectors.each_fallback(|c| c.success(now, duration));
                Ok(value)
            }
            Err(fallback_error) => {
                self.collectors.each_fallback(|c| c.err_failure(now, duration));
                Err(CircuitError::Execution(fallback_error))
            }
        }
    }
}

impl std::fmt::Debug for MeteredCircuit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeteredCircuit")
            .field("name", &self.name)
            .field("state", &self.breaker.state_name())
            .field("collectors", &self.collectors)
            .field("classifier", &self.classifier)
            .field("execution_limit", &self.execution_limit)
            .field("fallback_limit", &self.fallback_limit)
            .finish()
    }
}
