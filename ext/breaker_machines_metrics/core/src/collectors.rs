//! Collector interfaces for circuit execution events
//!
//! A circuit reports three families of events:
//! - run outcomes (the protected function)
//! - fallback outcomes
//! - open/close transitions
//!
//! Each family has its own trait. [`MetricsCollectors`] holds any number of
//! handlers per family and fans every event out to them in insertion order.

use quanta::Instant;
use std::sync::Arc;
use std::time::Duration;

/// Outcomes of the primary (run) function
pub trait RunMetrics: Send + Sync {
    /// Run function returned successfully
    fn success(&self, now: Instant, duration: Duration);

    /// Run function failed and the failure counts against the circuit
    fn err_failure(&self, now: Instant, duration: Duration);

    /// Run function failed with a timeout
    fn err_timeout(&self, now: Instant, duration: Duration);

    /// Run function failed with an error that does not count against the circuit
    fn err_bad_request(&self, now: Instant, duration: Duration);

    /// Run function was interrupted by the caller
    fn err_interrupt(&self, now: Instant, duration: Duration);

    /// Run function was not called because the circuit is open
    fn err_short_circuit(&self, now: Instant);

    /// Run function was not called because the concurrency limit was reached
    fn err_concurrency_limit_reject(&self, now: Instant);
}

/// Outcomes of the fallback function
pub trait FallbackMetrics: Send + Sync {
    /// Fallback returned successfully
    fn success(&self, now: Instant, duration: Duration);

    /// Fallback returned an error
    fn err_failure(&self, now: Instant, duration: Duration);

    /// Fallback was not called because its concurrency limit was reached
    fn err_concurrency_limit_reject(&self, now: Instant);
}

/// Circuit state transitions
pub trait CircuitMetrics: Send + Sync {
    /// Circuit transitioned to open
    fn opened(&self, now: Instant);

    /// Circuit transitioned to closed
    fn closed(&self, now: Instant);
}

/// Metrics collector slots for a single circuit
#[derive(Clone, Default)]
pub struct MetricsCollectors {
    /// Handlers for run outcomes, called in order
    pub run: Vec<Arc<dyn RunMetrics>>,
    /// Handlers for fallback outcomes, called in order
    pub fallback: Vec<Arc<dyn FallbackMetrics>>,
    /// Handlers for open/close transitions, called in order
    pub circuit: Vec<Arc<dyn CircuitMetrics>>,
}

impl MetricsCollectors {
    /// No handlers
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a run handler
    pub fn with_run(mut self, collector: Arc<dyn RunMetrics>) -> Self {
        self.run.push(collector);
        self
    }

    /// Add a fallback handler
    pub fn with_fallback(mut self, collector: Arc<dyn FallbackMetrics>) -> Self {
        self.fallback.push(collector);
        self
    }

    /// Add a state transition handler
    pub fn with_circuit(mut self, collector: Arc<dyn CircuitMetrics>) -> Self {
        self.circuit.push(collector);
        self
    }

    /// Append every handler of `other` after the existing ones
    pub fn merge(&mut self, other: MetricsCollectors) {
        self.run.extend(other.run);
        self.fallback.extend(other.fallback);
        self.circuit.extend(other.circuit);
    }

    /// Check if no handler is registered in any slot
    pub fn is_empty(&self) -> bool {
        self.run.is_empty() && self.fallback.is_empty() && self.circuit.is_empty()
    }

    pub(crate) fn each_run(&self, f: impl Fn(&dyn RunMetrics)) {
        for collector in &self.run {
            f(collector.as_ref());
        }
    }

    pub(crate) fn each_fallback(&self, f: impl Fn(&dyn FallbackMetrics)) {
        for collector in &self.fallback {
            f(collector.as_ref());
        }
    }
}

impl std::fmt::Debug for MetricsCollectors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsCollectors")
            .field("run", &self.run.len())
            .field("fallback", &self.fallback.len())
            .field("circuit", &self.circuit.len())
            .finish()
    }
}

/// Fans transition events out to a fixed set of handlers
///
/// Shared with the breaker callbacks, which outlive any borrow of the config.
#[derive(Clone)]
pub(crate) struct TransitionFanout {
    collectors: Arc<[Arc<dyn CircuitMetrics>]>,
}

impl TransitionFanout {
    pub(crate) fn new(collectors: Vec<Arc<dyn CircuitMetrics>>) -> Self {
        Self {
            collectors: collectors.into(),
        }
    }

    pub(crate) fn opened(&self, now: Instant) {
        for collector in self.collectors.iter() {
            collector.opened(now);
        }
    }

    pub(crate) fn closed(&self, now: Instant) {
        for collector in self.collectors.iter() {
            collector.closed(now);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::recording::EventLog;
    use super::*;
    use quanta::Clock;

    #[test]
    fn test_fanout_preserves_insertion_order() {
        let first = Arc::new(EventLog::default());
        let second = Arc::new(EventLog::default());
        let collectors = MetricsCollectors::new()
            .with_run(first.clone())
            .with_run(second.clone());

        let now = Clock::new().now();
        collectors.each_run(|c| c.success(now, Duration::from_millis(3)));
        collectors.each_run(|c| c.err_short_circuit(now));

        assert_eq!(first.events(), vec!["run.success 3ms", "run.short_circuit"]);
        assert_eq!(second.events(), first.events());
    }

    #[test]
    fn test_merge_appends() {
        let log = Arc::new(EventLog::default());
        let mut base = MetricsCollectors::new().with_circuit(log.clone());
        assert!(!base.is_empty());

        base.merge(
            MetricsCollectors::new()
                .with_circuit(log.clone())
                .with_fallback(log.clone()),
        );

        assert_eq!(base.run.len(), 0);
        assert_eq!(base.fallback.len(), 1);
        assert_eq!(base.circuit.len(), 2);
        assert_eq!(
            format!("{:?}", base),
            "MetricsCollectors { run: 0, fallback: 1, circuit: 2 }"
        );
    }

    #[test]
    fn test_transition_fanout() {
        let log = Arc::new(EventLog::default());
        let fanout = TransitionFanout::new(vec![log.clone() as Arc<dyn CircuitMetrics>, log.clone()]);

        let now = Clock::new().now();
        fanout.opened(now);
        fanout.closed(now);

        assert_eq!(
            log.events(),
            vec![
                "circuit.opened",
                "circuit.opened",
                "circuit.closed",
                "circuit.closed"
            ]
        );
    }
}
