//! Collectors that record circuit events through the `metrics` facade
//!
//! Instrument handles are resolved on every observation, so events land in
//! whichever recorder is current at that moment.

use crate::collectors::{CircuitMetrics, FallbackMetrics, RunMetrics};
use crate::instruments::{FUNC_FALLBACK, FUNC_RUN, LABEL_CIRCUIT_NAME, LABEL_FUNC_TYPE, MetricNames};
use metrics::{counter, gauge, histogram};
use quanta::Instant;
use std::sync::Arc;
use std::time::Duration;

/// Records run outcomes of one circuit
#[derive(Debug, Clone)]
pub struct RunMetricsCollector {
    circuit: String,
    names: Arc<MetricNames>,
}

impl RunMetricsCollector {
    /// Collector for `circuit`, recording into the instruments named by `names`
    pub fn new(circuit: impl Into<String>, names: Arc<MetricNames>) -> Self {
        Self {
            circuit: circuit.into(),
            names,
        }
    }

    /// Circuit name used as the `name` label
    pub fn circuit(&self) -> &str {
        &self.circuit
    }
}

impl RunMetrics for RunMetricsCollector {
    fn success(&self, _now: Instant, duration: Duration) {
        histogram!(
            self.names.success_duration.clone(),
            LABEL_FUNC_TYPE => FUNC_RUN,
            LABEL_CIRCUIT_NAME => self.circuit.clone()
        )
        .record(duration.as_secs_f64());
    }

    fn err_failure(&self, _now: Instant, duration: Duration) {
        histogram!(
            self.names.failure_duration.clone(),
            LABEL_FUNC_TYPE => FUNC_RUN,
            LABEL_CIRCUIT_NAME => self.circuit.clone()
        )
        .record(duration.as_secs_f64());
    }

    fn err_timeout(&self, _now: Instant, duration: Duration) {
        histogram!(
            self.names.timeout_duration.clone(),
            LABEL_CIRCUIT_NAME => self.circuit.clone()
        )
        .record(duration.as_secs_f64());
    }

    fn err_bad_request(&self, _now: Instant, duration: Duration) {
        histogram!(
            self.names.bad_request_duration.clone(),
            LABEL_CIRCUIT_NAME => self.circuit.clone()
        )
        .record(duration.as_secs_f64());
    }

    // Interrupts are caller-driven and carry no signal about the dependency.
    fn err_interrupt(&self, _now: Instant, _duration: Duration) {}

    fn err_short_circuit(&self, _now: Instant) {
        counter!(
            self.names.short_circuit_total.clone(),
            LABEL_CIRCUIT_NAME => self.circuit.clone()
        )
        .increment(1);
    }

    fn err_concurrency_limit_reject(&self, _now: Instant) {
        counter!(
            self.names.concurrency_reject_total.clone(),
            LABEL_FUNC_TYPE => FUNC_RUN,
            LABEL_CIRCUIT_NAME => self.circuit.clone()
        )
        .increment(1);
    }
}

/// Records fallback outcomes of one circuit
#[derive(Debug, Clone)]
pub struct FallbackMetricsCollector {
    circuit: String,
    names: Arc<MetricNames>,
}

impl FallbackMetricsCollector {
    /// Collector for `circuit`, recording into the instruments named by `names`
    pub fn new(circuit: impl Into<String>, names: Arc<MetricNames>) -> Self {
        Self {
            circuit: circuit.into(),
            names,
        }
    }
}

impl FallbackMetrics for FallbackMetricsCollector {
    fn success(&self, _now: Instant, duration: Duration) {
        histogram!(
            self.names.success_duration.clone(),
            LABEL_FUNC_TYPE => FUNC_FALLBACK,
            LABEL_CIRCUIT_NAME => self.circuit.clone()
        )
        .record(duration.as_secs_f64());
    }

    fn err_failure(&self, _now: Instant, duration: Duration) {
        histogram!(
            self.names.failure_duration.clone(),
            LABEL_FUNC_TYPE => FUNC_FALLBACK,
            LABEL_CIRCUIT_NAME => self.circuit.clone()
        )
        .record(duration.as_secs_f64());
    }

    fn err_concurrency_limit_reject(&self, _now: Instant) {
        counter!(
            self.names.concurrency_reject_total.clone(),
            LABEL_FUNC_TYPE => FUNC_FALLBACK,
            LABEL_CIRCUIT_NAME => self.circuit.clone()
        )
        .increment(1);
    }
}

/// Records open/close transitions of one circuit
#[derive(Debug, Clone)]
pub struct CircuitMetricsCollector {
    circuit: String,
    names: Arc<MetricNames>,
}

impl CircuitMetricsCollector {
    /// Collector for `circuit`, recording into the instruments named by `names`
    pub fn new(circuit: impl Into<String>, names: Arc<MetricNames>) -> Self {
        Self {
            circuit: circuit.into(),
            names,
        }
    }
}

impl CircuitMetrics for CircuitMetricsCollector {
    fn opened(&self, _now: Instant) {
        counter!(
            self.names.opened_total.clone(),
            LABEL_CIRCUIT_NAME => self.circuit.clone()
        )
        .increment(1);
        gauge!(self.names.opened.clone(), LABEL_CIRCUIT_NAME => self.circuit.clone()).set(1.0);
    }

    fn closed(&self, _now: Instant) {
        counter!(
            self.names.closed_total.clone(),
            LABEL_CIRCUIT_NAME => self.circuit.clone()
        )
        .increment(1);
        gauge!(self.names.opened.clone(), LABEL_CIRCUIT_NAME => self.circuit.clone()).set(0.0);
    }
}

#[cfg(test)]
pub(crate) mod snapshot {
    //! Lookup helpers over `DebuggingRecorder` snapshots.

    use metrics_util::debugging::{DebugValue, Snapshotter};

    pub(crate) struct Observed {
        entries: Vec<(String, Vec<(String, String)>, DebugValue)>,
    }

    impl Observed {
        pub(crate) fn take(snapshotter: &Snapshotter) -> Self {
            let entries = snapshotter
                .snapshot()
                .into_vec()
                .into_iter()
                .map(|(key, _, _, value)| {
                    let key = key.key();
                    let labels = key
                        .labels()
                        .map(|l| (l.key().to_string(), l.value().to_string()))
                        .collect();
                    (key.name().to_string(), labels, value)
                })
                .collect();
            Self { entries }
        }

        fn find(&self, name: &str, labels: &[(&str, &str)]) -> Option<&DebugValue> {
            self.entries
                .iter()
                .find(|(n, l, _)| {
                    n == name
                        && l.len() == labels.len()
                        && l.iter()
                            .zip(labels)
                            .all(|((k, v), (ek, ev))| k == ek && v == ev)
                })
                .map(|(_, _, value)| value)
        }

        pub(crate) fn counter(&self, name: &str, labels: &[(&str, &str)]) -> Option<u64> {
            match self.find(name, labels)? {
                DebugValue::Counter(value) => Some(*value),
                _ => None,
            }
        }

        pub(crate) fn gauge(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
            match self.find(name, labels)? {
                DebugValue::Gauge(value) => Some(value.into_inner()),
                _ => None,
            }
        }

        pub(crate) fn histogram(&self, name: &str, labels: &[(&str, &str)]) -> Option<Vec<f64>> {
            match self.find(name, labels)? {
                DebugValue::Histogram(values) => {
                    Some(values.iter().map(|v| v.into_inner()).collect())
                }
                _ => None,
            }
        }

        pub(crate) fn len(&self) -> usize {
            self.entries.len()
        }
    }
}
