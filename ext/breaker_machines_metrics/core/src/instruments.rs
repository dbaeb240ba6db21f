//! Instrument names and one-time registration
//!
//! Every instrument lives under the `circuit` subsystem, optionally prefixed
//! with a namespace: `{namespace}_circuit_{metric}`.

use crate::errors::Error;
use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};

/// Subsystem segment shared by every instrument
pub const SUBSYSTEM: &str = "circuit";

/// Label carrying the circuit name
pub const LABEL_CIRCUIT_NAME: &str = "name";

/// Label carrying the execution path (`run` or `fallback`)
pub const LABEL_FUNC_TYPE: &str = "func";

/// Value of [`LABEL_FUNC_TYPE`] for the primary function
pub const FUNC_RUN: &str = "run";

/// Value of [`LABEL_FUNC_TYPE`] for the fallback function
pub const FUNC_FALLBACK: &str = "fallback";

/// Fully qualified names of the circuit instruments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricNames {
    namespace: String,
    // shared by run and fallback, labeled by func
    pub success_duration: String,
    pub failure_duration: String,
    pub concurrency_reject_total: String,
    // run only
    pub timeout_duration: String,
    pub bad_request_duration: String,
    pub short_circuit_total: String,
    // transitions
    pub closed_total: String,
    pub opened_total: String,
    pub opened: String,
}

impl MetricNames {
    /// Build the instrument names for `namespace` (may be empty)
    pub fn new(namespace: impl Into<String>) -> Result<Self, Error> {
        let namespace = namespace.into();
        if !is_valid_namespace(&namespace) {
            return Err(Error::InvalidNamespace { namespace });
        }
        Ok(Self::build(namespace))
    }

    fn build(namespace: String) -> Self {
        let name = |metric: &str| fq_name(&namespace, metric);

        Self {
            success_duration: name("success_duration_seconds"),
            failure_duration: name("failure_duration_seconds"),
            concurrency_reject_total: name("concurrency_reject_total"),
            timeout_duration: name("timeout_duration_seconds"),
            bad_request_duration: name("bad_request_duration_seconds"),
            short_circuit_total: name("short_circuit_total"),
            closed_total: name("closed_total"),
            opened_total: name("opened_total"),
            opened: name("opened"),
            namespace,
        }
    }

    /// Namespace prefix, empty when the names start with `circuit_`
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Register unit and help text for every instrument with the current recorder
    pub fn describe(&self) {
        describe_histogram!(
            self.success_duration.clone(),
            Unit::Seconds,
            "Duration of successful func run"
        );
        describe_histogram!(
            self.failure_duration.clone(),
            Unit::Seconds,
            "Duration of failed func run"
        );
        describe_counter!(
            self.concurrency_reject_total.clone(),
            "Total reject requests for reach concurrency limit"
        );
        describe_histogram!(
            self.timeout_duration.clone(),
            Unit::Seconds,
            "Duration of timeout func run"
        );
        describe_histogram!(
            self.bad_request_duration.clone(),
            Unit::Seconds,
            "Duration of bad request request"
        );
        describe_counter!(
            self.short_circuit_total.clone(),
            "Total of runFunc is not called because the circuit was open"
        );
        describe_counter!(
            self.closed_total.clone(),
            "Total of circuit transitions from open to closed"
        );
        describe_counter!(
            self.opened_total.clone(),
            "Total of circuit transitions from closed to opened"
        );
        describe_gauge!(
            self.opened.clone(),
            "The status of a circuit, 1 opened, 0 closed"
        );

        tracing::debug!(namespace = %self.namespace, "registered circuit instruments");
    }

    /// All instrument names, in registration order
    pub fn all(&self) -> [&str; 9] {
        [
            &self.success_duration,
            &self.failure_duration,
            &self.concurrency_reject_total,
            &self.timeout_duration,
            &self.bad_request_duration,
            &self.short_circuit_total,
            &self.closed_total,
            &self.opened_total,
            &self.opened,
        ]
    }
}

impl Default for MetricNames {
    /// Names without namespace (`circuit_*`)
    fn default() -> Self {
        Self::build(String::new())
    }
}

fn fq_name(namespace: &str, metric: &str) -> String {
    if namespace.is_empty() {
        format!("{SUBSYSTEM}_{metric}")
    } else {
        format!("{namespace}_{SUBSYSTEM}_{metric}")
    }
}

fn is_valid_namespace(namespace: &str) -> bool {
    let mut chars = namespace.chars();
    match chars.next() {
        None => true,
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        Some(_) => false,
    }
}
