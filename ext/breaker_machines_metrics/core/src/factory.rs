//! Factory producing metrics-wired circuit configurations
//!
//! Instruments are described once per process through [`CommandFactory::global`]
//! (or [`CommandFactory::global_with_namespace`]), however many circuits are
//! created afterwards. Install the recorder before the first call so the
//! descriptions reach it.

use crate::collectors::MetricsCollectors;
use crate::config::Config;
use crate::errors::Error;
use crate::handlers::{CircuitMetricsCollector, FallbackMetricsCollector, RunMetricsCollector};
use crate::instruments::MetricNames;
use std::sync::{Arc, OnceLock};

static GLOBAL: OnceLock<CommandFactory> = OnceLock::new();

/// Creates per-circuit [`Config`]s whose metrics slots record into the circuit instruments
#[derive(Debug, Clone)]
pub struct CommandFactory {
    names: Arc<MetricNames>,
}

impl CommandFactory {
    /// Standalone factory; nothing is registered until [`CommandFactory::describe`]
    pub fn new(namespace: impl Into<String>) -> Result<Self, Error> {
        Ok(Self {
            names: Arc::new(MetricNames::new(namespace)?),
        })
    }

    /// Process-wide factory
    ///
    /// Initializes the singleton with the empty namespace when it does not
    /// exist yet. Otherwise returns the existing instance, whatever namespace
    /// [`CommandFactory::global_with_namespace`] gave it.
    pub fn global() -> &'static CommandFactory {
        GLOBAL.get_or_init(|| Self::registered(MetricNames::default()))
    }

    /// Process-wide factory, registering the instruments on first use
    ///
    /// Later calls return the same instance. Asking for a different namespace
    /// than the one in use fails with [`Error::NamespaceMismatch`].
    pub fn global_with_namespace(namespace: &str) -> Result<&'static CommandFactory, Error> {
        let names = MetricNames::new(namespace)?;
        GLOBAL
            .get_or_init(|| Self::registered(names))
            .check_namespace(namespace)
    }

    fn registered(names: MetricNames) -> Self {
        let factory = Self {
            names: Arc::new(names),
        };
        factory.describe();
        tracing::debug!(
            namespace = factory.names.namespace(),
            "initialized global circuit metrics factory"
        );
        factory
    }

    fn check_namespace(&'static self, requested: &str) -> Result<&'static CommandFactory, Error> {
        if self.names.namespace() == requested {
            Ok(self)
        } else {
            Err(Error::NamespaceMismatch {
                active: self.names.namespace().to_string(),
                requested: requested.to_string(),
            })
        }
    }

    /// Instrument names used by every collector of this factory
    pub fn names(&self) -> &MetricNames {
        &self.names
    }

    /// Describe every instrument to the current recorder
    pub fn describe(&self) {
        self.names.describe();
    }

    /// Configuration carrying one run, fallback and circuit collector for `circuit_name`
    pub fn command_properties(&self, circuit_name: &str) -> Config {
        Config::new().with_metrics(self.collectors(circuit_name))
    }

    /// Collector slots for `circuit_name`
    pub fn collectors(&self, circuit_name: &str) -> MetricsCollectors {
        MetricsCollectors::new()
            .with_run(Arc::new(RunMetricsCollector::new(
                circuit_name,
                self.names.clone(),
            )))
            .with_fallback(Arc::new(FallbackMetricsCollector::new(
                circuit_name,
                self.names.clone(),
            )))
            .with_circuit(Arc::new(CircuitMetricsCollector::new(
                circuit_name,
                self.names.clone(),
            )))
    }
}
