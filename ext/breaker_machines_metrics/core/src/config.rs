//! Per-circuit configuration
//!
//! A [`Config`] is usually assembled from several constructors (defaults,
//! metrics, per-circuit overrides) and merged in order: scalar settings from a
//! later config win, metrics collectors accumulate.

use crate::classifier::ErrorClassifier;
use crate::collectors::MetricsCollectors;
use crate::errors::Error;
use breaker_machines::{BulkheadSemaphore, CircuitBuilder};
use std::sync::Arc;

/// Breaker thresholds; unset fields keep the breaker defaults
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneralConfig {
    pub failure_threshold: Option<usize>,
    pub failure_rate: Option<f64>,
    pub minimum_calls: Option<usize>,
    pub failure_window_secs: Option<f64>,
    pub half_open_timeout_secs: Option<f64>,
    pub success_threshold: Option<usize>,
    pub jitter_factor: Option<f64>,
}

impl GeneralConfig {
    fn merge(&mut self, other: GeneralConfig) {
        self.failure_threshold = other.failure_threshold.or(self.failure_threshold);
        self.failure_rate = other.failure_rate.or(self.failure_rate);
        self.minimum_calls = other.minimum_calls.or(self.minimum_calls);
        self.failure_window_secs = other.failure_window_secs.or(self.failure_window_secs);
        self.half_open_timeout_secs = other.half_open_timeout_secs.or(self.half_open_timeout_secs);
        self.success_threshold = other.success_threshold.or(self.success_threshold);
        self.jitter_factor = other.jitter_factor.or(self.jitter_factor);
    }

    fn apply(&self, mut builder: CircuitBuilder) -> CircuitBuilder {
        if let Some(threshold) = self.failure_threshold {
            builder = builder.failure_threshold(threshold);
        }
        if let Some(rate) = self.failure_rate {
            builder = builder.failure_rate(rate);
        }
        if let Some(calls) = self.minimum_calls {
            builder = builder.minimum_calls(calls);
        }
        if let Some(secs) = self.failure_window_secs {
            builder = builder.failure_window_secs(secs);
        }
        if let Some(secs) = self.half_open_timeout_secs {
            builder = builder.half_open_timeout_secs(secs);
        }
        if let Some(threshold) = self.success_threshold {
            builder = builder.success_threshold(threshold);
        }
        if let Some(factor) = self.jitter_factor {
            builder = builder.jitter_factor(factor);
        }
        builder
    }
}

/// Limits on the run path
#[derive(Debug, Clone, Default)]
pub struct ExecutionConfig {
    /// Maximum concurrent runs; `None` means unlimited
    pub max_concurrent_requests: Option<usize>,
    /// Permits for concurrent runs, possibly shared between circuits
    ///
    /// Takes precedence over `max_concurrent_requests`.
    pub concurrency_limit: Option<Arc<BulkheadSemaphore>>,
}

impl ExecutionConfig {
    /// Semaphore guarding the run path, if any limit is set
    pub(crate) fn semaphore(&self) -> Option<Arc<BulkheadSemaphore>> {
        match (&self.concurrency_limit, self.max_concurrent_requests) {
            (Some(shared), _) => Some(shared.clone()),
            (None, Some(limit)) => Some(Arc::new(BulkheadSemaphore::new(limit))),
            (None, None) => None,
        }
    }
}

/// Limits on the fallback path
#[derive(Debug, Clone, Default)]
pub struct FallbackConfig {
    /// Permits for concurrent fallbacks, possibly shared between circuits
    pub concurrency_limit: Option<Arc<BulkheadSemaphore>>,
}

/// Everything needed to build a metered circuit
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub general: GeneralConfig,
    pub execution: ExecutionConfig,
    pub fallback: FallbackConfig,
    pub classifier: Option<Arc<dyn ErrorClassifier>>,
    pub metrics: MetricsCollectors,
}

impl Config {
    /// Empty configuration: breaker defaults, no limits, no collectors
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the breaker thresholds
    pub fn with_general(mut self, general: GeneralConfig) -> Self {
        self.general = general;
        self
    }

    /// Limit concurrent runs of this circuit
    ///
    /// Each circuit built from this config gets its own permits; use
    /// [`Config::with_execution_limit`] to share them.
    pub fn with_max_concurrent_requests(mut self, limit: usize) -> Self {
        self.execution.max_concurrent_requests = Some(limit);
        self
    }

    /// Limit concurrent runs with a semaphore shared by every holder
    pub fn with_execution_limit(mut self, limit: Arc<BulkheadSemaphore>) -> Self {
        self.execution.concurrency_limit = Some(limit);
        self
    }

    /// Limit concurrent fallbacks with a semaphore shared by every holder
    pub fn with_fallback_limit(mut self, limit: Arc<BulkheadSemaphore>) -> Self {
        self.fallback.concurrency_limit = Some(limit);
        self
    }

    /// Classifier deciding which run errors count against the circuit
    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Replace the metrics collectors
    pub fn with_metrics(mut self, metrics: MetricsCollectors) -> Self {
        self.metrics = metrics;
        self
    }

    /// Layer `other` on top of this config
    pub fn merge(&mut self, other: Config) {
        self.general.merge(other.general);
        if other.execution.max_concurrent_requests.is_some() {
            self.execution.max_concurrent_requests = other.execution.max_concurrent_requests;
        }
        if other.execution.concurrency_limit.is_some() {
            self.execution.concurrency_limit = other.execution.concurrency_limit;
        }
        if other.fallback.concurrency_limit.is_some() {
            self.fallback.concurrency_limit = other.fallback.concurrency_limit;
        }
        if other.classifier.is_some() {
            self.classifier = other.classifier;
        }
        self.metrics.merge(other.metrics);
    }

    /// Merge a sequence of configs, first to last
    pub fn merged(configs: impl IntoIterator<Item = Config>) -> Config {
        configs.into_iter().fold(Config::default(), |mut acc, next| {
            acc.merge(next);
            acc
        })
    }

    pub(crate) fn validate(&self, circuit: &str) -> Result<(), Error> {
        let invalid = |reason| Error::InvalidConfig {
            circuit: circuit.to_string(),
            reason,
        };

        if self.execution.max_concurrent_requests == Some(0) {
            return Err(invalid("max_concurrent_requests must be greater than 0"));
        }
        if let Some(rate) = self.general.failure_rate
            && !(0.0..=1.0).contains(&rate)
        {
            return Err(invalid("failure_rate must be within 0.0..=1.0"));
        }
        if let Some(factor) = self.general.jitter_factor
            && !(0.0..=1.0).contains(&factor)
        {
            return Err(invalid("jitter_factor must be within 0.0..=1.0"));
        }
        Ok(())
    }

    /// Breaker builder carrying the thresholds
    ///
    /// Concurrency limits and classification are handled by the metered circuit.
    pub(crate) fn breaker_builder(&self, circuit: &str) -> CircuitBuilder {
        self.general.apply(CircuitBuilder::new(circuit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::DefaultClassifier;
    use crate::collectors::recording::logged;

    #[test]
    fn test_merge_overrides_set_fields_only() {
        let mut base = Config::new()
            .with_general(GeneralConfig {
                failure_threshold: Some(5),
                success_threshold: Some(2),
                ..Default::default()
            })
            .with_max_concurrent_requests(10);

        base.merge(Config::new().with_general(GeneralConfig {
            failure_threshold: Some(3),
            half_open_timeout_secs: Some(1.5),
            ..Default::default()
        }));

        assert_eq!(
            base.general,
            GeneralConfig {
                failure_threshold: Some(3),
                success_threshold: Some(2),
                half_open_timeout_secs: Some(1.5),
                ..Default::default()
            }
        );
        assert_eq!(base.execution.max_concurrent_requests, Some(10));
    }

    #[test]
    fn test_merged_accumulates_collectors() {
        let (_, first) = logged();
        let (_, second) = logged();

        let config = Config::merged([
            Config::new().with_metrics(first),
            Config::new().with_classifier(Arc::new(DefaultClassifier)),
            Config::new().with_metrics(second),
        ]);

        assert_eq!(config.metrics.run.len(), 2);
        assert_eq!(config.metrics.fallback.len(), 2);
        assert_eq!(config.metrics.circuit.len(), 2);
        assert!(config.classifier.is_some());
    }

    #[test]
    fn test_fallback_limit_is_shared() {
        let limit = Arc::new(BulkheadSemaphore::new(4));
        let mut config = Config::new();
        config.merge(Config::new().with_fallback_limit(limit.clone()));

        let held = config.fallback.concurrency_limit.as_ref().unwrap();
        assert!(Arc::ptr_eq(held, &limit));
    }

    #[test]
    fn test_execution_semaphore_prefers_shared_limit() {
        assert!(Config::new().execution.semaphore().is_none());

        let own = Config::new().with_max_concurrent_requests(3);
        let first = own.execution.semaphore().unwrap();
        let second = own.execution.semaphore().unwrap();
        assert_eq!(first.limit(), 3);
        assert!(!Arc::ptr_eq(&first, &second));

        let shared = Arc::new(BulkheadSemaphore::new(2));
        let config = Config::merged([
            Config::new().with_execution_limit(shared.clone()),
            Config::new().with_max_concurrent_requests(10),
        ]);
        assert!(Arc::ptr_eq(&config.execution.semaphore().unwrap(), &shared));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let config = Config::new().with_max_concurrent_requests(0);

        assert_eq!(
            config.validate("api"),
            Err(Error::InvalidConfig {
                circuit: "api".to_string(),
                reason: "max_concurrent_requests must be greater than 0",
            })
        );
    }

    #[test]
    fn test_validate_rejects_out_of_range_rates() {
        let rate = Config::new().with_general(GeneralConfig {
            failure_rate: Some(1.5),
            ..Default::default()
        });
        assert!(rate.validate("api").is_err());

        let jitter = Config::new().with_general(GeneralConfig {
            jitter_factor: Some(-0.1),
            ..Default::default()
        });
        assert!(jitter.validate("api").is_err());

        assert!(Config::new().validate("api").is_ok());
    }

    #[test]
    fn test_breaker_builder_applies_thresholds() {
        let config = Config::new().with_general(GeneralConfig {
            failure_threshold: Some(2),
            ..Default::default()
        });

        let mut breaker = config.breaker_builder("api").build();
        let _ = breaker.call(|| Err::<(), _>("error 1"));
        assert!(breaker.is_closed());
        let _ = breaker.call(|| Err::<(), _>("error 2"));
        assert!(breaker.is_open());
    }
}
