//! BreakerMachines Metrics - circuit breaker events as metrics instruments
//!
//! This crate binds circuit breaker lifecycle events to the `metrics` facade:
//! - Run and fallback outcomes become duration histograms and reject counters
//! - Short circuits are counted per circuit
//! - Open/close transitions drive a counter pair and an `opened` gauge
//!
//! Instruments are named `{namespace}_circuit_{metric}` and labeled with the
//! circuit `name` (plus `func` for run and fallback instruments).
//!
//! # Example
//!
//! ```rust
//! use breaker_machines_metrics::{CommandFactory, Config, GeneralConfig, MeteredCircuit};
//!
//! // Install a recorder first, then describe the instruments once
//! let factory = CommandFactory::global();
//!
//! let config = Config::merged([
//!     factory.command_properties("my_service"),
//!     Config::new().with_general(GeneralConfig {
//!         failure_threshold: Some(5),
//!         ..Default::default()
//!     }),
//! ]);
//! let mut circuit = MeteredCircuit::new("my_service", config).unwrap();
//!
//! let result = circuit.call_with_fallback(
//!     || Err::<&str, _>("connection refused".to_string()),
//!     |_error| Ok("cached"),
//! );
//! assert_eq!(result.unwrap(), "cached");
//! ```

pub mod circuit;
pub mod classifier;
pub mod collectors;
pub mod config;
pub mod errors;
pub mod factory;
pub mod handlers;
pub mod instruments;
pub mod manager;

pub use breaker_machines::{BulkheadSemaphore, CircuitError};
pub use circuit::MeteredCircuit;
pub use classifier::{DefaultClassifier, ErrorClassifier, FailureKind, PredicateClassifier};
pub use collectors::{CircuitMetrics, FallbackMetrics, MetricsCollectors, RunMetrics};
pub use config::{Config, ExecutionConfig, FallbackConfig, GeneralConfig};
pub use errors::Error;
pub use factory::CommandFactory;
pub use handlers::{CircuitMetricsCollector, FallbackMetricsCollector, RunMetricsCollector};
pub use instruments::{
    FUNC_FALLBACK, FUNC_RUN, LABEL_CIRCUIT_NAME, LABEL_FUNC_TYPE, MetricNames, SUBSYSTEM,
};
pub use manager::{Manager, PropertiesConstructor};
