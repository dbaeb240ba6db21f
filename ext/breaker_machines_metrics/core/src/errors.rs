//! Error types for metrics wiring and circuit construction

use thiserror::Error;

/// Errors raised while configuring collectors or building circuits
///
/// Failures of the wrapped operation are not represented here; they are
/// returned unchanged as [`breaker_machines::CircuitError`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Namespace cannot be used as a metric name prefix
    #[error("invalid metric namespace '{namespace}': expected [A-Za-z_][A-Za-z0-9_]*")]
    InvalidNamespace { namespace: String },

    /// The global factory was already initialized with another namespace
    #[error("circuit metrics already registered under namespace '{active}', requested '{requested}'")]
    NamespaceMismatch { active: String, requested: String },

    /// A circuit with this name was already created by the manager
    #[error("circuit '{0}' already exists")]
    CircuitExists(String),

    /// Circuit configuration is not usable
    #[error("invalid configuration for circuit '{circuit}': {reason}")]
    InvalidConfig {
        circuit: String,
        reason: &'static str,
    },
}
