//! Circuit construction from default property constructors

use crate::circuit::MeteredCircuit;
use crate::config::Config;
use crate::errors::Error;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

/// Produces a configuration for a circuit name
pub type PropertiesConstructor = Arc<dyn Fn(&str) -> Config + Send + Sync>;

/// Builds uniquely named circuits from a list of default constructors
///
/// # Example
///
/// ```rust
/// use breaker_machines_metrics::{CommandFactory, Manager};
///
/// let factory = CommandFactory::global();
/// let mut manager = Manager::new();
/// manager.add_default(move |name| factory.command_properties(name));
///
/// let mut circuit = manager.create_circuit("hello-world", []).unwrap();
/// assert!(circuit.call(|| Ok::<_, String>("ok")).is_ok());
/// ```
#[derive(Default)]
pub struct Manager {
    defaults: Vec<PropertiesConstructor>,
    circuits: Mutex<BTreeSet<String>>,
}

impl Manager {
    /// Manager without default constructors
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a constructor applied to every circuit, after the existing ones
    pub fn add_default<F>(&mut self, constructor: F)
    where
        F: Fn(&str) -> Config + Send + Sync + 'static,
    {
        self.defaults.push(Arc::new(constructor));
    }

    /// Create a circuit named `name`
    ///
    /// Default constructors are merged in order, then `overrides`.
    pub fn create_circuit(
        &self,
        name: &str,
        overrides: impl IntoIterator<Item = Config>,
    ) -> Result<MeteredCircuit, Error> {
        let config = Config::merged(
            self.defaults
                .iter()
                .map(|constructor| constructor(name))
                .chain(overrides),
        );

        let mut circuits = self
            .circuits
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if circuits.contains(name) {
            return Err(Error::CircuitExists(name.to_string()));
        }

        let circuit = MeteredCircuit::new(name, config)?;
        circuits.insert(name.to_string());
        tracing::debug!(circuit = name, "created circuit");
        Ok(circuit)
    }

    /// Names of every circuit created so far, sorted
    pub fn circuit_names(&self) -> Vec<String> {
        self.circuits
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("defaults", &self.defaults.len())
            .field("circuits", &self.circuit_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::recording::logged;
    use crate::config::GeneralConfig;
    use crate::factory::CommandFactory;

    #[test]
    fn test_defaults_then_overrides() {
        let mut manager = Manager::new();
        manager.add_default(|_| {
            Config::new().with_general(GeneralConfig {
                failure_threshold: Some(10),
                ..Default::default()
            })
        });
        let (log, collectors) = logged();
        manager.add_default(move |_| Config::new().with_metrics(collectors.clone()));

        let mut circuit = manager
            .create_circuit(
                "orders",
                [Config::new().with_general(GeneralConfig {
                    failure_threshold: Some(1),
                    ..Default::default()
                })],
            )
            .unwrap();

        let _ = circuit.call(|| Err::<(), _>("down"));
        assert!(circuit.is_open());
        assert_eq!(circuit.name(), "orders");
        assert_eq!(circuit.collectors().run.len(), 1);
        assert!(log.events().contains(&"circuit.opened".to_string()));
    }

    #[test]
    fn test_circuit_names_are_unique() {
        let factory = CommandFactory::new("").unwrap();
        let mut manager = Manager::new();
        manager.add_default(move |name| factory.command_properties(name));

        manager.create_circuit("b", []).unwrap();
        manager.create_circuit("a", []).unwrap();

        assert_eq!(
            manager.create_circuit("a", []).unwrap_err(),
            Error::CircuitExists("a".to_string())
        );
        assert_eq!(manager.circuit_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_invalid_config_does_not_reserve_name() {
        let manager = Manager::new();

        let err = manager
            .create_circuit("api", [Config::new().with_max_concurrent_requests(0)])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));

        assert!(manager.create_circuit("api", []).is_ok());
    }
}
