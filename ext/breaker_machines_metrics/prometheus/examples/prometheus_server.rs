//! Circuit metrics served on :8080
//!
//! `curl 0:8080/metrics | grep circuit`. Set `DEBUG_SLEEP` to keep the
//! endpoint up after the demo calls.

use breaker_machines_prometheus::breaker_machines_metrics::{Config, GeneralConfig, Manager};
use breaker_machines_prometheus::{ExporterConfig, install};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into()))
        .init();

    let factory = install(&ExporterConfig::default().with_listen_address(([0, 0, 0, 0], 8080)))?;

    let mut manager = Manager::new();
    manager.add_default(move |name| factory.command_properties(name));
    manager.add_default(|_| {
        Config::new()
            .with_max_concurrent_requests(1000)
            .with_general(GeneralConfig {
                failure_threshold: 6.into(),
                failure_rate: 0.5.into(),
                minimum_calls: 6.into(),
                half_open_timeout_secs: 3.0.into(),
                ..Default::default()
            })
    });

    let mut circuit = manager.create_circuit("hello-world", [])?;

    match circuit.call(|| Ok::<_, String>("hello")) {
        Ok(result) => println!("✓ {result}"),
        Err(e) => println!("✗ {e}"),
    }

    match circuit.call(|| Err::<&str, _>("err in run func".to_string())) {
        Ok(_) => println!("✓ Success"),
        Err(e) => println!("✗ {e}"),
    }

    let fallback = circuit.call_with_fallback(
        || Err::<&str, _>("err in run func".to_string()),
        |error| {
            println!("fallback after: {error}");
            Err("err in fallback func".to_string())
        },
    );
    match fallback {
        Ok(_) => println!("✓ Success"),
        Err(e) => println!("✗ {e}"),
    }

    println!("State: {}", circuit.state_name());

    if std::env::var_os("DEBUG_SLEEP").is_some() {
        std::thread::sleep(Duration::from_secs(60 * 60));
    }

    Ok(())
}
