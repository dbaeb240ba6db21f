//! Prometheus exposition for breaker-machines circuit metrics
//!
//! Installs a `metrics-exporter-prometheus` recorder tuned for the circuit
//! instruments, then initializes the process-wide [`CommandFactory`] so the
//! instrument descriptions land in that recorder.
//!
//! # Example
//!
//! ```rust,no_run
//! use breaker_machines_prometheus::{ExporterConfig, install};
//!
//! let factory = install(&ExporterConfig::default().with_listen_address(([0, 0, 0, 0], 8080)))
//!     .expect("prometheus exporter");
//! let config = factory.command_properties("hello-world");
//! ```

use breaker_machines_metrics::CommandFactory;
use metrics_exporter_prometheus::{
    BuildError, Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder,
};
use std::net::SocketAddr;

pub use breaker_machines_metrics;

/// Suffix shared by every duration histogram
pub const DURATION_SUFFIX: &str = "duration_seconds";

/// Histogram buckets, in seconds, used when none are configured
pub const DEFAULT_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Errors raised while wiring the exporter
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("failed to build prometheus recorder: {0}")]
    Build(#[from] BuildError),

    #[error(transparent)]
    Metrics(#[from] breaker_machines_metrics::Error),
}

/// Exporter settings
#[derive(Debug, Clone, PartialEq)]
pub struct ExporterConfig {
    /// Namespace prefixed to every instrument name
    pub namespace: String,
    /// Scrape endpoint address; `None` installs the recorder without a listener
    pub listen_address: Option<SocketAddr>,
    /// Bucket bounds for the `*_duration_seconds` histograms
    pub buckets: Vec<f64>,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            listen_address: None,
            buckets: DEFAULT_BUCKETS.to_vec(),
        }
    }
}

impl ExporterConfig {
    /// Prefix every instrument name with `namespace`
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Serve the scrape endpoint on `addr`
    pub fn with_listen_address(mut self, addr: impl Into<SocketAddr>) -> Self {
        self.listen_address = Some(addr.into());
        self
    }

    /// Bucket bounds, in seconds, for the duration histograms
    pub fn with_buckets(mut self, buckets: &[f64]) -> Self {
        self.buckets = buckets.to_vec();
        self
    }

    fn builder(&self) -> Result<PrometheusBuilder, InstallError> {
        let mut builder = PrometheusBuilder::new()
            .set_buckets_for_metric(Matcher::Suffix(DURATION_SUFFIX.to_string()), &self.buckets)?;
        if let Some(addr) = self.listen_address {
            builder = builder.with_http_listener(addr);
        }
        Ok(builder)
    }
}

/// Install the global Prometheus recorder and initialize the factory singleton
///
/// With a listen address the scrape endpoint is served in the background;
/// without one only the recorder is installed.
pub fn install(config: &ExporterConfig) -> Result<&'static CommandFactory, InstallError> {
    // validate before touching the global recorder
    breaker_machines_metrics::MetricNames::new(config.namespace.as_str())?;

    let builder = config.builder()?;
    match config.listen_address {
        Some(addr) => {
            builder.install()?;
            tracing::info!(%addr, "serving circuit metrics");
        }
        None => {
            builder.install_recorder()?;
            tracing::debug!("installed circuit metrics recorder without listener");
        }
    }

    Ok(CommandFactory::global_with_namespace(&config.namespace)?)
}

/// Install the global recorder without a listener, returning its render handle
pub fn install_recorder(
    config: &ExporterConfig,
) -> Result<(PrometheusHandle, &'static CommandFactory), InstallError> {
    breaker_machines_metrics::MetricNames::new(config.namespace.as_str())?;

    let handle = config.builder()?.install_recorder()?;
    let factory = CommandFactory::global_with_namespace(&config.namespace)?;
    Ok((handle, factory))
}

/// Build a recorder and a standalone factory without installing anything
///
/// The listen address is ignored. Call [`CommandFactory::describe`] once the
/// recorder is current.
pub fn build_recorder(
    config: &ExporterConfig,
) -> Result<(PrometheusRecorder, CommandFactory), InstallError> {
    let factory = CommandFactory::new(config.namespace.as_str())?;
    let recorder = PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Suffix(DURATION_SUFFIX.to_string()), &config.buckets)?
        .build_recorder();
    Ok((recorder, factory))
}
