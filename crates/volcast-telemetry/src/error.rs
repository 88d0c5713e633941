//! Error types for telemetry operations.

use prometheus::Error as PrometheusError;
use thiserror::Error;
use tracing_subscriber::util::TryInitError;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised while installing logging or maintaining pipeline metrics.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global tracing subscriber was already installed.
    #[error("tracing subscriber could not be installed")]
    SubscriberInstall {
        /// Underlying tracing subscriber error.
        #[source]
        source: TryInitError,
    },
    /// A pipeline counter could not be built or registered.
    #[error("metrics collector rejected")]
    Collector {
        /// Metric name.
        name: &'static str,
        /// `build` or `register`.
        stage: &'static str,
        /// Underlying Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// The registry could not be rendered as text exposition.
    #[error("metrics rendering failed")]
    Render {
        /// Underlying Prometheus error.
        #[source]
        source: PrometheusError,
    },
}

impl TelemetryError {
    pub(crate) const fn build(name: &'static str, source: PrometheusError) -> Self {
        Self::Collector {
            name,
            stage: "build",
            source,
        }
    }

    pub(crate) const fn register(name: &'static str, source: PrometheusError) -> Self {
        Self::Collector {
            name,
            stage: "register",
            source,
        }
    }
}
