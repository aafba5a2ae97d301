//! Logging initialisation
//!
//! Installs a global `tracing-subscriber` formatter with an `EnvFilter`.
//! `RUST_LOG` wins over the configured filter when set. Initialisation is
//! idempotent: a second call leaves the first subscriber in place.

use tracing_subscriber::EnvFilter;

/// Subscriber settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Filter directives, e.g. `"info"` or `"suss_propagate=debug,info"`
    pub filter: String,
    /// One JSON object per event instead of human-readable lines
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        TelemetryConfig {
            filter: "info".to_owned(),
            json: false,
        }
    }
}

impl TelemetryConfig {
    /// Debug output from every Suss crate
    pub fn verbose() -> Self {
        TelemetryConfig {
            filter: "suss_state=debug,suss_propagate=debug,suss_runtime=debug,info".to_owned(),
            ..Default::default()
        }
    }

    /// JSON lines for log shippers
    pub fn json() -> Self {
        TelemetryConfig {
            json: true,
            ..Default::default()
        }
    }

    /// Filter in effect: `RUST_LOG` when set and valid, else the configured one
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.filter))
    }

    /// Install the global subscriber. Returns false if one was already set.
    pub fn init(&self) -> bool {
        let builder = tracing_subscriber::fmt().with_env_filter(self.env_filter());
        let result = if self.json {
            builder.json().try_init()
        } else {
            builder.with_target(false).try_init()
        };
        result.is_ok()
    }
}

/// Install the default subscriber
pub fn init_telemetry() -> bool {
    TelemetryConfig::default().init()
}
