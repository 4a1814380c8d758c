//! Tracing subscriber setup.

use depot_core::DepotConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: "depot_storage=info,warn".to_string(),
            json: false,
        }
    }
}

impl TelemetryConfig {
    /// Verbose configs log the adapter at debug level.
    pub fn from_depot_config(config: &DepotConfig) -> Self {
        let filter = if config.verbosity {
            "depot_storage=debug,depot_core=debug,info"
        } else {
            "depot_storage=info,warn"
        };
        Self {
            filter: filter.to_string(),
            ..Self::default()
        }
    }

    /// Read `DEPOT_LOG_FILTER` and `DEPOT_LOG_JSON`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            filter: std::env::var("DEPOT_LOG_FILTER").unwrap_or(defaults.filter),
            json: std::env::var("DEPOT_LOG_JSON")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(defaults.json),
        }
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured filter. Returns false if
/// a subscriber was already installed, which is not an error.
pub fn init_tracing(config: &TelemetryConfig) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let (json_layer, text_layer) = if config.json {
        (Some(tracing_subscriber::fmt::layer().json()), None)
    } else {
        (None, Some(tracing_subscriber::fmt::layer()))
    };

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(filter = %config.filter, json = config.json, "Tracing initialized");
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.filter, "depot_storage=info,warn");
        assert!(!config.json);
        assert!(config.with_json(true).json);
    }

    #[test]
    fn test_verbose_config_logs_debug() {
        let mut config = DepotConfig::from_toml_str(
            r#"
            [s3]
            bucket = "registry"
            region = "us-east-1"
            path = "https://cdn.example.com/"
            components_dir = "components"
            "#,
        )
        .unwrap();
        assert_eq!(
            TelemetryConfig::from_depot_config(&config).filter,
            "depot_storage=info,warn"
        );

        config.verbosity = true;
        assert!(TelemetryConfig::from_depot_config(&config)
            .filter
            .starts_with("depot_storage=debug"));
    }

    #[test]
    fn test_init_is_idempotent() {
        let config = TelemetryConfig::default();
        init_tracing(&config);
        // A subscriber is installed now, whoever installed it.
        assert!(!init_tracing(&config));
    }
}
