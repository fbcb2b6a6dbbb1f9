use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::model::SensorType;
use crate::monitor::{AlertPolicy, SeverityPolicy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deployment {
    Local,
    Dev,
    Stage,
    Prod,
}

impl Deployment {
    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Self::Dev,
            "stage" | "staging" => Self::Stage,
            "prod" | "production" => Self::Prod,
            _ => Self::Local,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Database (optional write-through persistence)
    pub database_url: Option<String>,

    // API settings
    pub api_host: String,
    pub api_port: u16,

    // Rate limiting
    pub disable_rate_limiting: bool,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,

    // Cached views
    pub cache_ttl_seconds: u64,
    pub cache_max_entries: u64,

    // Alerting policy
    pub alert_coalesce_window_seconds: u64,
    pub alert_auto_resolve: bool,
    pub severity_medium_ratio: f64,
    pub severity_high_ratio: f64,
    pub severity_critical_ratio: f64,
    pub critical_sensor_types: Vec<SensorType>,

    // Pagination
    pub default_page_size: usize,
    pub max_page_size: usize,

    // Application metadata
    pub deployment: Deployment,
}

impl Default for Config {
    fn default() -> Self {
        let severity = SeverityPolicy::default();
        Self {
            database_url: None,
            api_host: "0.0.0.0".to_string(),
            api_port: 3000,
            disable_rate_limiting: false,
            rate_limit_per_second: 10,
            rate_limit_burst: 60,
            cache_ttl_seconds: 300,
            cache_max_entries: 10_000,
            alert_coalesce_window_seconds: 60,
            alert_auto_resolve: false,
            severity_medium_ratio: severity.medium_ratio,
            severity_high_ratio: severity.high_ratio,
            severity_critical_ratio: severity.critical_ratio,
            critical_sensor_types: severity.critical_types,
            default_page_size: 100,
            max_page_size: 1000,
            deployment: Deployment::Local,
        }
    }
}

/// Parse an env var, falling back to `default` when unset or blank.
fn env_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    parse_or(key, env::var(key).ok(), default)
}

fn parse_or<T: FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
            key,
            value: value.to_string(),
        }),
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if a set variable cannot be parsed or
    /// the severity bands are not strictly increasing.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let critical_sensor_types = match env::var("CRITICAL_SENSOR_TYPES") {
            Ok(raw) => parse_sensor_types(&raw)?,
            Err(_) => defaults.critical_sensor_types,
        };

        let config = Self {
            // Database
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),

            // API settings
            api_host: env::var("API_HOST").unwrap_or(defaults.api_host),
            api_port: env_or("API_PORT", defaults.api_port)?,

            // Rate limiting
            disable_rate_limiting: env_or("DISABLE_RATE_LIMITING", defaults.disable_rate_limiting)?,
            rate_limit_per_second: env_or("RATE_LIMIT_PER_SECOND", defaults.rate_limit_per_second)?,
            rate_limit_burst: env_or("RATE_LIMIT_BURST", defaults.rate_limit_burst)?,

            // Cached views
            cache_ttl_seconds: env_or("CACHE_TTL_SECONDS", defaults.cache_ttl_seconds)?,
            cache_max_entries: env_or("CACHE_MAX_ENTRIES", defaults.cache_max_entries)?,

            // Alerting policy
            alert_coalesce_window_seconds: env_or(
                "ALERT_COALESCE_WINDOW_SECONDS",
                defaults.alert_coalesce_window_seconds,
            )?,
            alert_auto_resolve: env_or("ALERT_AUTO_RESOLVE", defaults.alert_auto_resolve)?,
            severity_medium_ratio: env_or("SEVERITY_MEDIUM_RATIO", defaults.severity_medium_ratio)?,
            severity_high_ratio: env_or("SEVERITY_HIGH_RATIO", defaults.severity_high_ratio)?,
            severity_critical_ratio: env_or(
                "SEVERITY_CRITICAL_RATIO",
                defaults.severity_critical_ratio,
            )?,
            critical_sensor_types,

            // Pagination
            default_page_size: env_or("DEFAULT_PAGE_SIZE", defaults.default_page_size)?,
            max_page_size: env_or("MAX_PAGE_SIZE", defaults.max_page_size)?,

            // Application metadata
            deployment: Deployment::from_str(
                &env::var("DEPLOYMENT").unwrap_or_else(|_| "local".to_string()),
            ),
        };

        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<(), ConfigError> {
        let bands = [
            self.severity_medium_ratio,
            self.severity_high_ratio,
            self.severity_critical_ratio,
        ];
        if bands.iter().any(|r| !r.is_finite() || *r < 0.0) || !bands.is_sorted_by(|a, b| a < b) {
            return Err(ConfigError::Invalid {
                key: "SEVERITY_*_RATIO",
                value: format!("{bands:?}"),
            });
        }
        if self.rate_limit_per_second == 0 || self.rate_limit_burst == 0 {
            return Err(ConfigError::Invalid {
                key: "RATE_LIMIT_*",
                value: format!("{}/s burst {}", self.rate_limit_per_second, self.rate_limit_burst),
            });
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(ConfigError::Invalid {
                key: "DEFAULT_PAGE_SIZE",
                value: self.default_page_size.to_string(),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }

    #[must_use]
    pub fn severity_policy(&self) -> SeverityPolicy {
        SeverityPolicy {
            medium_ratio: self.severity_medium_ratio,
            high_ratio: self.severity_high_ratio,
            critical_ratio: self.severity_critical_ratio,
            critical_types: self.critical_sensor_types.clone(),
        }
    }

    #[must_use]
    pub fn alert_policy(&self) -> AlertPolicy {
        AlertPolicy {
            severity: self.severity_policy(),
            coalesce_window: Duration::from_secs(self.alert_coalesce_window_seconds),
            auto_resolve: self.alert_auto_resolve,
        }
    }
}

fn parse_sensor_types(raw: &str) -> Result<Vec<SensorType>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<SensorType>().map_err(|_| ConfigError::Invalid {
                key: "CRITICAL_SENSOR_TYPES",
                value: s.to_string(),
            })
        })
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_critical_sensor_types() {
        assert_eq!(
            parse_sensor_types("motion, Pressure,").unwrap(),
            vec![SensorType::Motion, SensorType::Pressure]
        );
        assert!(parse_sensor_types("").unwrap().is_empty());
        assert!(parse_sensor_types("motion,sonar").is_err());
    }

    #[test]
    fn rejects_unordered_severity_bands() {
        let config = Config {
            severity_high_ratio: 0.05,
            ..Config::default()
        };
        assert!(config.check().is_err());
        assert!(Config::default().check().is_ok());
    }

    #[test]
    fn set_but_unparseable_values_are_errors() {
        assert_eq!(parse_or("API_PORT", None, 3000u16).unwrap(), 3000);
        assert_eq!(parse_or("API_PORT", Some("  ".into()), 3000u16).unwrap(), 3000);
        assert_eq!(parse_or("API_PORT", Some(" 8080 ".into()), 3000u16).unwrap(), 8080);

        let err = parse_or("API_PORT", Some("80a".into()), 3000u16).unwrap_err();
        let ConfigError::Invalid { key, value } = err;
        assert_eq!(key, "API_PORT");
        assert_eq!(value, "80a");

        assert!(parse_or("ALERT_AUTO_RESOLVE", Some("yes".into()), false).is_err());
    }
}
