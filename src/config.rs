use chrono::format::{Item, StrftimeItems};
use chrono::FixedOffset;
use std::env;
use std::time::Duration;

use crate::dashboard::DisplayFormat;

pub const DEFAULT_DISPLAY_TIME_FORMAT: &str = "%-m/%-d/%Y, %-I:%M:%S %p";

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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    #[must_use]
    pub fn from_str(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Backend API
    pub backend_base_url: String,
    pub backend_timeout_seconds: u64,
    pub directory_page_size: u32,

    // Dashboard aggregation
    pub latest_reading_concurrency: usize,
    pub dashboard_alert_limit: u32,
    pub dashboard_concurrent_limit: usize,

    // Caching
    pub directory_cache_ttl_seconds: u64,

    // Timestamp display
    pub display_time_format: String,
    pub display_utc_offset_minutes: i32,

    // API settings
    pub api_host: String,
    pub api_port: u16,

    // Rate limiting
    pub disable_rate_limiting: bool,
    /// Sustained requests per second per client, after the burst is spent
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
    pub trust_proxy_headers: bool,

    // Application metadata
    pub log_format: LogFormat,
    pub deployment: Deployment,
}

impl Config {
    /// Configuration with defaults for everything but the backend location.
    pub fn with_backend(backend_base_url: impl Into<String>) -> Self {
        Self {
            backend_base_url: backend_base_url.into().trim_end_matches('/').to_string(),
            backend_timeout_seconds: 30,
            directory_page_size: 100,
            latest_reading_concurrency: 8,
            dashboard_alert_limit: 5,
            dashboard_concurrent_limit: 16,
            directory_cache_ttl_seconds: 30,
            display_time_format: DEFAULT_DISPLAY_TIME_FORMAT.to_string(),
            display_utc_offset_minutes: 0,
            api_host: "0.0.0.0".to_string(),
            api_port: 3000,
            disable_rate_limiting: false,
            rate_limit_per_second: 10,
            rate_limit_burst: 60,
            trust_proxy_headers: false,
            log_format: LogFormat::Text,
            deployment: Deployment::Local,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `BACKEND_BASE_URL` is not set, and
    /// `ConfigError::Invalid` if the display settings cannot be used.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Self::with_backend(
            env::var("BACKEND_BASE_URL").map_err(|_| ConfigError::Missing("BACKEND_BASE_URL"))?,
        );

        let config = Self {
            backend_timeout_seconds: parse_var(
                "BACKEND_TIMEOUT_SECONDS",
                defaults.backend_timeout_seconds,
            ),
            directory_page_size: parse_var("DIRECTORY_PAGE_SIZE", defaults.directory_page_size),

            latest_reading_concurrency: parse_var(
                "LATEST_READING_CONCURRENCY",
                defaults.latest_reading_concurrency,
            )
            .max(1),
            dashboard_alert_limit: parse_var(
                "DASHBOARD_ALERT_LIMIT",
                defaults.dashboard_alert_limit,
            ),
            dashboard_concurrent_limit: parse_var(
                "DASHBOARD_CONCURRENT_LIMIT",
                defaults.dashboard_concurrent_limit,
            )
            .max(1),

            directory_cache_ttl_seconds: parse_var(
                "DIRECTORY_CACHE_TTL_SECONDS",
                defaults.directory_cache_ttl_seconds,
            ),

            display_time_format: env::var("DISPLAY_TIME_FORMAT")
                .unwrap_or_else(|_| DEFAULT_DISPLAY_TIME_FORMAT.to_string()),
            display_utc_offset_minutes: parse_var(
                "DISPLAY_UTC_OFFSET_MINUTES",
                defaults.display_utc_offset_minutes,
            ),

            api_host: env::var("API_HOST").unwrap_or_else(|_| defaults.api_host.clone()),
            api_port: parse_var("API_PORT", defaults.api_port),

            disable_rate_limiting: parse_var("DISABLE_RATE_LIMITING", false),
            rate_limit_per_second: parse_var(
                "RATE_LIMIT_PER_SECOND",
                defaults.rate_limit_per_second,
            ),
            rate_limit_burst: parse_var("RATE_LIMIT_BURST", defaults.rate_limit_burst),
            trust_proxy_headers: parse_var("TRUST_PROXY_HEADERS", false),

            log_format: LogFormat::from_str(
                &env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string()),
            ),
            deployment: Deployment::from_str(
                &env::var("DEPLOYMENT").unwrap_or_else(|_| "local".to_string()),
            ),
            ..defaults
        };

        config.display_format()?;
        Ok(config)
    }

    /// Build the timestamp display settings used by the series normalizer.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for an unusable strftime pattern or an
    /// offset outside +/- 24 hours.
    pub fn display_format(&self) -> Result<DisplayFormat, ConfigError> {
        if StrftimeItems::new(&self.display_time_format).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigError::Invalid(
                "DISPLAY_TIME_FORMAT",
                self.display_time_format.clone(),
            ));
        }

        let offset = self
            .display_utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                ConfigError::Invalid(
                    "DISPLAY_UTC_OFFSET_MINUTES",
                    self.display_utc_offset_minutes.to_string(),
                )
            })?;

        Ok(DisplayFormat::new(self.display_time_format.clone(), offset))
    }

    /// Time for one rate-limit slot to come back, or `None` when the rate
    /// cannot be expressed (zero, or faster than one per nanosecond).
    pub fn rate_limit_interval(&self) -> Option<Duration> {
        1_000_000_000_u64
            .checked_div(self.rate_limit_per_second)
            .filter(|nanos| *nanos > 0)
            .map(Duration::from_nanos)
    }

    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_backend_strips_trailing_slash() {
        let cfg = Config::with_backend("http://localhost:8000/");
        assert_eq!(cfg.backend_base_url, "http://localhost:8000");
        assert_eq!(cfg.latest_reading_concurrency, 8);
        assert_eq!(cfg.bind_address(), "0.0.0.0:3000");
    }

    #[test]
    fn rejects_broken_time_format() {
        let mut cfg = Config::with_backend("http://localhost:8000");
        cfg.display_time_format = "%Y-%!".to_string();
        assert!(matches!(
            cfg.display_format(),
            Err(ConfigError::Invalid("DISPLAY_TIME_FORMAT", _))
        ));
    }

    #[test]
    fn rejects_out_of_range_offset() {
        let mut cfg = Config::with_backend("http://localhost:8000");
        cfg.display_utc_offset_minutes = 24 * 60;
        assert!(cfg.display_format().is_err());

        cfg.display_utc_offset_minutes = -300;
        assert!(cfg.display_format().is_ok());
    }

    #[test]
    fn rate_limit_interval_is_per_request() {
        let mut cfg = Config::with_backend("http://localhost:8000");
        assert_eq!(cfg.rate_limit_interval(), Some(Duration::from_millis(100)));

        cfg.rate_limit_per_second = 1;
        assert_eq!(cfg.rate_limit_interval(), Some(Duration::from_secs(1)));

        cfg.rate_limit_per_second = 0;
        assert_eq!(cfg.rate_limit_interval(), None);
    }

    #[test]
    fn deployment_aliases() {
        assert_eq!(Deployment::from_str("Production"), Deployment::Prod);
        assert_eq!(Deployment::from_str("staging"), Deployment::Stage);
        assert_eq!(Deployment::from_str("anything"), Deployment::Local);
        assert_eq!(LogFormat::from_str("JSON"), LogFormat::Json);
    }
}
