//! Process-wide configuration loaded from the environment.
//!
//! Mirrors the shape of a typical auth/service config loader: every field
//! has an environment variable name, a parse step, and a sane default, with
//! genuinely required values failing fast at startup instead of at first use.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub server_host: String,
    pub server_port: u16,
    pub database_url: String,

    pub disable_rate_limit: bool,
    pub disable_cache: bool,
    pub cache_ttl: Duration,

    pub admin_api_key: Option<String>,

    pub auto_update_interval: Duration,
    pub auto_update_fail_threshold: i32,

    pub email_check_interval: Duration,
    pub email_max_per_run: usize,
    pub email_rate_limit_delay: Duration,

    pub fedex_client_id: Option<String>,
    pub fedex_client_secret: Option<String>,
    pub fedex_api_url: Option<String>,

    pub llm_enabled: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable {0} is required but was not set")]
    Missing(&'static str),
    #[error("environment variable {0} has an invalid value: {1}")]
    Invalid(&'static str, String),
}

fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "yes" | "on"))
        .unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_duration_secs(name: &str, default_secs: u64) -> Duration {
    Duration::from_secs(env_parse(name, default_secs))
}

impl TrackerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("DB_PATH"))
            .map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        Ok(Self {
            server_host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            server_port: env_parse("SERVER_PORT", 8080u16),
            database_url,

            disable_rate_limit: env_bool("DISABLE_RATE_LIMIT", false),
            disable_cache: env_bool("DISABLE_CACHE", false),
            cache_ttl: env_duration_secs("CACHE_TTL", 5 * 60),

            admin_api_key: std::env::var("ADMIN_API_KEY").ok(),

            auto_update_interval: env_duration_secs("AUTO_UPDATE_INTERVAL", 30 * 60),
            auto_update_fail_threshold: env_parse("AUTO_UPDATE_FAIL_THRESHOLD", 5i32),

            email_check_interval: env_duration_secs("EMAIL_CHECK_INTERVAL", 5 * 60),
            email_max_per_run: env_parse("EMAIL_MAX_PER_RUN", 50usize),
            email_rate_limit_delay: Duration::from_millis(env_parse(
                "EMAIL_RATE_LIMIT_DELAY",
                500u64,
            )),

            fedex_client_id: std::env::var("FEDEX_CLIENT_ID").ok(),
            fedex_client_secret: std::env::var("FEDEX_CLIENT_SECRET").ok(),
            fedex_api_url: std::env::var("FEDEX_API_URL").ok(),

            llm_enabled: env_bool("LLM_ENABLED", false),
        })
    }
}

/// Manual refresh minimum interval (base spec §4.4 step 4); not operator-tunable.
pub const MANUAL_REFRESH_MIN_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Context budget for a single manual refresh call (base spec §4.4 step 6).
pub const MANUAL_REFRESH_BUDGET: Duration = Duration::from_secs(120);
