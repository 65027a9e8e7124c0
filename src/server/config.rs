use std::{str::FromStr, time::Duration};

use crate::server::{
    error::{config::ConfigError, AppError},
    gateway::bucket::RateLimits,
    task::retry::RetryPolicy,
    verify::VerifySettings,
};

const DISCORD_API_URL: &str = "https://discord.com/api/v10";
const TORN_API_URL: &str = "https://api.torn.com";

pub struct Config {
    pub database_url: String,
    pub discord_bot_token: String,
    /// Shared store location; `None` runs with the in-process store.
    pub redis_url: Option<String>,

    pub discord_api_url: String,
    pub torn_api_url: String,

    pub log_level: String,
    pub worker_count: usize,

    pub limits: RateLimits,
    pub retry: RetryPolicy,
    pub verify: VerifySettings,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Self::from_lookup(|name| std::env::var(name).ok())?)
    }

    /// Builds the configuration from an arbitrary variable source.
    ///
    /// # Arguments
    /// - `lookup` - Returns the raw value of a variable, or `None` when unset
    ///
    /// # Returns
    /// - `Ok(Config)` - All required variables present and all values parsed
    /// - `Err(ConfigError::MissingEnvVar)` - A required variable is unset
    /// - `Err(ConfigError::InvalidEnvVar)` - A variable could not be parsed
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        Ok(Self {
            database_url: env.required("DATABASE_URL")?,
            discord_bot_token: env.required("DISCORD_BOT_TOKEN")?,
            redis_url: env.lookup("REDIS_URL"),
            discord_api_url: env
                .lookup("DISCORD_API_URL")
                .unwrap_or_else(|| DISCORD_API_URL.to_string()),
            torn_api_url: env
                .lookup("TORN_API_URL")
                .unwrap_or_else(|| TORN_API_URL.to_string()),
            log_level: env.lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            worker_count: env.parse("WORKER_COUNT", 4)?,
            limits: RateLimits {
                discord_global_per_second: env.parse("DISCORD_GLOBAL_LIMIT", 50)?,
                torn_key_limit: env.parse("TORN_KEY_LIMIT", 50)?,
                torn_window: Duration::from_secs(60),
            },
            retry: RetryPolicy {
                max_attempts: env.parse("RETRY_MAX_ATTEMPTS", 5)?,
                free_rate_limit_waits: env.parse("RETRY_FREE_RATE_LIMIT_WAITS", 3)?,
                max_countdown: Duration::from_secs(env.parse("RETRY_MAX_COUNTDOWN", 120)?),
            },
            verify: VerifySettings {
                page_size_per_key: env.parse("VERIFY_PAGE_SIZE_PER_KEY", 15)?,
                convergence: env.parse("VERIFY_CONVERGENCE", 0.99)?,
                max_pages: env.parse("VERIFY_MAX_PAGES", 50)?,
                lock_ttl: Duration::from_secs(env.parse("VERIFY_LOCK_TTL", 600)?),
                page_delay: Duration::from_secs(env.parse("VERIFY_PAGE_DELAY", 60)?),
            },
        })
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Unset and blank values are treated the same.
    fn lookup(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, name: &str) -> Result<String, ConfigError> {
        self.lookup(name)
            .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
    }

    fn parse<T: FromStr>(&self, name: &str, default: T) -> Result<T, ConfigError> {
        match self.lookup(name) {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidEnvVar {
                    name: name.to_string(),
                    value,
                }),
            None => Ok(default),
        }
    }
}
