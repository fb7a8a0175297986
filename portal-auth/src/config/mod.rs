use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use service_core::middleware::rate_limit::RateLimitPolicy;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct PortalConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    /// Origin of the portal front end; emailed links open its pages.
    pub public_base_url: String,
    pub database: DatabaseConfig,
    pub smtp: Option<SmtpConfig>,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitConfig,
    pub sweeper: SweeperConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    pub admin_api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub auth_attempts: u32,
    pub auth_window_seconds: u64,
    pub api_limit: u32,
    pub api_window_seconds: u64,
}

impl RateLimitConfig {
    pub fn auth_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::new(self.auth_attempts, self.auth_window_seconds)
    }

    pub fn api_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::new(self.api_limit, self.api_window_seconds)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            auth_attempts: RateLimitPolicy::AUTH.attempts,
            auth_window_seconds: RateLimitPolicy::AUTH.window_seconds,
            api_limit: RateLimitPolicy::API.attempts,
            api_window_seconds: RateLimitPolicy::API.window_seconds,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SweeperConfig {
    pub interval_seconds: u64,
}

impl PortalConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        // SMTP is optional: without a host, mail goes to the in-process outbox.
        let smtp = match env::var("SMTP_HOST") {
            Ok(host) => Some(SmtpConfig {
                host,
                port: parse_env("SMTP_PORT", Some("587"), is_prod)?,
                username: get_env("SMTP_USERNAME", None, is_prod)?,
                password: get_env("SMTP_PASSWORD", None, is_prod)?,
                from_address: get_env("SMTP_FROM_ADDRESS", None, is_prod)?,
            }),
            Err(_) if is_prod => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "SMTP_HOST is required in production but not set"
                )))
            }
            Err(_) => None,
        };

        let config = PortalConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("portal-auth"), is_prod)?,
            service_version: get_env(
                "SERVICE_VERSION",
                Some(env!("CARGO_PKG_VERSION")),
                is_prod,
            )?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .ok()
                .filter(|s| !s.is_empty()),
            public_base_url: get_env("PUBLIC_BASE_URL", Some("http://localhost:3000"), is_prod)?,
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", Some("10"), is_prod)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", Some("1"), is_prod)?,
            },
            smtp,
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
                admin_api_key: get_env("ADMIN_API_KEY", None, true)?,
            },
            rate_limit: RateLimitConfig {
                auth_attempts: parse_env("RATE_LIMIT_AUTH_ATTEMPTS", Some("5"), is_prod)?,
                auth_window_seconds: parse_env(
                    "RATE_LIMIT_AUTH_WINDOW_SECONDS",
                    Some("60"),
                    is_prod,
                )?,
                api_limit: parse_env("RATE_LIMIT_API_LIMIT", Some("60"), is_prod)?,
                api_window_seconds: parse_env(
                    "RATE_LIMIT_API_WINDOW_SECONDS",
                    Some("60"),
                    is_prod,
                )?,
            },
            sweeper: SweeperConfig {
                interval_seconds: parse_env(
                    "TOKEN_SWEEP_INTERVAL_SECONDS",
                    Some("3600"),
                    is_prod,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.sweeper.interval_seconds == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "TOKEN_SWEEP_INTERVAL_SECONDS must be greater than 0"
            )));
        }

        if self.rate_limit.auth_attempts == 0 || self.rate_limit.api_limit == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Rate limits must be greater than 0"
            )));
        }

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }

            if !self.public_base_url.starts_with("https://") {
                tracing::warn!(
                    public_base_url = %self.public_base_url,
                    "Emailed links are not served over HTTPS in production"
                );
            }
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: Option<&str>, is_prod: bool) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, default, is_prod)?
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{}: {}", key, e)))
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
