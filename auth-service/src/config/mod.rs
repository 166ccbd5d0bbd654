use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub security: SecurityConfig,
    pub session: SessionConfig,
    pub rate_limit: RateLimitConfig,
    pub bootstrap: BootstrapConfig,
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
    pub acquire_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
    pub max_lifetime_seconds: u64,
}

/// Signing material for the two trust domains. The secrets are independent
/// values and are never derived from one another.
#[derive(Clone, Deserialize)]
pub struct JwtConfig {
    pub user_secret: String,
    pub service_secret: String,
    pub user_issuer: String,
    pub service_issuer: String,
    pub user_token_ttl_hours: i64,
    pub service_token_ttl_hours: i64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("user_secret", &"<redacted>")
            .field("service_secret", &"<redacted>")
            .field("user_issuer", &self.user_issuer)
            .field("service_issuer", &self.service_issuer)
            .field("user_token_ttl_hours", &self.user_token_ttl_hours)
            .field("service_token_ttl_hours", &self.service_token_ttl_hours)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    /// Read the client address from `X-Forwarded-For`. Only safe behind a
    /// proxy that overwrites the header.
    pub trust_forwarded_for: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub cookie_max_age_seconds: i64,
    pub secure_cookie: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_seconds: u64,
}

/// Optional default super admin created at startup when absent.
#[derive(Clone, Deserialize)]
pub struct BootstrapConfig {
    pub admin_username: String,
    pub admin_email: String,
    pub admin_password: Option<String>,
}

impl std::fmt::Debug for BootstrapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapConfig")
            .field("admin_username", &self.admin_username)
            .field("admin_email", &self.admin_email)
            .field("admin_password", &self.admin_password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

pub const DEFAULT_USER_ISSUER: &str = "auth-service";
pub const DEFAULT_SERVICE_ISSUER: &str = "auth-service-internal";
const MIN_PROD_SECRET_LEN: usize = 32;

impl AuthConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = AuthConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("auth-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "20", is_prod)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", "2", is_prod)?,
                acquire_timeout_seconds: parse_env(
                    "DATABASE_ACQUIRE_TIMEOUT_SECONDS",
                    "5",
                    is_prod,
                )?,
                idle_timeout_seconds: parse_env("DATABASE_IDLE_TIMEOUT_SECONDS", "600", is_prod)?,
                max_lifetime_seconds: parse_env(
                    "DATABASE_MAX_LIFETIME_SECONDS",
                    "1800",
                    is_prod,
                )?,
            },
            jwt: JwtConfig {
                user_secret: get_env("USER_TOKEN_SECRET", None, is_prod)?,
                service_secret: get_env("SERVICE_TOKEN_SECRET", None, is_prod)?,
                user_issuer: get_env("USER_TOKEN_ISSUER", Some(DEFAULT_USER_ISSUER), is_prod)?,
                service_issuer: get_env(
                    "SERVICE_TOKEN_ISSUER",
                    Some(DEFAULT_SERVICE_ISSUER),
                    is_prod,
                )?,
                user_token_ttl_hours: parse_env("USER_TOKEN_TTL_HOURS", "168", is_prod)?,
                service_token_ttl_hours: parse_env("SERVICE_TOKEN_TTL_HOURS", "24", is_prod)?,
            },
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
                // optional in every environment, off unless set
                trust_forwarded_for: parse_env("TRUST_FORWARDED_FOR", "false", false)?,
            },
            session: SessionConfig {
                cookie_name: get_env("SESSION_COOKIE_NAME", Some("access_token"), is_prod)?,
                cookie_max_age_seconds: parse_env(
                    "SESSION_COOKIE_MAX_AGE_SECONDS",
                    "604800",
                    is_prod,
                )?,
                secure_cookie: is_prod,
            },
            rate_limit: RateLimitConfig {
                login_attempts: parse_env("LOGIN_RATE_LIMIT_ATTEMPTS", "10", is_prod)?,
                login_window_seconds: parse_env("LOGIN_RATE_LIMIT_WINDOW_SECONDS", "60", is_prod)?,
            },
            bootstrap: BootstrapConfig {
                admin_username: env::var("BOOTSTRAP_ADMIN_USERNAME")
                    .unwrap_or_else(|_| "admin".to_string()),
                admin_email: env::var("BOOTSTRAP_ADMIN_EMAIL")
                    .unwrap_or_else(|_| "admin@localhost".to_string()),
                admin_password: env::var("BOOTSTRAP_ADMIN_PASSWORD")
                    .ok()
                    .filter(|s| !s.is_empty()),
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

        if self.jwt.user_token_ttl_hours <= 0 || self.jwt.service_token_ttl_hours <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Token TTLs must be positive"
            )));
        }

        if self.jwt.user_secret.is_empty() || self.jwt.service_secret.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "USER_TOKEN_SECRET and SERVICE_TOKEN_SECRET must be set"
            )));
        }

        if self.jwt.user_issuer == self.jwt.service_issuer {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "User and service token issuers must differ"
            )));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DATABASE_MIN_CONNECTIONS exceeds DATABASE_MAX_CONNECTIONS"
            )));
        }

        if self.jwt.user_secret == self.jwt.service_secret {
            tracing::warn!("User and service token secrets are identical; rotate one of them");
        }

        // In production, ensure stricter validation
        if self.environment == Environment::Prod {
            if self.jwt.user_secret.len() < MIN_PROD_SECRET_LEN
                || self.jwt.service_secret.len() < MIN_PROD_SECRET_LEN
            {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Token secrets must be at least {} bytes in production",
                    MIN_PROD_SECRET_LEN
                )));
            }

            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
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
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{}: {}", key, e)))
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl AuthConfig {
    /// Settings for tests and local tooling that never touch the environment.
    pub fn for_tests() -> Self {
        AuthConfig {
            common: core_config::Config::default(),
            environment: Environment::Dev,
            service_name: "auth-service".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "error".to_string(),
            otlp_endpoint: None,
            database: DatabaseConfig {
                url: "postgres://localhost/auth_test".to_string(),
                max_connections: 5,
                min_connections: 1,
                acquire_timeout_seconds: 5,
                idle_timeout_seconds: 60,
                max_lifetime_seconds: 300,
            },
            jwt: JwtConfig {
                user_secret: "user-domain-test-secret-0123456789abcdef".to_string(),
                service_secret: "service-domain-test-secret-fedcba9876543210".to_string(),
                user_issuer: DEFAULT_USER_ISSUER.to_string(),
                service_issuer: DEFAULT_SERVICE_ISSUER.to_string(),
                user_token_ttl_hours: 168,
                service_token_ttl_hours: 24,
            },
            security: SecurityConfig {
                allowed_origins: vec!["http://localhost:3000".to_string()],
                trust_forwarded_for: false,
            },
            session: SessionConfig {
                cookie_name: "access_token".to_string(),
                cookie_max_age_seconds: 604_800,
                secure_cookie: false,
            },
            rate_limit: RateLimitConfig {
                login_attempts: 1_000,
                login_window_seconds: 60,
            },
            bootstrap: BootstrapConfig {
                admin_username: "admin".to_string(),
                admin_email: "admin@localhost".to_string(),
                admin_password: None,
            },
        }
    }
}
