/*
 * Responsibility
 * - Load settings from the environment (.env honoured via dotenvy)
 * - Validate them (missing or invalid required values fail startup)
 */
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use url::Url;

use crate::services::auth::RoleClaimPath;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn parse(value: Option<&str>) -> Self {
        match value
            .unwrap_or("development")
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Who may call the mission routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRules {
    pub read_roles: Vec<String>,
    pub write_roles: Vec<String>,
    pub public_read: bool,
}

impl Default for AccessRules {
    fn default() -> Self {
        Self {
            read_roles: vec![
                "user".to_string(),
                "default-roles-open-mission-control".to_string(),
            ],
            write_roles: vec!["admin".to_string()],
            public_read: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpLimits {
    pub request_timeout: Duration,
    pub body_limit_bytes: usize,
}

impl Default for HttpLimits {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            body_limit_bytes: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    pub auth_issuer: String,
    pub auth_audience: String,
    pub access_token_leeway_seconds: u64,
    pub roles_claim: RoleClaimPath,

    pub discovery_timeout: Duration,
    pub refresh_backoff: Duration,
    pub refresh_backoff_max: Duration,
    pub refresh_min_interval: Duration,

    pub access: AccessRules,
    pub http: HttpLimits,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source. `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let number = |key: &str, default: u64| -> u64 {
            lookup(key)
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(default)
        };
        let required = |key: &'static str| -> Result<String, ConfigError> {
            lookup(key)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let port: u16 = lookup("PORT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(8080);
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        let app_env = AppEnv::parse(lookup("APP_ENV").as_deref());

        let auth_issuer = required("AUTH_ISSUER")?;
        Url::parse(&auth_issuer).map_err(|_| ConfigError::Invalid("AUTH_ISSUER"))?;

        let auth_audience = required("AUTH_AUDIENCE")?;

        let access_token_leeway_seconds = number("ACCESS_TOKEN_LEEWAY_SECONDS", 0);

        let roles_claim = match lookup("AUTH_ROLES_CLAIM") {
            Some(path) => {
                RoleClaimPath::parse(&path).ok_or(ConfigError::Invalid("AUTH_ROLES_CLAIM"))?
            }
            None => RoleClaimPath::default(),
        };

        let discovery_timeout = Duration::from_secs(number("DISCOVERY_TIMEOUT_SECONDS", 10));
        let refresh_backoff = Duration::from_secs(number("JWKS_REFRESH_BACKOFF_SECONDS", 1));
        let refresh_backoff_max =
            Duration::from_secs(number("JWKS_REFRESH_BACKOFF_MAX_SECONDS", 60)).max(refresh_backoff);
        let refresh_min_interval =
            Duration::from_secs(number("JWKS_MIN_REFRESH_INTERVAL_SECONDS", 10));

        let defaults = AccessRules::default();
        let access = AccessRules {
            read_roles: lookup("MISSIONS_READ_ROLES")
                .map(|s| role_list(&s))
                .unwrap_or(defaults.read_roles),
            write_roles: lookup("MISSIONS_WRITE_ROLES")
                .map(|s| role_list(&s))
                .unwrap_or(defaults.write_roles),
            public_read: lookup("MISSIONS_PUBLIC_READ")
                .map(|s| flag(&s))
                .unwrap_or(defaults.public_read),
        };

        let limits = HttpLimits::default();
        let http = HttpLimits {
            request_timeout: Duration::from_secs(number(
                "REQUEST_TIMEOUT_SECONDS",
                limits.request_timeout.as_secs(),
            )),
            body_limit_bytes: lookup("BODY_LIMIT_BYTES")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(limits.body_limit_bytes),
        };

        Ok(Self {
            addr,
            app_env,
            auth_issuer,
            auth_audience,
            access_token_leeway_seconds,
            roles_claim,
            discovery_timeout,
            refresh_backoff,
            refresh_backoff_max,
            refresh_min_interval,
            access,
            http,
        })
    }
}

fn role_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
