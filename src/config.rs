use std::{env, fmt::Display, str::FromStr, time::Duration};

use tracing::{info, warn};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid {key} value: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvMode {
    Development,
    Production,
}

/// Where records and accounts live.
#[derive(Debug, Clone, PartialEq)]
pub enum Backend {
    Memory,
    Hosted { url: String, anon_key: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub env_mode: EnvMode,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_issuer: Option<String>,
    pub jwt_audience: Option<String>,
    pub backend: Backend,
    pub allowed_origins: Vec<String>,
    pub rate_limit_per_second: u32,
    pub rate_limit_burst: u32,
    pub dev_admin: Option<(String, String)>,
}

const DEV_ORIGINS: [&str; 2] = ["http://localhost:3000", "http://127.0.0.1:3000"];

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let env_mode = match get("RUST_ENV").as_deref() {
            Some("production") => EnvMode::Production,
            _ => EnvMode::Development,
        };
        let production = env_mode == EnvMode::Production;

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let backend = match (get("SUPABASE_URL"), get("SUPABASE_ANON_KEY")) {
            (Some(raw_url), Some(anon_key)) => {
                let parsed = url::Url::parse(&raw_url).map_err(|e| ConfigError::Invalid {
                    key: "SUPABASE_URL",
                    reason: e.to_string(),
                })?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(ConfigError::Invalid {
                        key: "SUPABASE_URL",
                        reason: format!("unsupported scheme {}", parsed.scheme()),
                    });
                }
                Backend::Hosted { url: raw_url.trim_end_matches('/').to_string(), anon_key }
            }
            (None, _) if production => return Err(ConfigError::Missing("SUPABASE_URL")),
            (_, None) if production => return Err(ConfigError::Missing("SUPABASE_ANON_KEY")),
            _ => {
                warn!("SUPABASE_URL/SUPABASE_ANON_KEY not set, using in-memory backend");
                Backend::Memory
            }
        };

        let mut allowed_origins: Vec<String> = get("ALLOWED_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if allowed_origins.is_empty() {
            if production {
                return Err(ConfigError::Missing("ALLOWED_ORIGINS"));
            }
            allowed_origins = DEV_ORIGINS.iter().map(|s| s.to_string()).collect();
        }

        let dev_admin = match (get("DEV_ADMIN_EMAIL"), get("DEV_ADMIN_PASSWORD")) {
            (Some(_), Some(password)) if password == "password" => {
                warn!("Default DEV_ADMIN_PASSWORD is not allowed, skipping admin seed");
                None
            }
            (Some(email), Some(password)) => Some((email, password)),
            _ => None,
        };

        let rate_limit_per_second: u32 = try_load(&get, "RATE_LIMIT_PER_SECOND", "1200")?;
        if rate_limit_per_second == 0 {
            return Err(ConfigError::Invalid {
                key: "RATE_LIMIT_PER_SECOND",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            env_mode,
            port: try_load(&get, "PORT", "8080")?,
            jwt_secret,
            jwt_issuer: get("JWT_ISSUER"),
            jwt_audience: get("JWT_AUDIENCE"),
            backend,
            allowed_origins,
            rate_limit_per_second,
            rate_limit_burst: try_load(&get, "RATE_LIMIT_BURST", "2400")?,
            dev_admin,
        })
    }

    pub fn is_production(&self) -> bool {
        self.env_mode == EnvMode::Production
    }

    /// Time for one request slot to refill, from the per-second rate.
    pub fn rate_limit_period(&self) -> Duration {
        Duration::from_secs(1) / self.rate_limit_per_second.max(1)
    }

    /// Minimal development config over the in-memory backend.
    pub fn for_memory(jwt_secret: &str) -> Self {
        Self {
            env_mode: EnvMode::Development,
            port: 0,
            jwt_secret: jwt_secret.to_string(),
            jwt_issuer: None,
            jwt_audience: None,
            backend: Backend::Memory,
            allowed_origins: DEV_ORIGINS.iter().map(|s| s.to_string()).collect(),
            rate_limit_per_second: 1200,
            rate_limit_burst: 2400,
            dev_admin: None,
        }
    }
}

fn try_load<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: &str,
) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    get(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid { key, reason: e.to_string() })
}
