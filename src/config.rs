use std::{env, fmt, sync::Arc};

use chrono::Duration;
use derive_more::{Display, Error};
use dotenv::dotenv;

const MIN_SECRET_LEN: usize = 32;
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 48;
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;

#[derive(Debug, Display, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[display(fmt = "environment variable '{}' must be set", _0)]
    Missing(#[error(not(source))] &'static str),

    #[display(fmt = "environment variable '{}' has an invalid value", _0)]
    Invalid(#[error(not(source))] &'static str),

    #[display(fmt = "JWT_SECRET must be at least {} bytes long", MIN_SECRET_LEN)]
    WeakSecret,
}

/// HMAC key used to sign identity tokens. Built once at startup and shared
/// behind an `Arc`; there is no way to mutate it afterwards.
#[derive(Clone)]
pub struct JwtSecret(Arc<[u8]>);

impl JwtSecret {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, ConfigError> {
        let bytes = secret.as_ref();
        if bytes.len() < MIN_SECRET_LEN {
            return Err(ConfigError::WeakSecret);
        }
        Ok(Self(Arc::from(bytes)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for JwtSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JwtSecret(<redacted>)")
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub bind_addr: String,
    pub max_connections: u32,
    pub jwt_secret: JwtSecret,
    pub token_ttl: Duration,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let jwt_secret = JwtSecret::new(lookup("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?)?;
        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(v) => v.parse::<u32>().map_err(|_| ConfigError::Invalid("DB_MAX_CONNECTIONS"))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };
        let ttl_hours = match lookup("TOKEN_TTL_HOURS") {
            Some(v) => match v.parse::<i64>() {
                Ok(h) if (1..=MAX_TOKEN_TTL_HOURS).contains(&h) => h,
                _ => return Err(ConfigError::Invalid("TOKEN_TTL_HOURS")),
            },
            None => DEFAULT_TOKEN_TTL_HOURS,
        };
        Ok(Self {
            database_url,
            bind_addr,
            max_connections,
            jwt_secret,
            token_ttl: Duration::hours(ttl_hours),
        })
    }
}
