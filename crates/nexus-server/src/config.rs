//! Server configuration for Nexus.
//!
//! Settings come from environment variables, with a `.env` file in the
//! working directory loaded first when present. The deployment keys are
//! parsed here, so a missing or malformed key stops startup before the
//! listener binds.
//!
//! Environment variables:
//! - `ENCRYPTION_KEY`: 44-character base64url AES-256 key (required)
//! - `SECRET_KEY`: session signing secret, at least 32 bytes (required)
//! - `NEXUS_STORAGE`: `postgres` or `memory` (default: `postgres`)
//! - `DATABASE_URL`: PostgreSQL connection string (required for `postgres`)
//! - `NEXUS_BIND_ADDR`: full bind address (overrides `PORT`, default: `127.0.0.1:8000`)
//! - `PORT`: port to bind on `0.0.0.0`
//! - `NEXUS_LOG_LEVEL`: log filter (default: `info`, `RUST_LOG` wins)
//! - `NEXUS_TOKEN_TTL_MINUTES`: standard session lifetime (default: `1440`)
//! - `NEXUS_REMEMBER_TTL_DAYS`: "remember me" session lifetime (default: `7`)
//! - `NEXUS_CORS_ORIGINS`: comma-separated origins or `*` (default: `*`)
//! - `NEXUS_DISABLE_MLOCK`: skip `mlockall` for dev environments (default: `false`)

use std::net::SocketAddr;

use axum::http::HeaderValue;
use chrono::Duration;
use nexus_core::{SecretCipher, SessionKeys, TokenPolicy};

const DEFAULT_PORT: u16 = 8000;
const MIN_SECRET_KEY_LEN: usize = 32;
/// Upper bound for either session lifetime: one year.
const MAX_TTL_DAYS: i64 = 365;
const MAX_TTL_MINUTES: i64 = MAX_TTL_DAYS * 24 * 60;

/// Configuration errors. Each names the offending variable.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is not set")]
    Missing { var: &'static str },

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Which store backs the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageKind {
    /// In-memory (development only, data lost on restart).
    Memory,
    /// PostgreSQL.
    Postgres { url: String },
}

/// Origins allowed by CORS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<HeaderValue>),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub storage: StorageKind,
    pub log_level: String,
    pub cors_origins: AllowedOrigins,
    /// Whether to skip `mlock` (for development without root/`CAP_IPC_LOCK`).
    pub disable_mlock: bool,
    pub cipher: SecretCipher,
    pub sessions: SessionKeys,
}

impl ServerConfig {
    /// Load configuration from `.env` and the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a required variable is missing or any
    /// variable fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is normal in containers.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a required variable is missing or any
    /// variable fails to parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        // Priority: NEXUS_BIND_ADDR > PORT > 127.0.0.1:8000
        let bind_addr = if let Some(addr) = var("NEXUS_BIND_ADDR") {
            addr.parse().map_err(|_| ConfigError::Invalid {
                var: "NEXUS_BIND_ADDR",
                reason: format!("'{addr}' is not a socket address"),
            })?
        } else if let Some(port) = var("PORT") {
            let port: u16 = parse_number("PORT", &port)?;
            SocketAddr::from(([0, 0, 0, 0], port))
        } else {
            SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT))
        };

        let storage = match var("NEXUS_STORAGE")
            .unwrap_or_else(|| "postgres".to_owned())
            .to_lowercase()
            .as_str()
        {
            "memory" => StorageKind::Memory,
            "postgres" | "postgresql" => StorageKind::Postgres {
                url: var("DATABASE_URL").ok_or(ConfigError::Missing {
                    var: "DATABASE_URL",
                })?,
            },
            other => {
                return Err(ConfigError::Invalid {
                    var: "NEXUS_STORAGE",
                    reason: format!("unknown backend '{other}', expected postgres or memory"),
                });
            }
        };

        let cipher = var("ENCRYPTION_KEY")
            .ok_or(ConfigError::Missing {
                var: "ENCRYPTION_KEY",
            })
            .and_then(|key| {
                SecretCipher::from_base64_key(&key).map_err(|e| ConfigError::Invalid {
                    var: "ENCRYPTION_KEY",
                    reason: e.to_string(),
                })
            })?;

        let secret_key = var("SECRET_KEY").ok_or(ConfigError::Missing { var: "SECRET_KEY" })?;
        if secret_key.len() < MIN_SECRET_KEY_LEN {
            return Err(ConfigError::Invalid {
                var: "SECRET_KEY",
                reason: format!("must be at least {MIN_SECRET_KEY_LEN} bytes"),
            });
        }

        let defaults = TokenPolicy::default();
        let standard = match var("NEXUS_TOKEN_TTL_MINUTES") {
            Some(v) => {
                let minutes = parse_bounded("NEXUS_TOKEN_TTL_MINUTES", &v, MAX_TTL_MINUTES)?;
                Duration::try_minutes(minutes).ok_or(ConfigError::Invalid {
                    var: "NEXUS_TOKEN_TTL_MINUTES",
                    reason: "out of range".to_owned(),
                })?
            }
            None => defaults.standard,
        };
        let extended = match var("NEXUS_REMEMBER_TTL_DAYS") {
            Some(v) => {
                let days = parse_bounded("NEXUS_REMEMBER_TTL_DAYS", &v, MAX_TTL_DAYS)?;
                Duration::try_days(days).ok_or(ConfigError::Invalid {
                    var: "NEXUS_REMEMBER_TTL_DAYS",
                    reason: "out of range".to_owned(),
                })?
            }
            None => defaults.extended,
        };
        let sessions = SessionKeys::new(secret_key.as_bytes(), TokenPolicy { standard, extended });

        let cors_origins = parse_origins(&var("NEXUS_CORS_ORIGINS").unwrap_or_else(|| "*".to_owned()))?;

        let log_level = var("NEXUS_LOG_LEVEL").unwrap_or_else(|| "info".to_owned());

        let disable_mlock = var("NEXUS_DISABLE_MLOCK")
            .is_some_and(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"));

        Ok(Self {
            bind_addr,
            storage,
            log_level,
            cors_origins,
            disable_mlock,
            cipher,
            sessions,
        })
    }
}

fn parse_number<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        reason: format!("'{value}' is not a number"),
    })
}

/// Parse an integer in `1..=max`.
fn parse_bounded(var: &'static str, value: &str, max: i64) -> Result<i64, ConfigError> {
    let n: i64 = parse_number(var, value)?;
    if n <= 0 {
        return Err(ConfigError::Invalid {
            var,
            reason: "must be greater than zero".to_owned(),
        });
    }
    if n > max {
        return Err(ConfigError::Invalid {
            var,
            reason: format!("must be at most {max}"),
        });
    }
    Ok(n)
}

fn parse_origins(raw: &str) -> Result<AllowedOrigins, ConfigError> {
    if raw.trim() == "*" {
        return Ok(AllowedOrigins::Any);
    }
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(|o| {
            HeaderValue::from_str(o).map_err(|_| ConfigError::Invalid {
                var: "NEXUS_CORS_ORIGINS",
                reason: format!("'{o}' is not a valid origin"),
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(AllowedOrigins::List)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const KEY: &str = "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8=";
    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn load(pairs: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        ServerConfig::from_lookup(|k| env.get(k).cloned())
    }

    fn minimal() -> Vec<(&'static str, &'static str)> {
        vec![
            ("ENCRYPTION_KEY", KEY),
            ("SECRET_KEY", SECRET),
            ("DATABASE_URL", "postgres://localhost/nexus"),
        ]
    }

    #[test]
    fn defaults() {
        let config = load(&minimal()).unwrap();
        assert_eq!(config.bind_addr, SocketAddr::from(([127, 0, 0, 1], 8000)));
        assert_eq!(
            config.storage,
            StorageKind::Postgres {
                url: "postgres://localhost/nexus".to_owned()
            }
        );
        assert_eq!(config.cors_origins, AllowedOrigins::Any);
        assert_eq!(config.log_level, "info");
        assert!(!config.disable_mlock);
        assert_eq!(config.sessions.policy(), TokenPolicy::default());
    }

    #[test]
    fn missing_encryption_key_fails() {
        let err = load(&[("SECRET_KEY", SECRET), ("NEXUS_STORAGE", "memory")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { var: "ENCRYPTION_KEY" }));
    }

    #[test]
    fn short_encryption_key_fails() {
        let mut env = minimal();
        env[0] = ("ENCRYPTION_KEY", "too-short");
        let err = load(&env).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "ENCRYPTION_KEY", .. }));
    }

    #[test]
    fn weak_secret_key_fails() {
        let mut env = minimal();
        env[1] = ("SECRET_KEY", "short");
        let err = load(&env).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "SECRET_KEY", .. }));
    }

    #[test]
    fn postgres_requires_database_url() {
        let err = load(&[("ENCRYPTION_KEY", KEY), ("SECRET_KEY", SECRET)]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { var: "DATABASE_URL" }));
    }

    #[test]
    fn memory_storage_needs_no_database() {
        let config = load(&[
            ("ENCRYPTION_KEY", KEY),
            ("SECRET_KEY", SECRET),
            ("NEXUS_STORAGE", "memory"),
        ])
        .unwrap();
        assert_eq!(config.storage, StorageKind::Memory);
    }

    #[test]
    fn port_binds_all_interfaces() {
        let mut env = minimal();
        env.push(("PORT", "9000"));
        let config = load(&env).unwrap();
        assert_eq!(config.bind_addr, SocketAddr::from(([0, 0, 0, 0], 9000)));
    }

    #[test]
    fn token_lifetimes_are_configurable() {
        let mut env = minimal();
        env.push(("NEXUS_TOKEN_TTL_MINUTES", "60"));
        env.push(("NEXUS_REMEMBER_TTL_DAYS", "30"));
        let policy = load(&env).unwrap().sessions.policy();
        assert_eq!(policy.standard, Duration::minutes(60));
        assert_eq!(policy.extended, Duration::days(30));
    }

    #[test]
    fn oversized_lifetimes_are_rejected() {
        for (var, value) in [
            ("NEXUS_REMEMBER_TTL_DAYS", "1000000000"),
            ("NEXUS_REMEMBER_TTL_DAYS", "366"),
            ("NEXUS_TOKEN_TTL_MINUTES", "9223372036854775807"),
            ("NEXUS_TOKEN_TTL_MINUTES", "525601"),
        ] {
            let mut env = minimal();
            env.push((var, value));
            let err = load(&env).unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { var: v, .. } if v == var),
                "{var}={value}"
            );
        }
    }

    #[test]
    fn one_year_lifetime_is_accepted() {
        let mut env = minimal();
        env.push(("NEXUS_REMEMBER_TTL_DAYS", "365"));
        env.push(("NEXUS_TOKEN_TTL_MINUTES", "525600"));
        let policy = load(&env).unwrap().sessions.policy();
        assert_eq!(policy.extended, Duration::days(365));
        assert_eq!(policy.standard, Duration::days(365));
    }

    #[test]
    fn zero_lifetime_is_rejected() {
        let mut env = minimal();
        env.push(("NEXUS_TOKEN_TTL_MINUTES", "0"));
        assert!(load(&env).is_err());
    }

    #[test]
    fn cors_origin_list() {
        let mut env = minimal();
        env.push(("NEXUS_CORS_ORIGINS", "http://localhost:3000, https://app.example.com"));
        let config = load(&env).unwrap();
        assert_eq!(
            config.cors_origins,
            AllowedOrigins::List(vec![
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("https://app.example.com"),
            ])
        );
    }

    #[test]
    fn unknown_storage_is_rejected() {
        let mut env = minimal();
        env.push(("NEXUS_STORAGE", "rocksdb"));
        assert!(matches!(
            load(&env).unwrap_err(),
            ConfigError::Invalid { var: "NEXUS_STORAGE", .. }
        ));
    }
}
