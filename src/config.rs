// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `CLERK_FRONTEND_API` | Identity provider base URL (JWKS is served under it) | Required |
//! | `CLERK_JWT_ISSUER` | Expected JWT issuer claim | Required |
//! | `CLERK_AUDIENCE` | Expected JWT audience claim (enables the audience check) | Unset |
//! | `JWKS_FETCH_TIMEOUT_SECS` | Timeout for one JWKS fetch | `10` |
//! | `JWKS_MAX_AGE_SECS` | Maximum age of a cached key set | Unset (kept until a miss) |
//! | `JWT_LEEWAY_SECS` | Clock skew tolerance applied to `exp` | `0` |
//! | `DATA_DIR` | Directory holding the principal database | Unset (in-memory) |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files for TLS termination | Unset (plain HTTP) |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::collections::HashMap;
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

pub const PROVIDER_URL_ENV: &str = "CLERK_FRONTEND_API";
pub const ISSUER_ENV: &str = "CLERK_JWT_ISSUER";
pub const AUDIENCE_ENV: &str = "CLERK_AUDIENCE";
pub const FETCH_TIMEOUT_ENV: &str = "JWKS_FETCH_TIMEOUT_SECS";
pub const MAX_AGE_ENV: &str = "JWKS_MAX_AGE_SECS";
pub const LEEWAY_ENV: &str = "JWT_LEEWAY_SECS";

/// Environment variable name for the principal database directory.
///
/// When unset, principals are kept in memory and lost on restart.
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const TLS_CERT_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Well-known path of the provider's key set, relative to its base URL.
pub const JWKS_WELL_KNOWN_PATH: &str = "/.well-known/jwks.json";

/// File name of the principal database inside `DATA_DIR`.
pub const PRINCIPAL_DB_FILE: &str = "principals.redb";

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid value for {name}: '{value}' ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Token verification settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Provider base URL, normalised (scheme present, no trailing slash)
    pub provider_url: String,
    /// Full URL of the provider's JWKS document
    pub jwks_url: String,
    /// Expected `iss` claim, compared exactly
    pub issuer: String,
    /// Expected `aud` claim; `None` leaves the audience unchecked
    pub audience: Option<String>,
    pub fetch_timeout: Duration,
    pub max_key_set_age: Option<Duration>,
    pub leeway: Duration,
}

impl AuthConfig {
    /// Create settings for a provider base URL and expected issuer.
    pub fn new(provider_url: impl AsRef<str>, issuer: impl Into<String>) -> Self {
        let provider_url = normalize_provider_url(provider_url.as_ref());
        Self {
            jwks_url: format!("{provider_url}{JWKS_WELL_KNOWN_PATH}"),
            provider_url,
            issuer: issuer.into(),
            audience: None,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            max_key_set_age: None,
            leeway: Duration::ZERO,
        }
    }

    /// Enable the audience check.
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_max_key_set_age(mut self, age: Duration) -> Self {
        self.max_key_set_age = Some(age);
        self
    }

    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

/// TLS certificate and key locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub auth: AuthConfig,
    pub data_dir: Option<PathBuf>,
    pub bind_address: SocketAddr,
    pub tls: Option<TlsPaths>,
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a map (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let provider_url = required(vars, PROVIDER_URL_ENV)?;
        let issuer = required(vars, ISSUER_ENV)?;

        let mut auth = AuthConfig::new(provider_url, issuer);
        if let Some(audience) = optional(vars, AUDIENCE_ENV) {
            auth = auth.with_audience(audience);
        }
        if let Some(secs) = parse_secs(vars, FETCH_TIMEOUT_ENV)? {
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    name: FETCH_TIMEOUT_ENV,
                    value: "0".to_string(),
                    reason: "timeout must be positive".to_string(),
                });
            }
            auth = auth.with_fetch_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = parse_secs(vars, MAX_AGE_ENV)? {
            auth = auth.with_max_key_set_age(Duration::from_secs(secs));
        }
        if let Some(secs) = parse_secs(vars, LEEWAY_ENV)? {
            auth = auth.with_leeway(Duration::from_secs(secs));
        }

        let host = optional(vars, HOST_ENV).unwrap_or(DEFAULT_HOST);
        let port = match optional(vars, PORT_ENV) {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: PORT_ENV,
                value: raw.to_string(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };
        let ip: IpAddr = host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: HOST_ENV,
                value: host.to_string(),
                reason: e.to_string(),
            })?;
        let bind_address = SocketAddr::new(ip, port);

        let tls = match (optional(vars, TLS_CERT_ENV), optional(vars, TLS_KEY_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: PathBuf::from(cert),
                key: PathBuf::from(key),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::MissingEnvVar(TLS_KEY_ENV)),
            (None, Some(_)) => return Err(ConfigError::MissingEnvVar(TLS_CERT_ENV)),
        };

        let log_format = match optional(vars, LOG_FORMAT_ENV) {
            Some(raw) if raw.eq_ignore_ascii_case("json") => LogFormat::Json,
            Some(raw) if raw.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            Some(raw) => {
                return Err(ConfigError::Invalid {
                    name: LOG_FORMAT_ENV,
                    value: raw.to_string(),
                    reason: "expected 'json' or 'pretty'".to_string(),
                })
            }
            None => LogFormat::default(),
        };

        Ok(Self {
            auth,
            data_dir: optional(vars, DATA_DIR_ENV).map(PathBuf::from),
            bind_address,
            tls,
            log_format,
        })
    }
}

/// Normalise a provider base URL: assume `https://` when no scheme is given
/// and strip trailing slashes.
pub fn normalize_provider_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

fn optional<'a>(vars: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    vars.get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn required<'a>(
    vars: &'a HashMap<String, String>,
    name: &'static str,
) -> Result<&'a str, ConfigError> {
    optional(vars, name).ok_or(ConfigError::MissingEnvVar(name))
}

fn parse_secs(
    vars: &HashMap<String, String>,
    name: &'static str,
) -> Result<Option<u64>, ConfigError> {
    optional(vars, name)
        .map(|raw| {
            raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
                name,
                value: raw.to_string(),
                reason: e.to_string(),
            })
        })
        .transpose()
}
