//! Gateway configuration.
//!
//! Configuration is loaded from environment variables. The upstream
//! password is redacted in Debug output.
//!
//! The identity-provider settings (`AUTH_DOMAIN`, `AUTH_AUDIENCE`,
//! `BASE_URL`) are optional as a group. When any of them is absent the
//! gateway runs without authentication; see [`Config::auth_settings`].

use common::jwt::{DEFAULT_LEEWAY, MAX_LEEWAY};
use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default listen host.
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

/// Default JWKS fetch timeout in seconds.
pub const DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 5;

/// Upper bound for the JWKS fetch timeout in seconds.
pub const MAX_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 30;

/// Upper bound for the shutdown drain period in seconds.
pub const MAX_DRAIN_SECONDS: u64 = 300;

/// Scopes advertised when `AUTH_SCOPES` is not set.
pub const DEFAULT_SCOPES: &[&str] = &["openid", "profile", "email"];

/// Resource name advertised when `RESOURCE_NAME` is not set.
pub const DEFAULT_RESOURCE_NAME: &str = "MCP Gateway";

/// Names of the settings that together enable authentication.
pub const AUTH_SETTING_VARS: [&str; 3] = ["AUTH_DOMAIN", "AUTH_AUDIENCE", "BASE_URL"];

/// Gateway configuration.
///
/// Loaded from environment variables with sensible defaults.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Identity-provider domain, host only (e.g. "tenant.auth0.com").
    pub auth_domain: Option<String>,

    /// Expected token audience. Also advertised as the resource identifier.
    pub auth_audience: Option<String>,

    /// Externally reachable base URL of this gateway.
    pub base_url: Option<String>,

    /// Expected issuer override (default: `https://{auth_domain}/`).
    pub auth_issuer: Option<String>,

    /// JWKS URL override (default: `https://{auth_domain}/.well-known/jwks.json`).
    pub auth_jwks_url: Option<String>,

    /// Scopes advertised in the discovery metadata.
    pub scopes_supported: Vec<String>,

    /// Human-readable resource name advertised in the discovery metadata.
    pub resource_name: String,

    /// Timeout applied to each JWKS fetch.
    pub jwks_fetch_timeout: Duration,

    /// Leeway applied to `exp` validation.
    pub jwt_leeway_seconds: u64,

    /// How long to keep serving after a shutdown signal.
    pub drain_period: Duration,

    /// Remote service that tool calls are forwarded to.
    pub upstream: Option<UpstreamConfig>,
}

/// Remote service connection settings.
#[derive(Clone, Debug)]
pub struct UpstreamConfig {
    /// Base URL; tool `name` is appended as a path segment.
    pub base_url: String,

    /// Optional HTTP basic credentials.
    pub credentials: Option<UpstreamCredentials>,
}

/// HTTP basic credentials for the remote service.
#[derive(Clone, Debug)]
pub struct UpstreamCredentials {
    pub username: String,
    pub password: SecretString,
}

/// Identity-provider settings, present only when authentication is enabled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthSettings {
    pub domain: String,
    pub audience: String,
    pub base_url: String,
    pub issuer: String,
    pub jwks_url: String,
    pub leeway_seconds: u64,
    pub jwks_fetch_timeout: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("auth_domain", &self.auth_domain)
            .field("auth_audience", &self.auth_audience)
            .field("base_url", &self.base_url)
            .field("auth_issuer", &self.auth_issuer)
            .field("auth_jwks_url", &self.auth_jwks_url)
            .field("scopes_supported", &self.scopes_supported)
            .field("resource_name", &self.resource_name)
            .field("jwks_fetch_timeout", &self.jwks_fetch_timeout)
            .field("jwt_leeway_seconds", &self.jwt_leeway_seconds)
            .field("drain_period", &self.drain_period)
            .field("upstream", &self.upstream)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },

    #[error("Invalid URL for {var}: '{value}' must start with http:// or https://")]
    InvalidUrl { var: String, value: String },
}

/// Read a variable, treating empty and whitespace-only values as unset.
fn non_empty(vars: &HashMap<String, String>, key: &str) -> Option<String> {
    vars.get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

fn parse_url(vars: &HashMap<String, String>, key: &str) -> Result<Option<String>, ConfigError> {
    match non_empty(vars, key) {
        Some(value) if value.starts_with("https://") || value.starts_with("http://") => {
            Ok(Some(value.trim_end_matches('/').to_string()))
        }
        Some(value) => Err(ConfigError::InvalidUrl {
            var: key.to_string(),
            value,
        }),
        None => Ok(None),
    }
}

fn parse_bounded(
    vars: &HashMap<String, String>,
    key: &str,
    min: u64,
    max: u64,
    default: u64,
) -> Result<u64, ConfigError> {
    let Some(value_str) = non_empty(vars, key) else {
        return Ok(default);
    };

    let value: u64 = value_str.parse().map_err(|e| ConfigError::InvalidValue {
        var: key.to_string(),
        reason: format!("must be a valid non-negative integer, got '{value_str}': {e}"),
    })?;

    if value < min || value > max {
        return Err(ConfigError::InvalidValue {
            var: key.to_string(),
            reason: format!("must be between {min} and {max}, got {value}"),
        });
    }

    Ok(value)
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = match non_empty(vars, "PORT") {
            Some(value) => value.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                var: "PORT".to_string(),
                reason: format!("must be a valid port number, got '{value}': {e}"),
            })?,
            None => DEFAULT_PORT,
        };

        let bind_host =
            non_empty(vars, "BIND_HOST").unwrap_or_else(|| DEFAULT_BIND_HOST.to_string());
        let bind_address = format!("{bind_host}:{port}");

        // The domain is interpolated into https://{domain}/..., so reject anything
        // that would change the URL shape
        let auth_domain = match non_empty(vars, "AUTH_DOMAIN") {
            Some(domain) if domain.contains("://") || domain.contains('/') => {
                return Err(ConfigError::InvalidValue {
                    var: "AUTH_DOMAIN".to_string(),
                    reason: format!("must be a bare host name without scheme or path, got '{domain}'"),
                });
            }
            other => other,
        };

        let auth_audience = non_empty(vars, "AUTH_AUDIENCE");
        let base_url = parse_url(vars, "BASE_URL")?;
        let auth_jwks_url = parse_url(vars, "AUTH_JWKS_URL")?;

        // Issuer is compared byte-for-byte with the `iss` claim, keep it verbatim
        let auth_issuer = non_empty(vars, "AUTH_ISSUER");

        let scopes_supported = match non_empty(vars, "AUTH_SCOPES") {
            Some(value) => value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect(),
            None => DEFAULT_SCOPES.iter().map(ToString::to_string).collect(),
        };

        let resource_name =
            non_empty(vars, "RESOURCE_NAME").unwrap_or_else(|| DEFAULT_RESOURCE_NAME.to_string());

        let jwks_fetch_timeout = Duration::from_secs(parse_bounded(
            vars,
            "JWKS_FETCH_TIMEOUT_SECONDS",
            1,
            MAX_JWKS_FETCH_TIMEOUT_SECONDS,
            DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS,
        )?);

        let jwt_leeway_seconds = parse_bounded(
            vars,
            "JWT_LEEWAY_SECONDS",
            0,
            MAX_LEEWAY.as_secs(),
            DEFAULT_LEEWAY.as_secs(),
        )?;

        let drain_period = Duration::from_secs(parse_bounded(
            vars,
            "GW_DRAIN_SECONDS",
            0,
            MAX_DRAIN_SECONDS,
            0,
        )?);

        let upstream = match parse_url(vars, "UPSTREAM_BASE_URL")? {
            Some(base_url) => {
                let credentials = match (
                    non_empty(vars, "UPSTREAM_USERNAME"),
                    non_empty(vars, "UPSTREAM_PASSWORD"),
                ) {
                    (Some(username), Some(password)) => Some(UpstreamCredentials {
                        username,
                        password: SecretString::from(password),
                    }),
                    (None, None) => None,
                    _ => {
                        return Err(ConfigError::InvalidValue {
                            var: "UPSTREAM_USERNAME".to_string(),
                            reason: "UPSTREAM_USERNAME and UPSTREAM_PASSWORD must be set together"
                                .to_string(),
                        });
                    }
                };
                Some(UpstreamConfig {
                    base_url,
                    credentials,
                })
            }
            None => None,
        };

        Ok(Config {
            bind_address,
            auth_domain,
            auth_audience,
            base_url,
            auth_issuer,
            auth_jwks_url,
            scopes_supported,
            resource_name,
            jwks_fetch_timeout,
            jwt_leeway_seconds,
            drain_period,
            upstream,
        })
    }

    /// Identity-provider settings, or `None` if any required setting is absent.
    pub fn auth_settings(&self) -> Option<AuthSettings> {
        let domain = self.auth_domain.clone()?;
        let audience = self.auth_audience.clone()?;
        let base_url = self.base_url.clone()?;

        let issuer = self
            .auth_issuer
            .clone()
            .unwrap_or_else(|| format!("https://{domain}/"));
        let jwks_url = self
            .auth_jwks_url
            .clone()
            .unwrap_or_else(|| format!("https://{domain}/.well-known/jwks.json"));

        Some(AuthSettings {
            domain,
            audience,
            base_url,
            issuer,
            jwks_url,
            leeway_seconds: self.jwt_leeway_seconds,
            jwks_fetch_timeout: self.jwks_fetch_timeout,
        })
    }

    /// Names of the identity-provider variables that are not set.
    pub fn missing_auth_settings(&self) -> Vec<&'static str> {
        let present = [
            self.auth_domain.is_some(),
            self.auth_audience.is_some(),
            self.base_url.is_some(),
        ];
        AUTH_SETTING_VARS
            .iter()
            .zip(present)
            .filter(|(_, is_set)| !is_set)
            .map(|(name, _)| *name)
            .collect()
    }
}
