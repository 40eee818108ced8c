// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup (a `.env`
//! file is loaded first if present) and is immutable afterwards.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `4000` |
//! | `DATABASE_PATH` | redb database file | `./data/catalog.redb` |
//! | `OIDC_ISSUER` | Expected JWT issuer (alias `KEYCLOAK_ISSUER`) | Required |
//! | `OIDC_AUDIENCE` | Expected JWT audience; unset disables the check | Unset |
//! | `OIDC_JWKS_URL` | Key set endpoint | `<issuer>/protocol/openid-connect/certs` |
//! | `JWKS_CACHE_TTL_SECS` | Key set cache lifetime | `300` |
//! | `JWT_LEEWAY_SECS` | Clock skew tolerance | `60` |
//! | `CATALOG_READ_ROLE` | Role needed to list products (`role` or `client:role`) | `guest` |
//! | `CATALOG_ADMIN_ROLE` | Role needed for admin operations | `admin` |
//! | `REVIEW_POLICY` | `one-per-user` or `unrestricted` | `one-per-user` |
//! | `PURCHASE_POLICY` | `not-required` or `require-paid` | `not-required` |
//! | `CORS_ALLOWED_ORIGINS` | Comma-separated origins | `http://localhost:3000` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::auth::AccessPolicy;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const DATABASE_PATH_ENV: &str = "DATABASE_PATH";
pub const OIDC_ISSUER_ENV: &str = "OIDC_ISSUER";
/// Older name for [`OIDC_ISSUER_ENV`], still honoured.
pub const KEYCLOAK_ISSUER_ENV: &str = "KEYCLOAK_ISSUER";
pub const OIDC_AUDIENCE_ENV: &str = "OIDC_AUDIENCE";
pub const OIDC_JWKS_URL_ENV: &str = "OIDC_JWKS_URL";
pub const JWKS_CACHE_TTL_ENV: &str = "JWKS_CACHE_TTL_SECS";
pub const JWT_LEEWAY_ENV: &str = "JWT_LEEWAY_SECS";
pub const READ_ROLE_ENV: &str = "CATALOG_READ_ROLE";
pub const ADMIN_ROLE_ENV: &str = "CATALOG_ADMIN_ROLE";
pub const REVIEW_POLICY_ENV: &str = "REVIEW_POLICY";
pub const PURCHASE_POLICY_ENV: &str = "PURCHASE_POLICY";
pub const CORS_ORIGINS_ENV: &str = "CORS_ALLOWED_ORIGINS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 4000;
const DEFAULT_DATABASE_PATH: &str = "./data/catalog.redb";
const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";
const JWKS_PATH: &str = "/protocol/openid-connect/certs";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value `{value}` for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Logging output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected `pretty` or `json`, got `{other}`")),
        }
    }
}

/// Identity provider settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OidcConfig {
    pub issuer: String,
    pub audience: Option<String>,
    pub jwks_url: String,
    pub jwks_cache_ttl: Duration,
    pub leeway_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub oidc: OidcConfig,
    pub access: AccessPolicy,
    pub cors_allowed_origins: Vec<String>,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let issuer = var(OIDC_ISSUER_ENV)
            .or_else(|| var(KEYCLOAK_ISSUER_ENV))
            .ok_or(ConfigError::Missing(OIDC_ISSUER_ENV))?;
        let issuer = issuer.trim_end_matches('/').to_string();
        url::Url::parse(&issuer).map_err(|e| invalid(OIDC_ISSUER_ENV, &issuer, e))?;

        let jwks_url = var(OIDC_JWKS_URL_ENV).unwrap_or_else(|| format!("{issuer}{JWKS_PATH}"));
        url::Url::parse(&jwks_url).map_err(|e| invalid(OIDC_JWKS_URL_ENV, &jwks_url, e))?;

        let oidc = OidcConfig {
            issuer,
            audience: var(OIDC_AUDIENCE_ENV),
            jwks_url,
            jwks_cache_ttl: Duration::from_secs(parse_or(&var, JWKS_CACHE_TTL_ENV, 300)?),
            leeway_secs: parse_or(&var, JWT_LEEWAY_ENV, 60)?,
        };

        let defaults = AccessPolicy::default();
        let access = AccessPolicy {
            read_role: parse_or(&var, READ_ROLE_ENV, defaults.read_role)?,
            admin_role: parse_or(&var, ADMIN_ROLE_ENV, defaults.admin_role)?,
            review_policy: parse_or(&var, REVIEW_POLICY_ENV, defaults.review_policy)?,
            purchase_policy: parse_or(&var, PURCHASE_POLICY_ENV, defaults.purchase_policy)?,
        };

        let cors_allowed_origins = var(CORS_ORIGINS_ENV)
            .unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(Self {
            host: var(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or(&var, PORT_ENV, DEFAULT_PORT)?,
            database_path: var(DATABASE_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH)),
            oidc,
            access,
            cors_allowed_origins,
            log_format: parse_or(&var, LOG_FORMAT_ENV, LogFormat::default())?,
        })
    }

    /// `host:port` to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse `name` if set, otherwise fall back to `default`.
fn parse_or<T>(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(value) => value.trim().parse().map_err(|e| invalid(name, &value, e)),
        None => Ok(default),
    }
}

fn invalid(var: &'static str, value: &str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{PurchasePolicy, ReviewPolicy, RoleRequirement};
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_with_only_issuer() {
        let config = load(&[(OIDC_ISSUER_ENV, "https://id.example.com/realms/shop/")]).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:4000");
        assert_eq!(config.oidc.issuer, "https://id.example.com/realms/shop");
        assert_eq!(
            config.oidc.jwks_url,
            "https://id.example.com/realms/shop/protocol/openid-connect/certs"
        );
        assert_eq!(config.oidc.audience, None);
        assert_eq!(config.oidc.jwks_cache_ttl, Duration::from_secs(300));
        assert_eq!(config.oidc.leeway_secs, 60);
        assert_eq!(config.access, AccessPolicy::default());
        assert_eq!(config.cors_allowed_origins, vec!["http://localhost:3000"]);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn issuer_is_required() {
        assert_eq!(load(&[]).unwrap_err(), ConfigError::Missing(OIDC_ISSUER_ENV));
    }

    #[test]
    fn keycloak_issuer_alias_is_honoured() {
        let config = load(&[(KEYCLOAK_ISSUER_ENV, "https://kc.example.com/realms/r")]).unwrap();
        assert_eq!(config.oidc.issuer, "https://kc.example.com/realms/r");
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[
            (OIDC_ISSUER_ENV, "https://id.example.com"),
            (OIDC_AUDIENCE_ENV, "catalog-api"),
            (PORT_ENV, "8081"),
            (READ_ROLE_ENV, "catalog-api:viewer"),
            (REVIEW_POLICY_ENV, "unrestricted"),
            (PURCHASE_POLICY_ENV, "require-paid"),
            (CORS_ORIGINS_ENV, "https://a.example.com, https://b.example.com"),
            (LOG_FORMAT_ENV, "json"),
        ])
        .unwrap();

        assert_eq!(config.port, 8081);
        assert_eq!(config.oidc.audience.as_deref(), Some("catalog-api"));
        assert_eq!(
            config.access.read_role,
            RoleRequirement::client("catalog-api", "viewer")
        );
        assert_eq!(config.access.review_policy, ReviewPolicy::Unrestricted);
        assert_eq!(config.access.purchase_policy, PurchasePolicy::RequirePaid);
        assert_eq!(config.cors_allowed_origins.len(), 2);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = load(&[
            (OIDC_ISSUER_ENV, "https://id.example.com"),
            (PURCHASE_POLICY_ENV, "sometimes"),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { var: PURCHASE_POLICY_ENV, .. }
        ));

        let err = load(&[(OIDC_ISSUER_ENV, "not a url")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: OIDC_ISSUER_ENV, .. }));
    }
}
