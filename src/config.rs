use std::{net::SocketAddr, time::Duration};

use thiserror::Error;

// Longest lifetime accepted for an access token.
const MAX_ACCESS_TOKEN_TTL_SECS: u64 = 30 * 24 * 60 * 60;
// SigV4 presigned URLs cannot outlive seven days.
const MAX_UPLOAD_URL_TTL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthProvider {
    Local,
    Cognito,
}

/// Settings for the bearer-token gate and token issuing.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub enabled: bool,
    pub jwt_secret: String,
    pub access_token_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct CognitoConfig {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub addr: SocketAddr,
    pub cors_origin: String,
    pub auth: AuthConfig,
    pub provider: AuthProvider,
    pub cognito: Option<CognitoConfig>,
    pub seed_user: Option<(String, String)>,
    pub upload_url_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let database_url = var("DATABASE_URL").unwrap_or_else(|| "sqlite://todo.db".to_string());

        let host = var("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = var("PORT").unwrap_or_else(|| "3000".to_string());
        let addr = format!("{host}:{port}")
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::Invalid {
                name: "HOST/PORT",
                value: format!("{host}:{port}"),
            })?;

        let cors_origin =
            var("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        let enabled = match var("AUTH_ENABLED") {
            Some(value) => parse_flag("AUTH_ENABLED", &value)?,
            None => true,
        };
        let jwt_secret = var("AUTH_JWT_SECRET").ok_or(ConfigError::Missing("AUTH_JWT_SECRET"))?;
        let access_token_ttl = parse_secs(
            "AUTH_ACCESS_TOKEN_TTL_SECS",
            var("AUTH_ACCESS_TOKEN_TTL_SECS"),
            3600,
            MAX_ACCESS_TOKEN_TTL_SECS,
        )?;

        let provider = match var("AUTH_PROVIDER").as_deref() {
            None | Some("local") => AuthProvider::Local,
            Some("cognito") => AuthProvider::Cognito,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "AUTH_PROVIDER",
                    value: other.to_string(),
                })
            }
        };

        let cognito = match provider {
            AuthProvider::Cognito => Some(CognitoConfig {
                client_id: var("CLIENT_ID").ok_or(ConfigError::Missing("CLIENT_ID"))?,
                client_secret: var("CLIENT_SECRET").ok_or(ConfigError::Missing("CLIENT_SECRET"))?,
            }),
            AuthProvider::Local => None,
        };

        let seed_user = var("AUTH_SEED_USERNAME").zip(var("AUTH_SEED_PASSWORD"));

        let upload_url_ttl = parse_secs(
            "S3_URL_EXPIRES_SECS",
            var("S3_URL_EXPIRES_SECS"),
            300,
            MAX_UPLOAD_URL_TTL_SECS,
        )?;

        Ok(Self {
            database_url,
            addr,
            cors_origin,
            auth: AuthConfig {
                enabled,
                jwt_secret,
                access_token_ttl,
            },
            provider,
            cognito,
            seed_user,
            upload_url_ttl,
        })
    }
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
        }),
    }
}

fn parse_secs(
    name: &'static str,
    value: Option<String>,
    default: u64,
    max: u64,
) -> Result<Duration, ConfigError> {
    let Some(value) = value else {
        return Ok(Duration::from_secs(default));
    };
    match value.trim().parse::<u64>() {
        Ok(secs) if (1..=max).contains(&secs) => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::Invalid { name, value }),
    }
}
