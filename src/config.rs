//! Runtime configuration, read from the environment after loading any `.env` file.
use log::*;
use thiserror::Error;

use std::env;
use std::path::PathBuf;

use crate::storage::Credentials;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

/**
 * How bearer tokens are verified
 */
#[derive(Clone, Debug, PartialEq)]
pub enum AuthConfig {
    /** HS256 shared secret */
    Secret(String),
    /** PEM encoded RS256 public key or certificate on disk */
    PublicKeyFile(PathBuf),
}

#[derive(Clone, Debug)]
pub struct AttachmentConfig {
    pub bucket: String,
    pub region: String,
    pub credentials: Credentials,
    /** Lifetime of pre-signed upload URLs, in seconds */
    pub url_expiration: u64,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub listen_addr: String,
    /** No database URL means votes only live in memory */
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub attachments: AttachmentConfig,
    pub auth: AuthConfig,
    pub auth_audience: Option<String>,
    pub cors_origin: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /**
     * Build the configuration from any key lookup, which keeps the process environment out of
     * tests
     */
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let auth = match (get("AUTH_JWT_SECRET"), get("AUTH_JWT_PUBLIC_KEY_FILE")) {
            (_, Some(path)) => AuthConfig::PublicKeyFile(PathBuf::from(path)),
            (Some(secret), None) => AuthConfig::Secret(secret),
            (None, None) => return Err(ConfigError::Missing("AUTH_JWT_SECRET")),
        };

        let database_url = get("DATABASE_URL");
        if database_url.is_none() {
            warn!("DATABASE_URL is not set, votes will only be kept in memory");
        }

        Ok(Self {
            listen_addr: get("LISTEN_ADDR").unwrap_or_else(|| "127.0.0.1:8000".to_string()),
            database_url,
            database_max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 5)?,
            attachments: AttachmentConfig {
                bucket: require("ATTACHMENT_S3_BUCKET")?,
                region: get("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                credentials: Credentials {
                    access_key_id: require("AWS_ACCESS_KEY_ID")?,
                    secret_access_key: require("AWS_SECRET_ACCESS_KEY")?,
                    session_token: get("AWS_SESSION_TOKEN"),
                },
                url_expiration: parse_or(&get, "SIGNED_URL_EXPIRATION", 300)?,
            },
            auth,
            auth_audience: get("AUTH_JWT_AUDIENCE"),
            cors_origin: get("CORS_ORIGIN").unwrap_or_else(|| "*".to_string()),
        })
    }
}

fn parse_or<G, T>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match get(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}
