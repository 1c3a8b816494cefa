//! Server configuration from the environment.

use std::env;

use thiserror::Error;

use crate::services::StatusPolicy;

const DEFAULT_DATABASE_URL: &str = "sqlite://./data/studio.db";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_ADMIN_USER: &str = "admin";
const DEFAULT_ADMIN_PASSWORD: &str = "admin";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} has invalid value `{value}`: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error("{0} is required for the pocketbase backend")]
    Missing(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    PocketBase {
        url: String,
        superuser: Option<(String, String)>,
    },
    Sqlite {
        database_url: String,
    },
}

/// How the admin password is known to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminSecret {
    /// A PHC-format argon2 hash.
    Hash(String),
    /// A plain password, hashed at startup.
    Plain(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub store: StoreConfig,
    pub port: u16,
    pub admin_user: String,
    pub admin_secret: AdminSecret,
    pub status_policy: StatusPolicy,
    pub seed_content: bool,
}

fn invalid(name: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(name, value, "expected true or false")),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let pocketbase_url = var("POCKETBASE_URL");
        let backend = var("STORE_BACKEND").unwrap_or_else(|| {
            if pocketbase_url.is_some() {
                "pocketbase".to_string()
            } else {
                "sqlite".to_string()
            }
        });
        let store = match backend.to_ascii_lowercase().as_str() {
            "pocketbase" => {
                let url = pocketbase_url.ok_or(ConfigError::Missing("POCKETBASE_URL"))?;
                let superuser = var("PB_SUPERUSER_EMAIL").zip(var("PB_SUPERUSER_PASSWORD"));
                StoreConfig::PocketBase { url, superuser }
            }
            "sqlite" => StoreConfig::Sqlite {
                database_url: var("DATABASE_URL")
                    .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            },
            _ => {
                return Err(invalid(
                    "STORE_BACKEND",
                    &backend,
                    "expected pocketbase or sqlite",
                ))
            }
        };

        let port = match var("PORT") {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .map_err(|err| invalid("PORT", &value, err))?,
            None => DEFAULT_PORT,
        };

        let admin_secret = match (var("ADMIN_PASSWORD_HASH"), var("ADMIN_PASSWORD")) {
            (Some(hash), _) => AdminSecret::Hash(hash),
            (None, Some(password)) => AdminSecret::Plain(password),
            (None, None) => AdminSecret::Plain(DEFAULT_ADMIN_PASSWORD.to_string()),
        };

        let status_policy = match var("STATUS_TRANSITIONS") {
            Some(value) => value
                .parse::<StatusPolicy>()
                .map_err(|reason| invalid("STATUS_TRANSITIONS", &value, reason))?,
            None => StatusPolicy::default(),
        };

        let seed_content = match var("SEED_CONTENT") {
            Some(value) => parse_bool("SEED_CONTENT", &value)?,
            None => true,
        };

        Ok(Self {
            store,
            port,
            admin_user: var("ADMIN_USER").unwrap_or_else(|| DEFAULT_ADMIN_USER.to_string()),
            admin_secret,
            status_policy,
            seed_content,
        })
    }

    /// True when no admin password was configured at all.
    pub fn uses_default_admin_password(&self) -> bool {
        self.admin_secret == AdminSecret::Plain(DEFAULT_ADMIN_PASSWORD.to_string())
    }
}
