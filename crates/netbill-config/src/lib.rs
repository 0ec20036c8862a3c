//! Shared configuration for netbill.
//!
//! TOML config (defaults, billing policy, router transport, named router
//! entries), layered with `NETBILL_` environment variables, plus router
//! credential resolution (env var + keyring + plaintext) and translation
//! into `netbill-core` / `netbill-api` types.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use netbill_api::{DEFAULT_PORT, TransportConfig};
use netbill_core::{BillingPolicy, RouterConfigDraft};

/// Keyring service name for router passwords.
pub const KEYRING_SERVICE: &str = "netbill";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for router '{router}'")]
    NoCredentials { router: String },

    #[error("unknown router '{router}'")]
    UnknownRouter { router: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// JSON data file holding the record store. Platform data dir if unset.
    pub data_file: Option<PathBuf>,

    /// Router to activate when the store has no active config yet.
    pub default_router: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Billing policy day offsets.
    #[serde(default)]
    pub billing: BillingPolicy,

    /// Socket settings shared by every router session.
    #[serde(default)]
    pub router: RouterTransport,

    /// Named router entries.
    #[serde(default)]
    pub routers: BTreeMap<String, RouterEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_file: None,
            default_router: None,
            defaults: Defaults::default(),
            billing: BillingPolicy::default(),
            router: RouterTransport::default(),
            routers: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RouterTransport {
    /// Connect and reply-read bound in seconds; `0` waits indefinitely.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RouterTransport {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

/// A named router entry.
#[derive(Debug, Deserialize, Serialize)]
pub struct RouterEntry {
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    pub username: String,

    /// Password (plaintext, prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable holding the password.
    pub password_env: Option<String>,

    pub description: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Config {
    /// Transport settings for the protocol client.
    pub fn transport(&self) -> TransportConfig {
        match self.router.timeout_secs {
            0 => TransportConfig::unbounded(),
            secs => TransportConfig::with_timeout(Duration::from_secs(secs)),
        }
    }

    /// Data file path, falling back to the platform data directory.
    pub fn data_file(&self) -> PathBuf {
        self.data_file.clone().unwrap_or_else(default_data_file)
    }

    pub fn router(&self, name: &str) -> Result<&RouterEntry, ConfigError> {
        self.routers.get(name).ok_or_else(|| ConfigError::UnknownRouter {
            router: name.into(),
        })
    }

    /// Store drafts for every configured router, secrets resolved where
    /// the credential chain yields one.
    pub fn router_drafts(&self) -> Vec<RouterConfigDraft> {
        self.routers
            .iter()
            .map(|(name, entry)| router_draft(entry, name))
            .collect()
    }
}

/// Build a store draft from a router entry.
pub fn router_draft(entry: &RouterEntry, name: &str) -> RouterConfigDraft {
    let secret = match resolve_router_secret(entry, name) {
        Ok(secret) => Some(secret),
        Err(e) => {
            debug!(router = name, error = %e, "no router secret resolved");
            None
        }
    };
    RouterConfigDraft {
        name: name.to_owned(),
        host: entry.host.clone(),
        port: entry.port,
        username: entry.username.clone(),
        secret,
        description: entry.description.clone(),
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "netbill", "netbill")
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("netbill");
    p
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default location of the JSON data file.
pub fn default_data_file() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("netbill.json"),
        |dirs| dirs.data_dir().join("netbill.json"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the config from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load defaults, then `path` (if present), then `NETBILL_*` variables.
///
/// Nested keys use a double underscore: `NETBILL_BILLING__GRACE_DAYS`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("NETBILL_").split("__"));

    let config: Config = figment.extract()?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if let Some(ref name) = config.default_router {
        if !config.routers.contains_key(name) {
            return Err(ConfigError::Validation {
                field: "default_router".into(),
                reason: format!("no [routers.{name}] entry"),
            });
        }
    }
    for (name, entry) in &config.routers {
        if entry.host.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: format!("routers.{name}.host"),
                reason: "must not be empty".into(),
            });
        }
    }
    Ok(())
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_entry(router: &str) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{router}/password"))
}

/// Resolve a router password: `password_env` variable, then the system
/// keyring, then the plaintext `password`.
pub fn resolve_router_secret(entry: &RouterEntry, router: &str) -> Result<SecretString, ConfigError> {
    // 1. Entry's password_env → env var lookup
    if let Some(ref env_name) = entry.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(stored) = keyring_entry(router).and_then(|e| e.get_password()) {
        return Ok(SecretString::from(stored));
    }

    // 3. Plaintext in config
    if let Some(ref pw) = entry.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        router: router.into(),
    })
}

/// Store a router password in the system keyring.
pub fn store_router_secret(router: &str, password: &str) -> Result<(), ConfigError> {
    keyring_entry(router)?.set_password(password)?;
    Ok(())
}
