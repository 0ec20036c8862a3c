//! Runtime context: resolved config, the record store, and router clients.
//!
//! Router entries from `config.toml` are upserted into the store on every
//! run so their secrets, which the data file never holds, are attached.

use std::path::PathBuf;

use chrono::NaiveDate;
use tracing::debug;

use netbill_api::RouterClient;
use netbill_config::Config;
use netbill_core::repository::RouterConfigRepository;
use netbill_core::{CoreError, MemoryStore, RouterConfig, RouterConfigDraft};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Config file path: `--config` or the platform default.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(netbill_config::config_path)
}

/// Load the config file named by `global`.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(netbill_config::load_config_from(&config_file(global))?)
}

/// Data file path: `--data`, then the config's `data_file`, then the default.
pub fn data_file(global: &GlobalOpts, config: &Config) -> PathBuf {
    global.data.clone().unwrap_or_else(|| config.data_file())
}

pub struct Context {
    pub config: Config,
    pub store: MemoryStore,
    data_file: PathBuf,
}

impl Context {
    pub async fn open(global: &GlobalOpts) -> Result<Self, CliError> {
        let config = load(global)?;
        let data_file = data_file(global, &config);
        debug!(path = %data_file.display(), "loading data file");
        let store = MemoryStore::load(&data_file)?;

        for draft in config.router_drafts() {
            store.upsert_router_config(draft).await?;
        }
        if store.active_router_config().await?.is_none() {
            if let Some(ref name) = config.default_router {
                if let Some(router) = store.find_router_config(name).await? {
                    store.activate_router_config(router.id).await?;
                }
            }
        }

        Ok(Self {
            config,
            store,
            data_file,
        })
    }

    /// Persist the store back to the data file.
    pub fn save(&self) -> Result<(), CliError> {
        Ok(self.store.save(&self.data_file)?)
    }

    /// Client for the active router. `None` endpoint when no config is
    /// active, so router operations report `NoActiveConfig`.
    pub async fn router_client(&self) -> Result<RouterClient, CliError> {
        let endpoint = match self.store.active_router_config().await? {
            Some(router) => Some(router.endpoint().map_err(|_| CliError::NoCredentials {
                router: router.name.clone(),
            })?),
            None => None,
        };
        Ok(RouterClient::new(endpoint, self.config.transport()))
    }

    /// Client that never reaches a router, for procedures that only touch
    /// billing records.
    pub fn offline_client(&self) -> RouterClient {
        RouterClient::new(None, self.config.transport())
    }

    /// Draft for `name` from the config file, or rebuilt from the stored
    /// record when the config file no longer lists it.
    pub async fn router_draft(&self, name: &str) -> Result<RouterConfigDraft, CliError> {
        if let Some(entry) = self.config.routers.get(name) {
            return Ok(netbill_config::router_draft(entry, name));
        }
        let stored = self
            .store
            .find_router_config(name)
            .await?
            .ok_or_else(|| CoreError::not_found("Router config", name))?;
        Ok(draft_from_record(stored))
    }

    pub async fn active_router(&self) -> Result<RouterConfig, CliError> {
        self.store
            .active_router_config()
            .await?
            .ok_or_else(|| CliError::NoActiveRouter {
                path: netbill_config::config_path().display().to_string(),
            })
    }
}

fn draft_from_record(record: RouterConfig) -> RouterConfigDraft {
    RouterConfigDraft {
        name: record.name,
        host: record.host,
        port: record.port,
        username: record.username,
        secret: record.secret,
        description: record.description,
    }
}

/// Parse an optional `YYYY-MM-DD` flag.
pub fn parse_date(value: Option<&str>) -> Result<Option<NaiveDate>, CliError> {
    value
        .map(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|e| CliError::validation("date", format!("'{raw}': {e}")))
        })
        .transpose()
}
