// ── Router configuration records ──

use std::fmt;

use chrono::{DateTime, Utc};
use netbill_api::RouterEndpoint;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use super::ids::RouterConfigId;
use crate::error::CoreError;

/// Connection settings for one router.
///
/// At most one record is active. The secret is never serialized and is
/// redacted from `Debug`; it is attached at runtime from the credential
/// store.
#[derive(Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    pub id: RouterConfigId,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(skip)]
    pub secret: Option<SecretString>,
    pub is_active: bool,
    pub description: Option<String>,
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl RouterConfig {
    /// Endpoint for the protocol client. Fails when no secret is attached.
    pub fn endpoint(&self) -> Result<RouterEndpoint, CoreError> {
        let secret = self.secret.clone().ok_or_else(|| {
            CoreError::validation(format!("router '{}' has no credentials attached", self.name))
        })?;
        Ok(RouterEndpoint::new(self.host.clone(), self.username.clone(), secret).with_port(self.port))
    }
}

impl fmt::Debug for RouterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterConfig")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("is_active", &self.is_active)
            .field("description", &self.description)
            .field("last_sync_at", &self.last_sync_at)
            .finish()
    }
}

/// Router settings to create or update, keyed by `name`.
#[derive(Clone)]
pub struct RouterConfigDraft {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub secret: Option<SecretString>,
    pub description: Option<String>,
}

impl fmt::Debug for RouterConfigDraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterConfigDraft")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}
