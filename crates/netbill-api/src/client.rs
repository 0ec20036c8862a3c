// Router API client
//
// Stateless facade over `Session`: every operation opens a fresh session,
// issues one logical command, and closes the session again. Operations come
// in pairs, a `try_*` form returning the full `Result` and a degraded form
// (bool / empty list) that logs the cause for batch callers.

use std::collections::BTreeMap;
use std::fmt;

use secrecy::SecretString;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Error;
use crate::session::Session;
use crate::transport::TransportConfig;

/// Default TCP port of the router API service.
pub const DEFAULT_PORT: u16 = 8728;

/// Address and credentials of one router.
#[derive(Clone)]
pub struct RouterEndpoint {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub secret: SecretString,
}

impl RouterEndpoint {
    pub fn new(host: impl Into<String>, username: impl Into<String>, secret: SecretString) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: username.into(),
            secret,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// `host:port` string handed to the socket layer.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for RouterEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterEndpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// A PPP secret to create on the router.
#[derive(Debug, Clone)]
pub struct NewSecret {
    pub username: String,
    pub password: SecretString,
    /// Router profile; `default` when unset.
    pub profile: Option<String>,
    pub remote_address: Option<String>,
    pub comment: Option<String>,
}

impl NewSecret {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
            profile: None,
            remote_address: None,
            comment: None,
        }
    }
}

/// Outcome of a change addressed to an existing secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretChange {
    Applied,
    /// The router holds no secret with that username.
    NotFound,
}

impl SecretChange {
    pub fn is_applied(self) -> bool {
        self == Self::Applied
    }
}

/// One live PPP session as reported by `/ppp/active/print`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveConnection {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
}

impl ActiveConnection {
    pub fn address(&self) -> Option<&str> {
        self.attributes.get("address").map(String::as_str)
    }

    pub fn uptime(&self) -> Option<&str> {
        self.attributes.get("uptime").map(String::as_str)
    }
}

/// Result of a connectivity probe. Never an error.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionTest {
    pub success: bool,
    pub message: String,
    pub raw_reply: Option<Vec<String>>,
}

/// Client for one configured router endpoint.
///
/// Built with `None` when no router configuration is active; every
/// operation then fails with [`Error::NoActiveConfig`] (or degrades).
#[derive(Debug, Clone)]
pub struct RouterClient {
    endpoint: Option<RouterEndpoint>,
    transport: TransportConfig,
}

impl RouterClient {
    pub fn new(endpoint: Option<RouterEndpoint>, transport: TransportConfig) -> Self {
        Self {
            endpoint,
            transport,
        }
    }

    pub fn endpoint(&self) -> Option<&RouterEndpoint> {
        self.endpoint.as_ref()
    }

    /// Open and authenticate a session against the configured router.
    pub async fn connect(&self) -> Result<Session, Error> {
        let endpoint = self.endpoint.as_ref().ok_or(Error::NoActiveConfig)?;
        Session::open(endpoint, &self.transport).await
    }

    // ── PPP secrets ─────────────────────────────────────────────────

    /// Look up the router-internal id of `username`'s secret.
    pub async fn find_secret_id(&self, username: &str) -> Result<Option<String>, Error> {
        let mut session = self.connect().await?;
        let result = session.find_secret_id(username).await;
        session.close().await;
        result
    }

    pub async fn try_add_secret(&self, secret: &NewSecret) -> Result<(), Error> {
        let mut session = self.connect().await?;
        let result = session.add_secret(secret).await;
        session.close().await;
        if result.is_ok() {
            debug!(username = %secret.username, "ppp secret added");
        }
        result
    }

    /// Degraded [`try_add_secret`](Self::try_add_secret): `false` on any failure.
    pub async fn add_secret(&self, secret: &NewSecret) -> bool {
        match self.try_add_secret(secret).await {
            Ok(()) => true,
            Err(e) => {
                warn!(username = %secret.username, error = %e, "failed to add ppp secret");
                false
            }
        }
    }

    pub async fn try_remove_secret(&self, username: &str) -> Result<SecretChange, Error> {
        let mut session = self.connect().await?;
        let result = session.remove_secret(username).await;
        session.close().await;
        result
    }

    /// Degraded [`try_remove_secret`](Self::try_remove_secret): `false` on a
    /// lookup miss or any failure.
    pub async fn remove_secret(&self, username: &str) -> bool {
        degrade_change(self.try_remove_secret(username).await, username, "remove")
    }

    pub async fn try_toggle_secret(
        &self,
        username: &str,
        enabled: bool,
    ) -> Result<SecretChange, Error> {
        let mut session = self.connect().await?;
        let result = session.set_secret_enabled(username, enabled).await;
        session.close().await;
        result
    }

    /// Degraded [`try_toggle_secret`](Self::try_toggle_secret): `false` on a
    /// lookup miss or any failure.
    pub async fn toggle_secret(&self, username: &str, enabled: bool) -> bool {
        let action = if enabled { "enable" } else { "disable" };
        degrade_change(
            self.try_toggle_secret(username, enabled).await,
            username,
            action,
        )
    }

    // ── Monitoring ──────────────────────────────────────────────────

    pub async fn try_list_active_connections(&self) -> Result<Vec<ActiveConnection>, Error> {
        let mut session = self.connect().await?;
        let result = session.active_connections().await;
        session.close().await;
        result
    }

    /// Degraded [`try_list_active_connections`](Self::try_list_active_connections):
    /// empty on failure.
    pub async fn list_active_connections(&self) -> Vec<ActiveConnection> {
        self.try_list_active_connections()
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to list active ppp connections");
                Vec::new()
            })
    }

    /// Probe the router with `/system/identity/print`.
    pub async fn test_connection(&self) -> ConnectionTest {
        let probe = async {
            let mut session = self.connect().await?;
            let result = session.identity().await;
            session.close().await;
            result
        };

        match probe.await {
            Ok(reply) => {
                let message = match reply.find_attribute("name") {
                    Some(identity) => format!("Connected to {identity}"),
                    None => "Connected".to_owned(),
                };
                ConnectionTest {
                    success: true,
                    message,
                    raw_reply: Some(reply.into_words()),
                }
            }
            Err(e) => ConnectionTest {
                success: false,
                message: e.to_string(),
                raw_reply: match e {
                    Error::Trap { reply, .. } => Some(reply),
                    _ => None,
                },
            },
        }
    }
}

fn degrade_change(result: Result<SecretChange, Error>, username: &str, action: &str) -> bool {
    match result {
        Ok(SecretChange::Applied) => true,
        Ok(SecretChange::NotFound) => {
            warn!(%username, action, "ppp secret not found on router");
            false
        }
        Err(e) => {
            warn!(%username, action, error = %e, "ppp secret change failed");
            false
        }
    }
}
