// ── Router synchronization ──
//
// `NetworkSync` is the seam between billing and the router: the engine
// only ever asks for a secret to be enabled or disabled, while the sync
// service pushes secrets in bulk and reports who is online.

use std::collections::{BTreeMap, HashSet};
use std::future::Future;

use chrono::{DateTime, Utc};
use netbill_api::{ActiveConnection, NewSecret, RouterClient, SecretChange};
use secrecy::SecretString;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::CoreError;
use crate::model::{LifecycleState, SubscriberId};
use crate::repository::{PackageRepository, RouterConfigRepository, SubscriberRepository};

/// Router-side operations the billing services depend on.
pub trait NetworkSync: Send + Sync {
    /// Enable or disable the PPP secret named `username`.
    fn set_secret_enabled(
        &self,
        username: &str,
        enabled: bool,
    ) -> impl Future<Output = Result<SecretChange, CoreError>> + Send;

    fn push_secret(&self, secret: &NewSecret) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn active_sessions(
        &self,
    ) -> impl Future<Output = Result<Vec<ActiveConnection>, CoreError>> + Send;
}

impl NetworkSync for RouterClient {
    async fn set_secret_enabled(
        &self,
        username: &str,
        enabled: bool,
    ) -> Result<SecretChange, CoreError> {
        Ok(self.try_toggle_secret(username, enabled).await?)
    }

    async fn push_secret(&self, secret: &NewSecret) -> Result<(), CoreError> {
        Ok(self.try_add_secret(secret).await?)
    }

    async fn active_sessions(&self) -> Result<Vec<ActiveConnection>, CoreError> {
        Ok(self.try_list_active_connections().await?)
    }
}

// ── Reports ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushFailure {
    pub username: String,
    pub reason: String,
}

/// Result of [`RouterSync::push_secrets`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PushReport {
    pub pushed: usize,
    pub failed: usize,
    pub failures: Vec<PushFailure>,
    pub synced_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresenceEntry {
    pub subscriber_id: SubscriberId,
    pub display_name: String,
    pub ppp_username: String,
    pub address: Option<String>,
    pub uptime: Option<String>,
}

/// Active subscribers split by whether the router reports a live session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PresenceReport {
    pub online: Vec<PresenceEntry>,
    pub offline: Vec<PresenceEntry>,
    /// Live sessions whose name matches no subscriber.
    pub unknown: Vec<String>,
}

// ── Service ─────────────────────────────────────────────────────────

pub struct RouterSync<S, N> {
    store: S,
    network: N,
}

impl<S, N> RouterSync<S, N>
where
    S: SubscriberRepository + PackageRepository + RouterConfigRepository,
    N: NetworkSync,
{
    pub fn new(store: S, network: N) -> Self {
        Self { store, network }
    }

    pub async fn push_secrets(&self) -> Result<PushReport, CoreError> {
        self.push_secrets_at(Utc::now()).await
    }

    /// Add a PPP secret for every active subscriber, then stamp the active
    /// router config with `now`.
    pub async fn push_secrets_at(&self, now: DateTime<Utc>) -> Result<PushReport, CoreError> {
        let subscribers = self
            .store
            .list_subscribers(Some(LifecycleState::Active))
            .await?;
        let mut report = PushReport::default();

        for subscriber in subscribers {
            let profile = self
                .store
                .get_package(subscriber.package_id)
                .await?
                .map_or_else(|| "default".to_owned(), |p| p.name);

            let secret = NewSecret {
                username: subscriber.ppp_username.clone(),
                password: SecretString::from(subscriber.ppp_secret.clone()),
                profile: Some(profile),
                remote_address: subscriber.ip_pool_hint.clone(),
                comment: Some(format!("Customer: {}", subscriber.display_name)),
            };

            match self.network.push_secret(&secret).await {
                Ok(()) => report.pushed += 1,
                Err(CoreError::NoActiveConfig) => return Err(CoreError::NoActiveConfig),
                Err(e) => {
                    warn!(subscriber = %subscriber.ppp_username, error = %e, "secret push failed");
                    report.failed += 1;
                    report.failures.push(PushFailure {
                        username: subscriber.ppp_username,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if let Some(config) = self.store.active_router_config().await? {
            self.store.stamp_router_sync(config.id, now).await?;
            report.synced_at = Some(now);
        }

        info!(
            pushed = report.pushed,
            failed = report.failed,
            "router secrets pushed"
        );
        Ok(report)
    }

    /// Match live PPP sessions against active subscribers.
    pub async fn presence(&self) -> Result<PresenceReport, CoreError> {
        let sessions = self.network.active_sessions().await?;
        let subscribers = self
            .store
            .list_subscribers(Some(LifecycleState::Active))
            .await?;

        let by_name: BTreeMap<&str, &ActiveConnection> =
            sessions.iter().map(|c| (c.name.as_str(), c)).collect();
        let known: HashSet<&str> = subscribers
            .iter()
            .map(|s| s.ppp_username.as_str())
            .collect();

        let mut report = PresenceReport::default();
        for subscriber in &subscribers {
            let session = by_name.get(subscriber.ppp_username.as_str());
            let entry = PresenceEntry {
                subscriber_id: subscriber.id,
                display_name: subscriber.display_name.clone(),
                ppp_username: subscriber.ppp_username.clone(),
                address: session.and_then(|c| c.address()).map(str::to_owned),
                uptime: session.and_then(|c| c.uptime()).map(str::to_owned),
            };
            if session.is_some() {
                report.online.push(entry);
            } else {
                report.offline.push(entry);
            }
        }
        report.unknown = sessions
            .iter()
            .filter(|c| !known.contains(c.name.as_str()))
            .map(|c| c.name.clone())
            .collect();

        Ok(report)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    use crate::model::{NewPackage, NewSubscriber, PackageStatus, RouterConfigDraft};
    use crate::store::MemoryStore;

    #[derive(Default)]
    struct FakeRouter {
        pushed: Mutex<Vec<NewSecret>>,
        reject: Option<&'static str>,
        sessions: Vec<ActiveConnection>,
    }

    impl NetworkSync for FakeRouter {
        async fn set_secret_enabled(&self, _: &str, _: bool) -> Result<SecretChange, CoreError> {
            Ok(SecretChange::Applied)
        }

        async fn push_secret(&self, secret: &NewSecret) -> Result<(), CoreError> {
            if self.reject == Some(secret.username.as_str()) {
                return Err(CoreError::NetworkSyncFailed {
                    reason: "already exists".into(),
                });
            }
            self.pushed.lock().unwrap().push(secret.clone());
            Ok(())
        }

        async fn active_sessions(&self) -> Result<Vec<ActiveConnection>, CoreError> {
            Ok(self.sessions.clone())
        }
    }

    async fn store_with(names: &[&str]) -> MemoryStore {
        let store = MemoryStore::new();
        let package = store
            .insert_package(NewPackage {
                name: "Home-20M".into(),
                price: Decimal::from(200_000),
                bandwidth_label: None,
                description: None,
                status: PackageStatus::Active,
            })
            .await
            .unwrap();
        for name in names {
            store
                .insert_subscriber(NewSubscriber {
                    display_name: (*name).to_owned(),
                    address: None,
                    contact: None,
                    ppp_username: name.to_lowercase(),
                    ppp_secret: "Secret12".into(),
                    package_id: package.id,
                    ip_pool_hint: Some("10.20.0.0/24".into()),
                    state: LifecycleState::Active,
                    registered_at: Utc::now(),
                    note: None,
                })
                .await
                .unwrap();
        }
        store
    }

    fn session(name: &str) -> ActiveConnection {
        let mut attributes = BTreeMap::new();
        attributes.insert("name".to_owned(), name.to_owned());
        attributes.insert("address".to_owned(), "10.20.0.9".to_owned());
        ActiveConnection {
            name: name.to_owned(),
            attributes,
        }
    }

    #[tokio::test]
    async fn push_uses_package_profile_and_stamps_active_config() {
        let store = store_with(&["Andi", "Sari"]).await;
        let config = store
            .upsert_router_config(RouterConfigDraft {
                name: "core".into(),
                host: "10.0.0.1".into(),
                port: 8728,
                username: "admin".into(),
                secret: None,
                description: None,
            })
            .await
            .unwrap();
        store.activate_router_config(config.id).await.unwrap();

        let router = FakeRouter {
            reject: Some("sari"),
            ..FakeRouter::default()
        };
        let sync = RouterSync::new(store.clone(), router);
        let now = Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap();
        let report = sync.push_secrets_at(now).await.unwrap();

        assert_eq!(report.pushed, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.failures[0].username, "sari");

        let pushed = sync.network.pushed.lock().unwrap();
        assert_eq!(pushed[0].profile.as_deref(), Some("Home-20M"));
        assert_eq!(pushed[0].remote_address.as_deref(), Some("10.20.0.0/24"));
        assert_eq!(pushed[0].comment.as_deref(), Some("Customer: Andi"));

        let stamped = store.find_router_config("core").await.unwrap().unwrap();
        assert_eq!(stamped.last_sync_at, Some(now));
    }

    #[tokio::test]
    async fn presence_splits_online_and_offline() {
        let store = store_with(&["Andi", "Sari"]).await;
        let router = FakeRouter {
            sessions: vec![session("sari"), session("stranger")],
            ..FakeRouter::default()
        };
        let report = RouterSync::new(store, router).presence().await.unwrap();

        let online: Vec<_> = report.online.iter().map(|e| e.ppp_username.as_str()).collect();
        let offline: Vec<_> = report.offline.iter().map(|e| e.ppp_username.as_str()).collect();
        assert_eq!(online, ["sari"]);
        assert_eq!(offline, ["andi"]);
        assert_eq!(report.online[0].address.as_deref(), Some("10.20.0.9"));
        assert_eq!(report.unknown, ["stranger"]);
    }
}
