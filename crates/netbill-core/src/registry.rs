// ── Reference data registry ──
//
// Operator-managed records: subscriber registration, packages, and router
// configurations.

use chrono::Utc;
use netbill_api::{ConnectionTest, RouterClient, TransportConfig};
use rand::Rng;
use rand::distr::Alphanumeric;
use rust_decimal::Decimal;
use tracing::info;

use crate::error::CoreError;
use crate::model::{
    LifecycleState, NewPackage, NewSubscriber, Package, PackageId, RouterConfig,
    RouterConfigDraft, Subscriber, SubscriberId,
};
use crate::repository::{PackageRepository, RouterConfigRepository, SubscriberRepository};

/// Length of generated PPP secrets.
pub const PPP_SECRET_LEN: usize = 8;

/// Suffixes tried before giving up on a username (`001` .. `999`).
const MAX_DISAMBIGUATOR: u32 = 999;

/// Operator input for a new subscriber.
#[derive(Debug, Clone)]
pub struct Registration {
    pub display_name: String,
    pub address: Option<String>,
    pub contact: Option<String>,
    pub package_id: PackageId,
    pub ip_pool_hint: Option<String>,
    pub note: Option<String>,
}

/// Username base for a display name: lowercased, whitespace removed.
///
/// Every Unicode whitespace character is removed, not only spaces.
pub fn username_base(display_name: &str) -> String {
    display_name
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Random alphanumeric PPP secret.
pub fn generate_ppp_secret() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(PPP_SECRET_LEN)
        .map(char::from)
        .collect()
}

pub struct Registry<S> {
    store: S,
}

impl<S> Registry<S>
where
    S: SubscriberRepository + PackageRepository + RouterConfigRepository,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    // ── Subscribers ──────────────────────────────────────────────────

    /// Register an active subscriber with a derived username and a fresh
    /// PPP secret. A taken username gets a `001`, `002`, ... suffix.
    pub async fn register_subscriber(
        &self,
        registration: Registration,
    ) -> Result<Subscriber, CoreError> {
        let base = username_base(&registration.display_name);
        if base.is_empty() {
            return Err(CoreError::validation("display name must not be blank"));
        }
        if self
            .store
            .get_package(registration.package_id)
            .await?
            .is_none()
        {
            return Err(CoreError::not_found("Package", registration.package_id));
        }

        let secret = generate_ppp_secret();
        let mut candidate = base.clone();
        let mut counter = 1;
        loop {
            let new = NewSubscriber {
                display_name: registration.display_name.clone(),
                address: registration.address.clone(),
                contact: registration.contact.clone(),
                ppp_username: candidate.clone(),
                ppp_secret: secret.clone(),
                package_id: registration.package_id,
                ip_pool_hint: registration.ip_pool_hint.clone(),
                state: LifecycleState::Active,
                registered_at: Utc::now(),
                note: registration.note.clone(),
            };
            match self.store.insert_subscriber(new).await {
                Ok(subscriber) => {
                    info!(
                        subscriber = %subscriber.id,
                        username = %subscriber.ppp_username,
                        "subscriber registered"
                    );
                    return Ok(subscriber);
                }
                Err(CoreError::UsernameTaken { .. }) if counter <= MAX_DISAMBIGUATOR => {
                    candidate = format!("{base}{counter:03}");
                    counter += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Manual switch between `active` and `inactive`. Suspension and
    /// reactivation belong to the billing engine.
    pub async fn set_subscriber_state(
        &self,
        id: SubscriberId,
        state: LifecycleState,
    ) -> Result<Subscriber, CoreError> {
        let subscriber = self
            .store
            .get_subscriber(id)
            .await?
            .ok_or_else(|| CoreError::not_found("Subscriber", id))?;

        if state == LifecycleState::Suspended {
            return Err(CoreError::validation(
                "suspension is applied by overdue processing",
            ));
        }
        if subscriber.is_suspended() {
            return Err(CoreError::validation(format!(
                "{} is suspended; settle the bills and reactivate instead",
                subscriber.ppp_username
            )));
        }

        let updated = self
            .store
            .transition_subscriber_state(id, subscriber.state, state, None)
            .await?
            .ok_or_else(|| {
                CoreError::validation(format!(
                    "{} changed state concurrently; retry",
                    subscriber.ppp_username
                ))
            })?;
        info!(subscriber = %updated.ppp_username, %state, "subscriber state changed");
        Ok(updated)
    }

    // ── Packages ─────────────────────────────────────────────────────

    pub async fn add_package(&self, package: NewPackage) -> Result<Package, CoreError> {
        if package.name.trim().is_empty() {
            return Err(CoreError::validation("package name must not be blank"));
        }
        if package.price < Decimal::ZERO {
            return Err(CoreError::validation("package price must not be negative"));
        }
        let package = self.store.insert_package(package).await?;
        info!(package = %package.id, name = %package.name, "package added");
        Ok(package)
    }

    /// Refused with `PackageInUse` while subscribers reference it.
    pub async fn delete_package(&self, id: PackageId) -> Result<(), CoreError> {
        self.store.delete_package(id).await?;
        info!(package = %id, "package deleted");
        Ok(())
    }

    // ── Router configs ───────────────────────────────────────────────

    /// Make the config named `name` the only active one.
    pub async fn activate_router(&self, name: &str) -> Result<RouterConfig, CoreError> {
        let config = self
            .store
            .find_router_config(name)
            .await?
            .ok_or_else(|| CoreError::not_found("Router config", name))?;
        let config = self.store.activate_router_config(config.id).await?;
        info!(router = %config.name, "router config activated");
        Ok(config)
    }

    /// Upsert a config, optionally activate it, then probe the router.
    /// A successful probe stamps `last_sync_at`.
    pub async fn save_router_config(
        &self,
        draft: RouterConfigDraft,
        activate: bool,
        transport: &TransportConfig,
    ) -> Result<(RouterConfig, ConnectionTest), CoreError> {
        let mut config = self.store.upsert_router_config(draft).await?;
        if activate {
            config = self.store.activate_router_config(config.id).await?;
        }

        let probe = match config.endpoint() {
            Ok(endpoint) => {
                RouterClient::new(Some(endpoint), transport.clone())
                    .test_connection()
                    .await
            }
            Err(e) => ConnectionTest {
                success: false,
                message: e.to_string(),
                raw_reply: None,
            },
        };

        if probe.success {
            let now = Utc::now();
            self.store.stamp_router_sync(config.id, now).await?;
            config.last_sync_at = Some(now);
        }
        info!(router = %config.name, success = probe.success, "router config saved");
        Ok((config, probe))
    }
}
