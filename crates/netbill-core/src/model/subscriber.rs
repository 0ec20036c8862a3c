// ── Subscriber domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::ids::{PackageId, SubscriberId};

/// Lifecycle state controlling billing eligibility and network access.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LifecycleState {
    Active,
    Inactive,
    Suspended,
}

/// A PPP subscriber.
///
/// `ppp_username` is derived once at registration and never regenerated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: SubscriberId,
    pub display_name: String,
    pub address: Option<String>,
    pub contact: Option<String>,
    pub ppp_username: String,
    pub ppp_secret: String,
    pub package_id: PackageId,
    /// Remote address handed to the router when the secret is pushed.
    pub ip_pool_hint: Option<String>,
    pub state: LifecycleState,
    pub registered_at: DateTime<Utc>,
    pub note: Option<String>,
}

impl Subscriber {
    pub fn is_active(&self) -> bool {
        self.state == LifecycleState::Active
    }

    pub fn is_suspended(&self) -> bool {
        self.state == LifecycleState::Suspended
    }
}

/// Fields supplied when inserting a subscriber; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewSubscriber {
    pub display_name: String,
    pub address: Option<String>,
    pub contact: Option<String>,
    pub ppp_username: String,
    pub ppp_secret: String,
    pub package_id: PackageId,
    pub ip_pool_hint: Option<String>,
    pub state: LifecycleState,
    pub registered_at: DateTime<Utc>,
    pub note: Option<String>,
}
