// ── Record repositories ──
//
// Async ports the services read and write through. Multi-record writes
// (unique bill insert, payment settlement, config activation, guarded
// package delete) are single repository calls so an implementation can
// make them atomic.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::error::CoreError;
use crate::model::{
    Bill, BillId, BillStatus, LifecycleState, NewBill, NewPackage, NewPayment, NewSubscriber,
    Package, PackageId, Payment, PaymentId, Period, RouterConfig, RouterConfigDraft,
    RouterConfigId, Subscriber, SubscriberId,
};

/// Selection criteria for [`BillRepository::list_bills`]. Empty matches all.
#[derive(Debug, Clone, Default)]
pub struct BillFilter {
    pub subscriber: Option<SubscriberId>,
    pub period: Option<Period>,
    /// Any of these statuses; empty means any status.
    pub statuses: Vec<BillStatus>,
}

impl BillFilter {
    pub fn subscriber(mut self, id: SubscriberId) -> Self {
        self.subscriber = Some(id);
        self
    }

    pub fn period(mut self, period: Period) -> Self {
        self.period = Some(period);
        self
    }

    pub fn status(mut self, status: BillStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn matches(&self, bill: &Bill) -> bool {
        self.subscriber.is_none_or(|id| bill.subscriber_id == id)
            && self.period.is_none_or(|p| bill.period == p)
            && (self.statuses.is_empty() || self.statuses.contains(&bill.status))
    }
}

pub trait SubscriberRepository: Send + Sync {
    fn get_subscriber(
        &self,
        id: SubscriberId,
    ) -> impl Future<Output = Result<Option<Subscriber>, CoreError>> + Send;

    fn find_subscriber_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<Subscriber>, CoreError>> + Send;

    /// Subscribers ordered by id, optionally restricted to one state.
    fn list_subscribers(
        &self,
        state: Option<LifecycleState>,
    ) -> impl Future<Output = Result<Vec<Subscriber>, CoreError>> + Send;

    /// Fails with `UsernameTaken` if the PPP username is already in use.
    fn insert_subscriber(
        &self,
        subscriber: NewSubscriber,
    ) -> impl Future<Output = Result<Subscriber, CoreError>> + Send;

    /// Change the lifecycle state; `note` replaces the current note when set.
    fn set_subscriber_state(
        &self,
        id: SubscriberId,
        state: LifecycleState,
        note: Option<String>,
    ) -> impl Future<Output = Result<Subscriber, CoreError>> + Send;

    /// Move a subscriber from `from` to `to` in one step. `Ok(None)` when
    /// the subscriber is no longer in `from`; nothing is written then.
    fn transition_subscriber_state(
        &self,
        id: SubscriberId,
        from: LifecycleState,
        to: LifecycleState,
        note: Option<String>,
    ) -> impl Future<Output = Result<Option<Subscriber>, CoreError>> + Send;
}

pub trait PackageRepository: Send + Sync {
    fn get_package(
        &self,
        id: PackageId,
    ) -> impl Future<Output = Result<Option<Package>, CoreError>> + Send;

    fn list_packages(&self) -> impl Future<Output = Result<Vec<Package>, CoreError>> + Send;

    fn insert_package(
        &self,
        package: NewPackage,
    ) -> impl Future<Output = Result<Package, CoreError>> + Send;

    /// Fails with `PackageInUse` while any subscriber references the package.
    fn delete_package(&self, id: PackageId) -> impl Future<Output = Result<(), CoreError>> + Send;
}

pub trait BillRepository: Send + Sync {
    fn get_bill(&self, id: BillId) -> impl Future<Output = Result<Option<Bill>, CoreError>> + Send;

    /// Bills matching `filter`, ordered by id.
    fn list_bills(
        &self,
        filter: &BillFilter,
    ) -> impl Future<Output = Result<Vec<Bill>, CoreError>> + Send;

    /// Insert an unpaid bill. Fails with `DuplicateBill` if the subscriber
    /// already has a bill for the period.
    fn insert_bill(&self, bill: NewBill) -> impl Future<Output = Result<Bill, CoreError>> + Send;

    fn set_bill_status(
        &self,
        id: BillId,
        status: BillStatus,
    ) -> impl Future<Output = Result<Bill, CoreError>> + Send;

    /// Move a bill from `from` to `to` in one step. `Ok(None)` when the bill
    /// is no longer in `from`, e.g. a payment settled it in the meantime.
    fn transition_bill_status(
        &self,
        id: BillId,
        from: BillStatus,
        to: BillStatus,
    ) -> impl Future<Output = Result<Option<Bill>, CoreError>> + Send;
}

pub trait PaymentRepository: Send + Sync {
    fn list_payments(
        &self,
        bill: BillId,
    ) -> impl Future<Output = Result<Vec<Payment>, CoreError>> + Send;

    /// Store a payment and settle its bill in one step: the bill becomes
    /// `paid` once the payments against it reach its amount. Fails with
    /// `ValidationFailed` if the bill is already paid.
    fn record_payment(
        &self,
        payment: NewPayment,
    ) -> impl Future<Output = Result<(Payment, Bill), CoreError>> + Send;

    /// Remove a payment and re-evaluate its bill: a `paid` bill whose
    /// payments no longer cover the amount reverts to `unpaid`.
    fn delete_payment(&self, id: PaymentId)
    -> impl Future<Output = Result<Bill, CoreError>> + Send;
}

pub trait RouterConfigRepository: Send + Sync {
    fn list_router_configs(
        &self,
    ) -> impl Future<Output = Result<Vec<RouterConfig>, CoreError>> + Send;

    fn find_router_config(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<RouterConfig>, CoreError>> + Send;

    fn active_router_config(
        &self,
    ) -> impl Future<Output = Result<Option<RouterConfig>, CoreError>> + Send;

    /// Create or update the config named `draft.name`. Activation state and
    /// `last_sync_at` of an existing record are preserved.
    fn upsert_router_config(
        &self,
        draft: RouterConfigDraft,
    ) -> impl Future<Output = Result<RouterConfig, CoreError>> + Send;

    /// Make `id` the only active config.
    fn activate_router_config(
        &self,
        id: RouterConfigId,
    ) -> impl Future<Output = Result<RouterConfig, CoreError>> + Send;

    fn stamp_router_sync(
        &self,
        id: RouterConfigId,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;
}

/// Everything the billing services read and write.
pub trait BillingStore:
    SubscriberRepository + PackageRepository + BillRepository + PaymentRepository + RouterConfigRepository
{
}

impl<T> BillingStore for T where
    T: SubscriberRepository
        + PackageRepository
        + BillRepository
        + PaymentRepository
        + RouterConfigRepository
{
}
