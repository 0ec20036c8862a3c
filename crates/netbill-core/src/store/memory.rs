// ── In-memory record store ──
//
// `DashMap` tables give concurrent O(1) reads. Writes that touch more than
// one record, or that must check an invariant before inserting, serialize
// on a single write lock so they are atomic with respect to each other.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;

use crate::error::CoreError;
use crate::model::{
    Bill, BillId, BillStatus, LifecycleState, NewBill, NewPackage, NewPayment, NewSubscriber,
    Package, PackageId, Payment, PaymentId, RouterConfig, RouterConfigDraft, RouterConfigId,
    Subscriber, SubscriberId,
};
use crate::repository::{
    BillFilter, BillRepository, PackageRepository, PaymentRepository, RouterConfigRepository,
    SubscriberRepository,
};

use super::snapshot::Snapshot;

/// Monotonic id allocator for one table.
#[derive(Debug, Default)]
struct Sequence(AtomicU64);

impl Sequence {
    fn starting_after(last: u64) -> Self {
        Self(AtomicU64::new(last))
    }

    fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[derive(Debug, Default)]
struct Tables {
    subscribers: DashMap<SubscriberId, Subscriber>,
    packages: DashMap<PackageId, Package>,
    bills: DashMap<BillId, Bill>,
    payments: DashMap<PaymentId, Payment>,
    routers: DashMap<RouterConfigId, RouterConfig>,

    subscriber_seq: Sequence,
    package_seq: Sequence,
    bill_seq: Sequence,
    payment_seq: Sequence,
    router_seq: Sequence,

    write_lock: Mutex<()>,
}

/// Shared handle to the in-memory tables. Cloning is cheap.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Tables>,
}

fn sorted_by_id<K: Ord + Copy, V: Clone>(map: &DashMap<K, V>) -> Vec<V>
where
    K: std::hash::Hash + Eq,
{
    let mut rows: Vec<(K, V)> = map
        .iter()
        .map(|r| (*r.key(), r.value().clone()))
        .collect();
    rows.sort_by_key(|(k, _)| *k);
    rows.into_iter().map(|(_, v)| v).collect()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from a snapshot, continuing id sequences after the
    /// highest id present.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        fn last<T>(rows: &[T], id: impl Fn(&T) -> u64) -> u64 {
            rows.iter().map(id).max().unwrap_or(0)
        }

        let tables = Tables {
            subscriber_seq: Sequence::starting_after(last(&snapshot.subscribers, |s| s.id.get())),
            package_seq: Sequence::starting_after(last(&snapshot.packages, |p| p.id.get())),
            bill_seq: Sequence::starting_after(last(&snapshot.bills, |b| b.id.get())),
            payment_seq: Sequence::starting_after(last(&snapshot.payments, |p| p.id.get())),
            router_seq: Sequence::starting_after(last(&snapshot.routers, |r| r.id.get())),
            ..Tables::default()
        };

        for s in snapshot.subscribers {
            tables.subscribers.insert(s.id, s);
        }
        for p in snapshot.packages {
            tables.packages.insert(p.id, p);
        }
        for b in snapshot.bills {
            tables.bills.insert(b.id, b);
        }
        for p in snapshot.payments {
            tables.payments.insert(p.id, p);
        }
        for r in snapshot.routers {
            tables.routers.insert(r.id, r);
        }

        Self {
            tables: Arc::new(tables),
        }
    }

    /// Copy every table into a serializable snapshot, rows ordered by id.
    pub fn snapshot(&self) -> Snapshot {
        let t = &self.tables;
        Snapshot {
            subscribers: sorted_by_id(&t.subscribers),
            packages: sorted_by_id(&t.packages),
            bills: sorted_by_id(&t.bills),
            payments: sorted_by_id(&t.payments),
            routers: sorted_by_id(&t.routers),
            ..Snapshot::default()
        }
    }

    fn write_guard(&self) -> MutexGuard<'_, ()> {
        self.tables
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn paid_total(&self, bill: BillId) -> Decimal {
        self.tables
            .payments
            .iter()
            .filter(|p| p.bill_id == bill)
            .map(|p| p.amount)
            .sum()
    }
}

// ── Subscribers ──────────────────────────────────────────────────────

impl SubscriberRepository for MemoryStore {
    async fn get_subscriber(&self, id: SubscriberId) -> Result<Option<Subscriber>, CoreError> {
        Ok(self.tables.subscribers.get(&id).map(|r| r.value().clone()))
    }

    async fn find_subscriber_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Subscriber>, CoreError> {
        Ok(self
            .tables
            .subscribers
            .iter()
            .find(|s| s.ppp_username == username)
            .map(|r| r.value().clone()))
    }

    async fn list_subscribers(
        &self,
        state: Option<LifecycleState>,
    ) -> Result<Vec<Subscriber>, CoreError> {
        let mut rows = sorted_by_id(&self.tables.subscribers);
        if let Some(state) = state {
            rows.retain(|s| s.state == state);
        }
        Ok(rows)
    }

    async fn insert_subscriber(&self, new: NewSubscriber) -> Result<Subscriber, CoreError> {
        let _guard = self.write_guard();

        let taken = self
            .tables
            .subscribers
            .iter()
            .any(|s| s.ppp_username == new.ppp_username);
        if taken {
            return Err(CoreError::UsernameTaken {
                username: new.ppp_username,
            });
        }

        let subscriber = Subscriber {
            id: SubscriberId::new(self.tables.subscriber_seq.next()),
            display_name: new.display_name,
            address: new.address,
            contact: new.contact,
            ppp_username: new.ppp_username,
            ppp_secret: new.ppp_secret,
            package_id: new.package_id,
            ip_pool_hint: new.ip_pool_hint,
            state: new.state,
            registered_at: new.registered_at,
            note: new.note,
        };
        self.tables
            .subscribers
            .insert(subscriber.id, subscriber.clone());
        Ok(subscriber)
    }

    async fn set_subscriber_state(
        &self,
        id: SubscriberId,
        state: LifecycleState,
        note: Option<String>,
    ) -> Result<Subscriber, CoreError> {
        let _guard = self.write_guard();

        let mut entry = self
            .tables
            .subscribers
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("Subscriber", id))?;
        entry.state = state;
        if note.is_some() {
            entry.note = note;
        }
        Ok(entry.clone())
    }

    async fn transition_subscriber_state(
        &self,
        id: SubscriberId,
        from: LifecycleState,
        to: LifecycleState,
        note: Option<String>,
    ) -> Result<Option<Subscriber>, CoreError> {
        let _guard = self.write_guard();

        let mut entry = self
            .tables
            .subscribers
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("Subscriber", id))?;
        if entry.state != from {
            return Ok(None);
        }
        entry.state = to;
        if note.is_some() {
            entry.note = note;
        }
        Ok(Some(entry.clone()))
    }
}

// ── Packages ─────────────────────────────────────────────────────────

impl PackageRepository for MemoryStore {
    async fn get_package(&self, id: PackageId) -> Result<Option<Package>, CoreError> {
        Ok(self.tables.packages.get(&id).map(|r| r.value().clone()))
    }

    async fn list_packages(&self) -> Result<Vec<Package>, CoreError> {
        Ok(sorted_by_id(&self.tables.packages))
    }

    async fn insert_package(&self, new: NewPackage) -> Result<Package, CoreError> {
        let package = Package {
            id: PackageId::new(self.tables.package_seq.next()),
            name: new.name,
            price: new.price,
            bandwidth_label: new.bandwidth_label,
            description: new.description,
            status: new.status,
        };
        self.tables.packages.insert(package.id, package.clone());
        Ok(package)
    }

    async fn delete_package(&self, id: PackageId) -> Result<(), CoreError> {
        let _guard = self.write_guard();

        let name = self
            .tables
            .packages
            .get(&id)
            .map(|p| p.name.clone())
            .ok_or_else(|| CoreError::not_found("Package", id))?;

        let subscribers = self
            .tables
            .subscribers
            .iter()
            .filter(|s| s.package_id == id)
            .count();
        if subscribers > 0 {
            return Err(CoreError::PackageInUse {
                package: name,
                subscribers,
            });
        }

        self.tables.packages.remove(&id);
        Ok(())
    }
}

// ── Bills ────────────────────────────────────────────────────────────

impl BillRepository for MemoryStore {
    async fn get_bill(&self, id: BillId) -> Result<Option<Bill>, CoreError> {
        Ok(self.tables.bills.get(&id).map(|r| r.value().clone()))
    }

    async fn list_bills(&self, filter: &BillFilter) -> Result<Vec<Bill>, CoreError> {
        let mut rows = sorted_by_id(&self.tables.bills);
        rows.retain(|b| filter.matches(b));
        Ok(rows)
    }

    async fn insert_bill(&self, new: NewBill) -> Result<Bill, CoreError> {
        let _guard = self.write_guard();

        if !self.tables.subscribers.contains_key(&new.subscriber_id) {
            return Err(CoreError::not_found("Subscriber", new.subscriber_id));
        }

        let duplicate = self
            .tables
            .bills
            .iter()
            .any(|b| b.subscriber_id == new.subscriber_id && b.period == new.period);
        if duplicate {
            return Err(CoreError::DuplicateBill {
                subscriber: new.subscriber_id.to_string(),
                period: new.period.to_string(),
            });
        }

        let bill = Bill {
            id: BillId::new(self.tables.bill_seq.next()),
            subscriber_id: new.subscriber_id,
            period: new.period,
            amount: new.amount,
            due_date: new.due_date,
            status: BillStatus::Unpaid,
            note: new.note,
        };
        self.tables.bills.insert(bill.id, bill.clone());
        Ok(bill)
    }

    async fn set_bill_status(&self, id: BillId, status: BillStatus) -> Result<Bill, CoreError> {
        let _guard = self.write_guard();

        let mut entry = self
            .tables
            .bills
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("Bill", id))?;
        entry.status = status;
        Ok(entry.clone())
    }

    async fn transition_bill_status(
        &self,
        id: BillId,
        from: BillStatus,
        to: BillStatus,
    ) -> Result<Option<Bill>, CoreError> {
        let _guard = self.write_guard();

        let mut entry = self
            .tables
            .bills
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("Bill", id))?;
        if entry.status != from {
            return Ok(None);
        }
        entry.status = to;
        Ok(Some(entry.clone()))
    }
}

// ── Payments ─────────────────────────────────────────────────────────

impl PaymentRepository for MemoryStore {
    async fn list_payments(&self, bill: BillId) -> Result<Vec<Payment>, CoreError> {
        let mut rows = sorted_by_id(&self.tables.payments);
        rows.retain(|p| p.bill_id == bill);
        Ok(rows)
    }

    async fn record_payment(&self, new: NewPayment) -> Result<(Payment, Bill), CoreError> {
        let _guard = self.write_guard();

        let status = self
            .tables
            .bills
            .get(&new.bill_id)
            .map(|b| b.status)
            .ok_or_else(|| CoreError::not_found("Bill", new.bill_id))?;
        if status == BillStatus::Paid {
            return Err(CoreError::validation(format!(
                "bill {} is already paid",
                new.bill_id
            )));
        }

        let payment = Payment {
            id: PaymentId::new(self.tables.payment_seq.next()),
            bill_id: new.bill_id,
            paid_on: new.paid_on,
            amount: new.amount,
            method: new.method,
            proof_ref: new.proof_ref,
            note: new.note,
        };
        self.tables.payments.insert(payment.id, payment.clone());

        let total = self.paid_total(payment.bill_id);
        let mut bill = self
            .tables
            .bills
            .get_mut(&payment.bill_id)
            .ok_or_else(|| CoreError::not_found("Bill", payment.bill_id))?;
        if total >= bill.amount {
            bill.status = BillStatus::Paid;
        }
        Ok((payment, bill.clone()))
    }

    async fn delete_payment(&self, id: PaymentId) -> Result<Bill, CoreError> {
        let _guard = self.write_guard();

        let (_, payment) = self
            .tables
            .payments
            .remove(&id)
            .ok_or_else(|| CoreError::not_found("Payment", id))?;

        let total = self.paid_total(payment.bill_id);
        let mut bill = self
            .tables
            .bills
            .get_mut(&payment.bill_id)
            .ok_or_else(|| CoreError::not_found("Bill", payment.bill_id))?;
        if bill.status == BillStatus::Paid && total < bill.amount {
            bill.status = BillStatus::Unpaid;
        }
        Ok(bill.clone())
    }
}

// ── Router configs ───────────────────────────────────────────────────

impl RouterConfigRepository for MemoryStore {
    async fn list_router_configs(&self) -> Result<Vec<RouterConfig>, CoreError> {
        Ok(sorted_by_id(&self.tables.routers))
    }

    async fn find_router_config(&self, name: &str) -> Result<Option<RouterConfig>, CoreError> {
        Ok(self
            .tables
            .routers
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.value().clone()))
    }

    async fn active_router_config(&self) -> Result<Option<RouterConfig>, CoreError> {
        Ok(self
            .tables
            .routers
            .iter()
            .find(|r| r.is_active)
            .map(|r| r.value().clone()))
    }

    async fn upsert_router_config(
        &self,
        draft: RouterConfigDraft,
    ) -> Result<RouterConfig, CoreError> {
        let _guard = self.write_guard();

        let existing = self
            .tables
            .routers
            .iter()
            .find(|r| r.name == draft.name)
            .map(|r| r.value().clone());

        let config = match existing {
            Some(current) => RouterConfig {
                host: draft.host,
                port: draft.port,
                username: draft.username,
                secret: draft.secret.or(current.secret),
                description: draft.description.or(current.description),
                ..current
            },
            None => RouterConfig {
                id: RouterConfigId::new(self.tables.router_seq.next()),
                name: draft.name,
                host: draft.host,
                port: draft.port,
                username: draft.username,
                secret: draft.secret,
                is_active: false,
                description: draft.description,
                last_sync_at: None,
            },
        };
        self.tables.routers.insert(config.id, config.clone());
        Ok(config)
    }

    async fn activate_router_config(&self, id: RouterConfigId) -> Result<RouterConfig, CoreError> {
        let _guard = self.write_guard();

        if !self.tables.routers.contains_key(&id) {
            return Err(CoreError::not_found("Router config", id));
        }
        for mut entry in self.tables.routers.iter_mut() {
            entry.is_active = entry.id == id;
        }
        self.tables
            .routers
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or_else(|| CoreError::not_found("Router config", id))
    }

    async fn stamp_router_sync(
        &self,
        id: RouterConfigId,
        at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let mut entry = self
            .tables
            .routers
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("Router config", id))?;
        entry.last_sync_at = Some(at);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    use crate::model::{PackageStatus, PaymentMethod, Period};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn seeded() -> (MemoryStore, Subscriber) {
        let store = MemoryStore::new();
        let package = store
            .insert_package(NewPackage {
                name: "Home 10M".into(),
                price: Decimal::from(150_000),
                bandwidth_label: Some("10 Mbps".into()),
                description: None,
                status: PackageStatus::Active,
            })
            .await
            .unwrap();
        let subscriber = store
            .insert_subscriber(NewSubscriber {
                display_name: "Budi Santoso".into(),
                address: None,
                contact: None,
                ppp_username: "budisantoso".into(),
                ppp_secret: "Xy12Ab34".into(),
                package_id: package.id,
                ip_pool_hint: None,
                state: LifecycleState::Active,
                registered_at: Utc::now(),
                note: None,
            })
            .await
            .unwrap();
        (store, subscriber)
    }

    fn bill_for(subscriber: SubscriberId) -> NewBill {
        NewBill {
            subscriber_id: subscriber,
            period: Period::new(2025, 1).unwrap(),
            amount: Decimal::from(150_000),
            due_date: date(2025, 1, 8),
            note: None,
        }
    }

    fn payment(bill: BillId, amount: Decimal) -> NewPayment {
        NewPayment {
            bill_id: bill,
            paid_on: date(2025, 1, 5),
            amount,
            method: PaymentMethod::Cash,
            proof_ref: None,
            note: None,
        }
    }

    #[tokio::test]
    async fn ids_are_sequential() {
        let (store, subscriber) = seeded().await;
        assert_eq!(subscriber.id.get(), 1);
        let bill = store.insert_bill(bill_for(subscriber.id)).await.unwrap();
        assert_eq!(bill.id.get(), 1);
        assert_eq!(bill.status, BillStatus::Unpaid);
    }

    #[tokio::test]
    async fn duplicate_bill_rejected() {
        let (store, subscriber) = seeded().await;
        store.insert_bill(bill_for(subscriber.id)).await.unwrap();
        let err = store.insert_bill(bill_for(subscriber.id)).await.unwrap_err();
        assert!(matches!(err, CoreError::DuplicateBill { .. }));
        assert_eq!(store.list_bills(&BillFilter::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_username_rejected() {
        let (store, subscriber) = seeded().await;
        let err = store
            .insert_subscriber(NewSubscriber {
                display_name: "Budi S".into(),
                address: None,
                contact: None,
                ppp_username: subscriber.ppp_username.clone(),
                ppp_secret: "x".into(),
                package_id: subscriber.package_id,
                ip_pool_hint: None,
                state: LifecycleState::Active,
                registered_at: Utc::now(),
                note: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::UsernameTaken { .. }));
    }

    #[tokio::test]
    async fn settlement_requires_full_amount() {
        let (store, subscriber) = seeded().await;
        let bill = store.insert_bill(bill_for(subscriber.id)).await.unwrap();

        let (_, after_first) = store
            .record_payment(payment(bill.id, Decimal::from(100_000)))
            .await
            .unwrap();
        assert_eq!(after_first.status, BillStatus::Unpaid);

        let (second, after_second) = store
            .record_payment(payment(bill.id, Decimal::from(50_000)))
            .await
            .unwrap();
        assert_eq!(after_second.status, BillStatus::Paid);

        let reverted = store.delete_payment(second.id).await.unwrap();
        assert_eq!(reverted.status, BillStatus::Unpaid);
        assert_eq!(store.list_payments(bill.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn paid_bill_rejects_further_payments() {
        let (store, subscriber) = seeded().await;
        let bill = store.insert_bill(bill_for(subscriber.id)).await.unwrap();
        store
            .record_payment(payment(bill.id, Decimal::from(150_000)))
            .await
            .unwrap();

        let err = store
            .record_payment(payment(bill.id, Decimal::from(150_000)))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ValidationFailed { .. }));
        assert_eq!(store.list_payments(bill.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn bill_transition_skips_settled_bill() {
        let (store, subscriber) = seeded().await;
        let bill = store.insert_bill(bill_for(subscriber.id)).await.unwrap();
        store
            .record_payment(payment(bill.id, Decimal::from(150_000)))
            .await
            .unwrap();

        let moved = store
            .transition_bill_status(bill.id, BillStatus::Unpaid, BillStatus::Overdue)
            .await
            .unwrap();
        assert!(moved.is_none());
        assert_eq!(
            store.get_bill(bill.id).await.unwrap().unwrap().status,
            BillStatus::Paid
        );
    }

    #[tokio::test]
    async fn subscriber_transition_requires_expected_state() {
        let (store, subscriber) = seeded().await;

        let suspended = store
            .transition_subscriber_state(
                subscriber.id,
                LifecycleState::Active,
                LifecycleState::Suspended,
                Some("overdue".into()),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(suspended.state, LifecycleState::Suspended);
        assert_eq!(suspended.note.as_deref(), Some("overdue"));

        let again = store
            .transition_subscriber_state(
                subscriber.id,
                LifecycleState::Active,
                LifecycleState::Inactive,
                None,
            )
            .await
            .unwrap();
        assert!(again.is_none());
        assert_eq!(
            store.get_subscriber(subscriber.id).await.unwrap().unwrap().state,
            LifecycleState::Suspended
        );
    }

    #[tokio::test]
    async fn package_in_use_cannot_be_deleted() {
        let (store, subscriber) = seeded().await;
        let err = store.delete_package(subscriber.package_id).await.unwrap_err();
        assert!(matches!(err, CoreError::PackageInUse { subscribers: 1, .. }));

        let spare = store
            .insert_package(NewPackage {
                name: "Spare".into(),
                price: Decimal::from(1),
                bandwidth_label: None,
                description: None,
                status: PackageStatus::Inactive,
            })
            .await
            .unwrap();
        store.delete_package(spare.id).await.unwrap();
        assert!(store.get_package(spare.id).await.unwrap().is_none());
    }

    fn draft(name: &str) -> RouterConfigDraft {
        RouterConfigDraft {
            name: name.into(),
            host: "10.0.0.1".into(),
            port: 8728,
            username: "admin".into(),
            secret: None,
            description: None,
        }
    }

    #[tokio::test]
    async fn activation_is_exclusive() {
        let store = MemoryStore::new();
        let a = store.upsert_router_config(draft("a")).await.unwrap();
        let b = store.upsert_router_config(draft("b")).await.unwrap();

        store.activate_router_config(a.id).await.unwrap();
        store.activate_router_config(b.id).await.unwrap();

        let active: Vec<_> = store
            .list_router_configs()
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.is_active)
            .map(|r| r.name)
            .collect();
        assert_eq!(active, ["b"]);
    }

    #[tokio::test]
    async fn upsert_preserves_activation() {
        let store = MemoryStore::new();
        let a = store.upsert_router_config(draft("a")).await.unwrap();
        store.activate_router_config(a.id).await.unwrap();

        let mut changed = draft("a");
        changed.host = "10.0.0.2".into();
        let updated = store.upsert_router_config(changed).await.unwrap();
        assert_eq!(updated.id, a.id);
        assert!(updated.is_active);
        assert_eq!(updated.host, "10.0.0.2");
    }

    #[tokio::test]
    async fn snapshot_restores_sequences() {
        let (store, subscriber) = seeded().await;
        store.insert_bill(bill_for(subscriber.id)).await.unwrap();

        let restored = MemoryStore::from_snapshot(store.snapshot());
        let mut next = bill_for(subscriber.id);
        next.period = Period::new(2025, 2).unwrap();
        let bill = restored.insert_bill(next).await.unwrap();
        assert_eq!(bill.id.get(), 2);
    }
}
