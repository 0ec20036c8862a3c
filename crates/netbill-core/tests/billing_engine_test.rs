#![allow(clippy::unwrap_used)]
// Integration tests for `BillingEngine` over the in-memory store.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use secrecy::SecretString;

use netbill_api::{
    ActiveConnection, NewSecret, RouterClient, RouterEndpoint, SecretChange, TransportConfig,
};
use netbill_core::repository::{
    BillRepository, PackageRepository, PaymentRepository, SubscriberRepository,
};
use netbill_core::{
    BillFilter, BillStatus, BillingEngine, CoreError, LifecycleState, MemoryStore, NetworkSync,
    NewBill, NewPackage, NewPayment, Notifier, PackageStatus, PaymentMethod, Period,
    ReactivationOutcome, ReminderIntent, Subscriber,
};

// ── Fakes ───────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeNetwork {
    calls: Mutex<Vec<(String, bool)>>,
    fail: bool,
    /// Fail only for this username.
    fail_for: Option<String>,
}

impl FakeNetwork {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn failing_for(username: &str) -> Self {
        Self {
            fail_for: Some(username.to_owned()),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<(String, bool)> {
        self.calls.lock().unwrap().clone()
    }
}

impl NetworkSync for &FakeNetwork {
    async fn set_secret_enabled(
        &self,
        username: &str,
        enabled: bool,
    ) -> Result<SecretChange, CoreError> {
        self.calls.lock().unwrap().push((username.to_owned(), enabled));
        if self.fail || self.fail_for.as_deref() == Some(username) {
            return Err(CoreError::NetworkSyncFailed {
                reason: "router unreachable".into(),
            });
        }
        Ok(SecretChange::Applied)
    }

    async fn push_secret(&self, _: &NewSecret) -> Result<(), CoreError> {
        Ok(())
    }

    async fn active_sessions(&self) -> Result<Vec<ActiveConnection>, CoreError> {
        Ok(Vec::new())
    }
}

/// Settles a bill in full while the router update for `trigger` is in
/// flight, standing in for a payment recorded during an overdue run.
struct SettlingNetwork {
    store: MemoryStore,
    trigger: String,
    payment: Mutex<Option<NewPayment>>,
    calls: Mutex<Vec<String>>,
}

impl NetworkSync for &SettlingNetwork {
    async fn set_secret_enabled(
        &self,
        username: &str,
        _enabled: bool,
    ) -> Result<SecretChange, CoreError> {
        self.calls.lock().unwrap().push(username.to_owned());
        if username == self.trigger {
            let payment = self.payment.lock().unwrap().take();
            if let Some(payment) = payment {
                self.store.record_payment(payment).await?;
            }
        }
        Ok(SecretChange::Applied)
    }

    async fn push_secret(&self, _: &NewSecret) -> Result<(), CoreError> {
        Ok(())
    }

    async fn active_sessions(&self) -> Result<Vec<ActiveConnection>, CoreError> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<ReminderIntent>>,
}

impl Notifier for &RecordingNotifier {
    async fn remind(&self, intent: &ReminderIntent) -> Result<(), CoreError> {
        self.sent.lock().unwrap().push(intent.clone());
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 20).unwrap()
}

fn days(offset: i64) -> NaiveDate {
    today() + chrono::Duration::days(offset)
}

async fn subscriber(store: &MemoryStore, name: &str, price: i64) -> Subscriber {
    let package = store
        .insert_package(NewPackage {
            name: format!("{name}-plan"),
            price: Decimal::from(price),
            bandwidth_label: None,
            description: None,
            status: PackageStatus::Active,
        })
        .await
        .unwrap();
    store
        .insert_subscriber(netbill_core::model::NewSubscriber {
            display_name: name.to_owned(),
            address: None,
            contact: Some(format!("{name}@example.net")),
            ppp_username: name.to_lowercase(),
            ppp_secret: "Pass1234".into(),
            package_id: package.id,
            ip_pool_hint: None,
            state: LifecycleState::Active,
            registered_at: Utc::now(),
            note: None,
        })
        .await
        .unwrap()
}

async fn bill_due(store: &MemoryStore, who: &Subscriber, due: NaiveDate, month: u32) {
    store
        .insert_bill(NewBill {
            subscriber_id: who.id,
            period: Period::new(2025, month).unwrap(),
            amount: Decimal::from(100_000),
            due_date: due,
            note: None,
        })
        .await
        .unwrap();
}

// ── Bill generation ─────────────────────────────────────────────────

#[tokio::test]
async fn generation_is_idempotent() {
    let store = MemoryStore::new();
    let andi = subscriber(&store, "Andi", 150_000).await;
    subscriber(&store, "Sari", 250_000).await;
    let idle = subscriber(&store, "Idle", 99_000).await;
    store
        .set_subscriber_state(idle.id, LifecycleState::Inactive, None)
        .await
        .unwrap();

    let network = FakeNetwork::default();
    let engine = BillingEngine::new(store.clone(), &network);

    let first = engine.generate_monthly_bills_on(today()).await.unwrap();
    assert_eq!(first.period.to_string(), "2025-03");
    assert_eq!((first.created, first.skipped, first.failed), (2, 0, 0));

    let second = engine.generate_monthly_bills_on(today()).await.unwrap();
    assert_eq!((second.created, second.skipped), (0, 2));

    let bills = store
        .list_bills(&BillFilter::default().subscriber(andi.id))
        .await
        .unwrap();
    assert_eq!(bills.len(), 1);
    assert_eq!(bills[0].amount, Decimal::from(150_000));
    assert_eq!(bills[0].due_date, days(7));
    assert_eq!(bills[0].status, BillStatus::Unpaid);
    assert_eq!(bills[0].note.as_deref(), Some("Automatic monthly bill"));
    assert!(network.calls().is_empty());
}

#[tokio::test]
async fn generation_counts_missing_package_as_failed() {
    let store = MemoryStore::new();
    subscriber(&store, "Billed", 100_000).await;
    let dangling = store
        .insert_subscriber(netbill_core::model::NewSubscriber {
            display_name: "Dangling".into(),
            address: None,
            contact: None,
            ppp_username: "dangling".into(),
            ppp_secret: "x".into(),
            package_id: netbill_core::PackageId::new(404),
            ip_pool_hint: None,
            state: LifecycleState::Active,
            registered_at: Utc::now(),
            note: None,
        })
        .await
        .unwrap();

    let network = FakeNetwork::default();
    let engine = BillingEngine::new(store.clone(), &network);
    let report = engine.generate_monthly_bills_on(today()).await.unwrap();
    assert_eq!((report.created, report.failed), (1, 1));
    assert!(
        store
            .list_bills(&BillFilter::default().subscriber(dangling.id))
            .await
            .unwrap()
            .is_empty()
    );
}

// ── Overdue processing ──────────────────────────────────────────────

#[tokio::test]
async fn escalation_suspends_and_disables_secret() {
    let store = MemoryStore::new();
    let late = subscriber(&store, "Late", 100_000).await;
    let edge = subscriber(&store, "Edge", 100_000).await;
    bill_due(&store, &late, days(-6), 2).await;
    bill_due(&store, &edge, days(-5), 2).await;

    let network = FakeNetwork::default();
    let engine = BillingEngine::new(store.clone(), &network);
    let report = engine.process_overdue_bills_on(today()).await.unwrap();

    assert_eq!(report.marked_overdue, 1);
    assert_eq!(report.suspended, 1);
    assert_eq!(report.sync_failures, 0);
    assert_eq!(network.calls(), [("late".to_owned(), false)]);

    let late = store.get_subscriber(late.id).await.unwrap().unwrap();
    assert_eq!(late.state, LifecycleState::Suspended);
    assert_eq!(
        late.note.as_deref(),
        Some("Suspended due to overdue payment on 2025-03-20")
    );
    let edge = store.get_subscriber(edge.id).await.unwrap().unwrap();
    assert_eq!(edge.state, LifecycleState::Active);

    // Second pass finds nothing new.
    let again = engine.process_overdue_bills_on(today()).await.unwrap();
    assert_eq!((again.marked_overdue, again.suspended), (0, 0));
}

#[tokio::test]
async fn network_failure_does_not_block_suspension() {
    let store = MemoryStore::new();
    let late = subscriber(&store, "Late", 100_000).await;
    bill_due(&store, &late, days(-10), 2).await;

    let network = FakeNetwork::failing();
    let engine = BillingEngine::new(store.clone(), &network);
    let report = engine.process_overdue_bills_on(today()).await.unwrap();

    assert_eq!(report.suspended, 1);
    assert_eq!(report.sync_failures, 1);
    let late = store.get_subscriber(late.id).await.unwrap().unwrap();
    assert!(late.is_suspended());
}

#[tokio::test]
async fn router_failure_is_isolated_to_its_subscriber() {
    let store = MemoryStore::new();
    let first = subscriber(&store, "Ani", 100_000).await;
    let second = subscriber(&store, "Bayu", 100_000).await;
    let third = subscriber(&store, "Citra", 100_000).await;
    for who in [&first, &second, &third] {
        bill_due(&store, who, days(-8), 2).await;
    }

    let network = FakeNetwork::failing_for("ani");
    let engine = BillingEngine::new(store.clone(), &network);
    let report = engine.process_overdue_bills_on(today()).await.unwrap();

    assert_eq!(report.marked_overdue, 3);
    assert_eq!(report.suspended, 3);
    assert_eq!(report.sync_failures, 1);
    assert_eq!(
        network.calls(),
        [
            ("ani".to_owned(), false),
            ("bayu".to_owned(), false),
            ("citra".to_owned(), false),
        ]
    );
    for who in [&first, &second, &third] {
        let current = store.get_subscriber(who.id).await.unwrap().unwrap();
        assert!(current.is_suspended(), "{} not suspended", current.display_name);
    }
}

#[tokio::test]
async fn payment_during_sweep_keeps_bill_paid() {
    let store = MemoryStore::new();
    let alpha = subscriber(&store, "Alpha", 100_000).await;
    let beta = subscriber(&store, "Beta", 100_000).await;
    bill_due(&store, &alpha, days(-7), 2).await;
    bill_due(&store, &beta, days(-7), 2).await;
    let beta_bill = store
        .list_bills(&BillFilter::default().subscriber(beta.id))
        .await
        .unwrap()
        .remove(0);

    let network = SettlingNetwork {
        store: store.clone(),
        trigger: "alpha".into(),
        payment: Mutex::new(Some(NewPayment {
            bill_id: beta_bill.id,
            paid_on: today(),
            amount: beta_bill.amount,
            method: PaymentMethod::Cash,
            proof_ref: None,
            note: None,
        })),
        calls: Mutex::default(),
    };
    let engine = BillingEngine::new(store.clone(), &network);
    let report = engine.process_overdue_bills_on(today()).await.unwrap();

    assert_eq!((report.marked_overdue, report.suspended), (1, 1));
    assert_eq!(*network.calls.lock().unwrap(), ["alpha"]);

    let bill = store.get_bill(beta_bill.id).await.unwrap().unwrap();
    assert_eq!(bill.status, BillStatus::Paid);
    let beta = store.get_subscriber(beta.id).await.unwrap().unwrap();
    assert_eq!(beta.state, LifecycleState::Active);
}

#[tokio::test]
async fn unreachable_router_counts_as_sync_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let store = MemoryStore::new();
    let late = subscriber(&store, "Late", 100_000).await;
    bill_due(&store, &late, days(-9), 2).await;

    let endpoint = RouterEndpoint::new("127.0.0.1", "admin", SecretString::from("x".to_owned()))
        .with_port(port);
    let client = RouterClient::new(
        Some(endpoint),
        TransportConfig::with_timeout(Duration::from_secs(2)),
    );
    let engine = BillingEngine::new(store.clone(), client);
    let report = engine.process_overdue_bills_on(today()).await.unwrap();

    assert_eq!((report.suspended, report.sync_failures), (1, 1));
}

#[tokio::test]
async fn reminders_hit_exact_lead_day() {
    let store = MemoryStore::new();
    let two = subscriber(&store, "Two", 100_000).await;
    let three = subscriber(&store, "Three", 100_000).await;
    let four = subscriber(&store, "Four", 100_000).await;
    bill_due(&store, &two, days(2), 3).await;
    bill_due(&store, &three, days(3), 3).await;
    bill_due(&store, &four, days(4), 3).await;

    let network = FakeNetwork::default();
    let notifier = RecordingNotifier::default();
    let engine = BillingEngine::with_notifier(store.clone(), &network, &notifier);
    let report = engine.process_overdue_bills_on(today()).await.unwrap();

    assert_eq!(report.reminders, 1);
    assert_eq!(report.reminder_intents[0].subscriber_id, three.id);
    assert_eq!(report.reminder_intents[0].subscriber_name, "Three");
    assert_eq!(
        report.reminder_intents[0].contact.as_deref(),
        Some("Three@example.net")
    );

    let sent = notifier.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].due_date, days(3));
}

// ── Reactivation ────────────────────────────────────────────────────

async fn suspended_with_bill(store: &MemoryStore) -> (Subscriber, netbill_core::Bill) {
    let who = subscriber(store, "Rudi", 100_000).await;
    bill_due(store, &who, days(-8), 2).await;
    store
        .set_subscriber_state(who.id, LifecycleState::Suspended, None)
        .await
        .unwrap();
    let bill = store
        .list_bills(&BillFilter::default().subscriber(who.id))
        .await
        .unwrap()
        .remove(0);
    (who, bill)
}

#[tokio::test]
async fn reactivation_blocked_by_outstanding_bill() {
    let store = MemoryStore::new();
    let (who, _) = suspended_with_bill(&store).await;

    let network = FakeNetwork::default();
    let engine = BillingEngine::new(store.clone(), &network);
    let outcome = engine.reactivate_customer_on(who.id, today()).await.unwrap();

    assert_eq!(outcome, ReactivationOutcome::OutstandingBills { count: 1 });
    assert!(!outcome.is_reactivated());
    assert!(network.calls().is_empty());
    let who = store.get_subscriber(who.id).await.unwrap().unwrap();
    assert!(who.is_suspended());
}

#[tokio::test]
async fn reactivation_after_full_payment() {
    let store = MemoryStore::new();
    let (who, bill) = suspended_with_bill(&store).await;
    store
        .record_payment(NewPayment {
            bill_id: bill.id,
            paid_on: today(),
            amount: bill.amount,
            method: PaymentMethod::Cash,
            proof_ref: None,
            note: None,
        })
        .await
        .unwrap();

    let network = FakeNetwork::default();
    let engine = BillingEngine::new(store.clone(), &network);
    let outcome = engine.reactivate_customer_on(who.id, today()).await.unwrap();

    assert!(outcome.is_reactivated());
    assert_eq!(network.calls(), [("rudi".to_owned(), true)]);
    let who = store.get_subscriber(who.id).await.unwrap().unwrap();
    assert_eq!(who.state, LifecycleState::Active);
    assert_eq!(
        who.note.as_deref(),
        Some("Reactivated after payment on 2025-03-20")
    );
}

#[tokio::test]
async fn reactivation_waits_for_router_confirmation() {
    let store = MemoryStore::new();
    let (who, bill) = suspended_with_bill(&store).await;
    store
        .set_bill_status(bill.id, BillStatus::Paid)
        .await
        .unwrap();

    let network = FakeNetwork::failing();
    let engine = BillingEngine::new(store.clone(), &network);
    let outcome = engine.reactivate_customer_on(who.id, today()).await.unwrap();

    assert!(matches!(outcome, ReactivationOutcome::NetworkSyncFailed { .. }));
    let who = store.get_subscriber(who.id).await.unwrap().unwrap();
    assert!(who.is_suspended());
}

#[tokio::test]
async fn reactivating_active_subscriber_is_a_no_op() {
    let store = MemoryStore::new();
    let who = subscriber(&store, "Fine", 100_000).await;

    let network = FakeNetwork::default();
    let engine = BillingEngine::new(store.clone(), &network);
    let outcome = engine.reactivate_customer_on(who.id, today()).await.unwrap();
    assert_eq!(outcome, ReactivationOutcome::NotSuspended);
    assert!(network.calls().is_empty());
}

// ── Statistics ──────────────────────────────────────────────────────

#[tokio::test]
async fn stats_sum_outstanding_and_current_revenue() {
    let store = MemoryStore::new();
    let a = subscriber(&store, "A", 100_000).await;
    let b = subscriber(&store, "B", 100_000).await;
    let c = subscriber(&store, "C", 100_000).await;
    bill_due(&store, &a, days(5), 3).await;
    bill_due(&store, &b, days(5), 3).await;
    bill_due(&store, &c, days(-30), 2).await;

    let march = store
        .list_bills(&BillFilter::default().subscriber(b.id))
        .await
        .unwrap()
        .remove(0);
    store
        .set_bill_status(march.id, BillStatus::Paid)
        .await
        .unwrap();

    let network = FakeNetwork::default();
    let engine = BillingEngine::new(store.clone(), &network);
    engine.process_overdue_bills_on(today()).await.unwrap();
    let stats = engine.billing_stats_on(today()).await.unwrap();

    assert_eq!(stats.total_bills, 3);
    assert_eq!(stats.current_month_bills, 2);
    assert_eq!(stats.unpaid_bills, 1);
    assert_eq!(stats.overdue_bills, 1);
    assert_eq!(stats.total_unpaid_amount, Decimal::from(200_000));
    assert_eq!(stats.current_month_revenue, Decimal::from(100_000));
}
