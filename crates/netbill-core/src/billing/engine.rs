// ── Billing automation engine ──
//
// Discrete, idempotent batch procedures. Each reads the current records,
// applies the state transitions due on `today`, and pushes the transitions
// that affect network access through `NetworkSync`. A router failure never
// rolls back or blocks a billing transition.

use chrono::{Local, NaiveDate};
use netbill_api::SecretChange;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::notifier::{LogNotifier, Notifier, ReminderIntent};
use super::policy::BillingPolicy;
use super::reports::{BillingStats, GenerationReport, OverdueReport, ReactivationOutcome};
use crate::error::CoreError;
use crate::model::{BillStatus, LifecycleState, NewBill, Period, Subscriber, SubscriberId};
use crate::repository::{BillFilter, BillingStore};
use crate::sync::NetworkSync;

const GENERATED_BILL_NOTE: &str = "Automatic monthly bill";

/// Drives bill generation, escalation, suspension and reactivation.
pub struct BillingEngine<S, N, R = LogNotifier> {
    store: S,
    network: N,
    notifier: R,
    policy: BillingPolicy,
}

impl<S, N> BillingEngine<S, N, LogNotifier>
where
    S: BillingStore,
    N: NetworkSync,
{
    /// Engine with the default policy and log-only reminders.
    pub fn new(store: S, network: N) -> Self {
        Self::with_notifier(store, network, LogNotifier)
    }
}

impl<S, N, R> BillingEngine<S, N, R>
where
    S: BillingStore,
    N: NetworkSync,
    R: Notifier,
{
    pub fn with_notifier(store: S, network: N, notifier: R) -> Self {
        Self {
            store,
            network,
            notifier,
            policy: BillingPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: BillingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &BillingPolicy {
        &self.policy
    }

    pub fn notifier(&self) -> &R {
        &self.notifier
    }

    // ── Bill generation ──────────────────────────────────────────────

    pub async fn generate_monthly_bills(&self) -> Result<GenerationReport, CoreError> {
        self.generate_monthly_bills_on(today()).await
    }

    /// Create one bill per active subscriber for the period containing
    /// `today`. Subscribers already billed for the period are skipped.
    pub async fn generate_monthly_bills_on(
        &self,
        today: NaiveDate,
    ) -> Result<GenerationReport, CoreError> {
        let period = Period::of(today);
        let due_date = self.policy.due_date(today)?;
        let subscribers = self
            .store
            .list_subscribers(Some(LifecycleState::Active))
            .await?;

        let mut report = GenerationReport {
            period,
            created: 0,
            skipped: 0,
            failed: 0,
        };

        for subscriber in &subscribers {
            let existing = self
                .store
                .list_bills(&BillFilter::default().subscriber(subscriber.id).period(period))
                .await?;
            if !existing.is_empty() {
                report.skipped += 1;
                continue;
            }

            let Some(package) = self.store.get_package(subscriber.package_id).await? else {
                warn!(
                    subscriber = %subscriber.ppp_username,
                    package = %subscriber.package_id,
                    "package not found, no bill generated"
                );
                report.failed += 1;
                continue;
            };

            let new_bill = NewBill {
                subscriber_id: subscriber.id,
                period,
                amount: package.price,
                due_date,
                note: Some(GENERATED_BILL_NOTE.to_owned()),
            };
            match self.store.insert_bill(new_bill).await {
                Ok(bill) => {
                    debug!(bill = %bill.id, subscriber = %subscriber.ppp_username, "bill created");
                    report.created += 1;
                }
                Err(CoreError::DuplicateBill { .. }) => report.skipped += 1,
                Err(e) => return Err(e),
            }
        }

        info!(
            %period,
            created = report.created,
            skipped = report.skipped,
            failed = report.failed,
            "monthly billing generated"
        );
        Ok(report)
    }

    // ── Overdue processing ───────────────────────────────────────────

    pub async fn process_overdue_bills(&self) -> Result<OverdueReport, CoreError> {
        self.process_overdue_bills_on(today()).await
    }

    /// Escalate unpaid bills past the grace period (suspending their
    /// subscribers) and issue reminders for bills due soon.
    pub async fn process_overdue_bills_on(
        &self,
        today: NaiveDate,
    ) -> Result<OverdueReport, CoreError> {
        let unpaid = self
            .store
            .list_bills(&BillFilter::default().status(BillStatus::Unpaid))
            .await?;
        let mut report = OverdueReport::default();

        // Each write re-checks the state it was chosen for: a payment that
        // lands after the listing leaves its bill and subscriber untouched.
        for bill in unpaid
            .iter()
            .filter(|b| self.policy.is_past_grace(b.due_date, today))
        {
            let escalated = self
                .store
                .transition_bill_status(bill.id, BillStatus::Unpaid, BillStatus::Overdue)
                .await?;
            if escalated.is_none() {
                debug!(bill = %bill.id, "bill no longer unpaid, not escalated");
                continue;
            }
            report.marked_overdue += 1;
            info!(bill = %bill.id, subscriber = %bill.subscriber_id, "bill marked overdue");

            let suspended = match self
                .store
                .transition_subscriber_state(
                    bill.subscriber_id,
                    LifecycleState::Active,
                    LifecycleState::Suspended,
                    Some(format!("Suspended due to overdue payment on {today}")),
                )
                .await
            {
                Ok(Some(subscriber)) => subscriber,
                Ok(None) => continue,
                Err(CoreError::NotFound { .. }) => {
                    warn!(
                        bill = %bill.id,
                        subscriber = %bill.subscriber_id,
                        "bill references unknown subscriber"
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };
            report.suspended += 1;
            info!(subscriber = %suspended.ppp_username, bill = %bill.id, "subscriber suspended");

            if !self.sync_access(&suspended, false).await {
                report.sync_failures += 1;
            }
        }

        for bill in unpaid
            .iter()
            .filter(|b| self.policy.is_reminder_due(b.due_date, today))
        {
            let subscriber = self.store.get_subscriber(bill.subscriber_id).await?;
            let intent = ReminderIntent {
                bill_id: bill.id,
                subscriber_id: bill.subscriber_id,
                subscriber_name: subscriber
                    .as_ref()
                    .map_or_else(|| bill.subscriber_id.to_string(), |s| s.display_name.clone()),
                contact: subscriber.and_then(|s| s.contact),
                period: bill.period,
                amount: bill.amount,
                due_date: bill.due_date,
            };
            if let Err(e) = self.notifier.remind(&intent).await {
                warn!(bill = %bill.id, error = %e, "reminder delivery failed");
            }
            report.reminders += 1;
            report.reminder_intents.push(intent);
        }

        info!(
            marked_overdue = report.marked_overdue,
            suspended = report.suspended,
            reminders = report.reminders,
            sync_failures = report.sync_failures,
            "overdue processing completed"
        );
        Ok(report)
    }

    /// Best-effort router update for a suspension. Returns `false` on failure.
    async fn sync_access(&self, subscriber: &Subscriber, enabled: bool) -> bool {
        match self
            .network
            .set_secret_enabled(&subscriber.ppp_username, enabled)
            .await
        {
            Ok(SecretChange::Applied) => true,
            Ok(SecretChange::NotFound) => {
                warn!(subscriber = %subscriber.ppp_username, "no ppp secret on router");
                false
            }
            Err(e) => {
                warn!(subscriber = %subscriber.ppp_username, error = %e, "router update failed");
                false
            }
        }
    }

    // ── Reactivation ─────────────────────────────────────────────────

    pub async fn reactivate_customer(
        &self,
        id: SubscriberId,
    ) -> Result<ReactivationOutcome, CoreError> {
        self.reactivate_customer_on(id, today()).await
    }

    /// Restore a suspended subscriber whose bills are all settled. The
    /// router is updated first; the record only changes once it confirms.
    pub async fn reactivate_customer_on(
        &self,
        id: SubscriberId,
        today: NaiveDate,
    ) -> Result<ReactivationOutcome, CoreError> {
        let subscriber = self
            .store
            .get_subscriber(id)
            .await?
            .ok_or_else(|| CoreError::not_found("Subscriber", id))?;

        if !subscriber.is_suspended() {
            return Ok(ReactivationOutcome::NotSuspended);
        }

        let outstanding = self
            .store
            .list_bills(
                &BillFilter::default()
                    .subscriber(id)
                    .status(BillStatus::Unpaid)
                    .status(BillStatus::Overdue),
            )
            .await?
            .len();
        if outstanding > 0 {
            return Ok(ReactivationOutcome::OutstandingBills { count: outstanding });
        }

        let reason = match self
            .network
            .set_secret_enabled(&subscriber.ppp_username, true)
            .await
        {
            Ok(SecretChange::Applied) => None,
            Ok(SecretChange::NotFound) => Some(format!(
                "no ppp secret named {} on the router",
                subscriber.ppp_username
            )),
            Err(e) => Some(e.to_string()),
        };
        if let Some(reason) = reason {
            warn!(subscriber = %subscriber.ppp_username, %reason, "reactivation blocked by router");
            return Ok(ReactivationOutcome::NetworkSyncFailed { reason });
        }

        let reactivated = self
            .store
            .transition_subscriber_state(
                id,
                LifecycleState::Suspended,
                LifecycleState::Active,
                Some(format!("Reactivated after payment on {today}")),
            )
            .await?;
        if reactivated.is_none() {
            warn!(subscriber = %subscriber.ppp_username, "state changed during reactivation");
            return Ok(ReactivationOutcome::NotSuspended);
        }
        info!(subscriber = %subscriber.ppp_username, "subscriber reactivated");
        Ok(ReactivationOutcome::Reactivated)
    }

    // ── Statistics ───────────────────────────────────────────────────

    pub async fn billing_stats(&self) -> Result<BillingStats, CoreError> {
        self.billing_stats_on(today()).await
    }

    pub async fn billing_stats_on(&self, today: NaiveDate) -> Result<BillingStats, CoreError> {
        let period = Period::of(today);
        let bills = self.store.list_bills(&BillFilter::default()).await?;

        let count = |status: BillStatus| bills.iter().filter(|b| b.status == status).count();
        let total_unpaid_amount: Decimal = bills
            .iter()
            .filter(|b| b.status.is_outstanding())
            .map(|b| b.amount)
            .sum();
        let current_month_revenue: Decimal = bills
            .iter()
            .filter(|b| b.period == period && b.status == BillStatus::Paid)
            .map(|b| b.amount)
            .sum();

        Ok(BillingStats {
            total_bills: bills.len(),
            current_month_bills: bills.iter().filter(|b| b.period == period).count(),
            unpaid_bills: count(BillStatus::Unpaid),
            overdue_bills: count(BillStatus::Overdue),
            total_unpaid_amount,
            current_month_revenue,
        })
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}
