// ── Engine reports ──
//
// Small serializable results returned by each engine procedure.

use rust_decimal::Decimal;
use serde::Serialize;

use super::notifier::ReminderIntent;
use crate::model::Period;

/// Result of `generate_monthly_bills`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    pub period: Period,
    pub created: usize,
    /// Subscribers that already had a bill for the period.
    pub skipped: usize,
    /// Subscribers whose package could not be found.
    pub failed: usize,
}

/// Result of `process_overdue_bills`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OverdueReport {
    pub marked_overdue: usize,
    pub suspended: usize,
    pub reminders: usize,
    /// Suspensions whose router update failed; the billing change stands.
    pub sync_failures: usize,
    pub reminder_intents: Vec<ReminderIntent>,
}

/// Result of `reactivate_customer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReactivationOutcome {
    Reactivated,
    NotSuspended,
    OutstandingBills { count: usize },
    NetworkSyncFailed { reason: String },
}

impl ReactivationOutcome {
    pub fn is_reactivated(&self) -> bool {
        matches!(self, Self::Reactivated)
    }
}

/// Result of `billing_stats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillingStats {
    pub total_bills: usize,
    pub current_month_bills: usize,
    pub unpaid_bills: usize,
    pub overdue_bills: usize,
    /// Sum of unpaid and overdue bill amounts.
    pub total_unpaid_amount: Decimal,
    /// Sum of paid bill amounts in the current period.
    pub current_month_revenue: Decimal,
}
