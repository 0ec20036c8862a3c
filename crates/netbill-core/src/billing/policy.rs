// ── Billing policy ──

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Day offsets driving bill generation, escalation and reminders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingPolicy {
    /// Days from generation to the due date.
    pub due_after_days: u32,
    /// Days past the due date before a bill escalates to overdue.
    pub grace_days: u32,
    /// Reminder is issued exactly this many days before the due date.
    pub reminder_lead_days: u32,
}

impl Default for BillingPolicy {
    fn default() -> Self {
        Self {
            due_after_days: 7,
            grace_days: 5,
            reminder_lead_days: 3,
        }
    }
}

impl BillingPolicy {
    /// Due date for a bill generated on `today`.
    pub fn due_date(&self, today: NaiveDate) -> Result<NaiveDate, CoreError> {
        today
            .checked_add_days(Days::new(u64::from(self.due_after_days)))
            .ok_or_else(|| CoreError::validation(format!("due date out of range from {today}")))
    }

    /// More than `grace_days` past due.
    pub fn is_past_grace(&self, due_date: NaiveDate, today: NaiveDate) -> bool {
        (today - due_date).num_days() > i64::from(self.grace_days)
    }

    /// Due exactly `reminder_lead_days` from `today`.
    pub fn is_reminder_due(&self, due_date: NaiveDate, today: NaiveDate) -> bool {
        (due_date - today).num_days() == i64::from(self.reminder_lead_days)
    }
}
