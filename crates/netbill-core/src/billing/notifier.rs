// ── Reminder delivery seam ──

use std::future::Future;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use crate::error::CoreError;
use crate::model::{BillId, Period, SubscriberId};

/// A payment reminder that should reach a subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderIntent {
    pub bill_id: BillId,
    pub subscriber_id: SubscriberId,
    pub subscriber_name: String,
    pub contact: Option<String>,
    pub period: Period,
    pub amount: Decimal,
    pub due_date: NaiveDate,
}

/// Delivers reminder intents (mail, messaging gateway, ...).
pub trait Notifier: Send + Sync {
    fn remind(&self, intent: &ReminderIntent) -> impl Future<Output = Result<(), CoreError>> + Send;
}

/// Records reminders in the log and nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn remind(&self, intent: &ReminderIntent) -> Result<(), CoreError> {
        info!(
            bill = %intent.bill_id,
            subscriber = %intent.subscriber_name,
            contact = intent.contact.as_deref().unwrap_or("-"),
            amount = %intent.amount,
            due = %intent.due_date,
            "payment reminder due"
        );
        Ok(())
    }
}
