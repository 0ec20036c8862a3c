// ── Billing automation ──

mod engine;
mod notifier;
mod policy;
mod reports;

pub use engine::BillingEngine;
pub use notifier::{LogNotifier, Notifier, ReminderIntent};
pub use policy::BillingPolicy;
pub use reports::{BillingStats, GenerationReport, OverdueReport, ReactivationOutcome};
