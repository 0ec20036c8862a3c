//! Billing automation and domain services between `netbill-api` and the CLI.
//!
//! - **[`BillingEngine`]**: the four batch procedures (bill generation,
//!   overdue processing, reactivation, statistics). Each has an `_on(date)`
//!   form for deterministic runs.
//! - **Repositories** ([`repository`]): async record ports. [`MemoryStore`]
//!   implements all of them on `DashMap` tables with a JSON snapshot file.
//! - **[`NetworkSync`]**: the router seam, implemented by
//!   [`netbill_api::RouterClient`]; [`RouterSync`] pushes secrets in bulk
//!   and reports presence.
//! - **[`Ledger`]** and **[`Registry`]**: payments with bill settlement,
//!   subscriber registration, packages and router configs.

pub mod billing;
pub mod error;
pub mod ledger;
pub mod model;
pub mod registry;
pub mod repository;
pub mod store;
pub mod sync;

// ── Primary re-exports ──────────────────────────────────────────────
pub use billing::{
    BillingEngine, BillingPolicy, BillingStats, GenerationReport, LogNotifier, Notifier,
    OverdueReport, ReactivationOutcome, ReminderIntent,
};
pub use error::CoreError;
pub use ledger::{BillBalance, Ledger, Settlement};
pub use registry::{Registration, Registry};
pub use repository::{BillFilter, BillingStore};
pub use store::MemoryStore;
pub use sync::{NetworkSync, PresenceReport, PushReport, RouterSync};

pub use model::{
    Bill, BillId, BillStatus, LifecycleState, NewBill, NewPackage, NewPayment, Package, PackageId,
    PackageStatus, Payment, PaymentId, PaymentMethod, Period, RouterConfig, RouterConfigDraft,
    RouterConfigId, Subscriber, SubscriberId,
};
