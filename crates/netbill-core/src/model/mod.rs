// ── Domain model ──
//
// Plain records exchanged with the repositories. Behavior lives in the
// billing, ledger, registry and sync services.

mod bill;
mod ids;
mod package;
mod payment;
mod router_config;
mod subscriber;

pub use bill::{Bill, BillStatus, NewBill, ParsePeriodError, Period};
pub use ids::{BillId, PackageId, PaymentId, RouterConfigId, SubscriberId};
pub use package::{NewPackage, Package, PackageStatus};
pub use payment::{NewPayment, Payment, PaymentMethod};
pub use router_config::{RouterConfig, RouterConfigDraft};
pub use subscriber::{LifecycleState, NewSubscriber, Subscriber};
