// ── Core error types ──
//
// Billing-level errors. Callers never see raw framing or socket failures;
// the `From<netbill_api::Error>` impl folds them into network variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Record errors ────────────────────────────────────────────────
    #[error("{entity} not found: {identifier}")]
    NotFound {
        entity: &'static str,
        identifier: String,
    },

    #[error("A bill for subscriber {subscriber} in period {period} already exists")]
    DuplicateBill { subscriber: String, period: String },

    #[error("Package {package} is still assigned to {subscribers} subscriber(s)")]
    PackageInUse { package: String, subscribers: usize },

    #[error("PPP username already taken: {username}")]
    UsernameTaken { username: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── Network errors ───────────────────────────────────────────────
    #[error("No active router configuration")]
    NoActiveConfig,

    #[error("Router sync failed: {reason}")]
    NetworkSyncFailed { reason: String },

    #[error("Router error: {0}")]
    Router(#[source] netbill_api::Error),

    // ── Storage errors ───────────────────────────────────────────────
    #[error("Store error: {message}")]
    Store { message: String },
}

impl CoreError {
    pub fn not_found(entity: &'static str, identifier: impl ToString) -> Self {
        Self::NotFound {
            entity,
            identifier: identifier.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }
}

// ── Conversion from protocol-layer errors ────────────────────────────

impl From<netbill_api::Error> for CoreError {
    fn from(err: netbill_api::Error) -> Self {
        match err {
            netbill_api::Error::NoActiveConfig => Self::NoActiveConfig,
            netbill_api::Error::Trap { message, .. } => Self::NetworkSyncFailed {
                reason: format!("router rejected command: {message}"),
            },
            other => Self::Router(other),
        }
    }
}
