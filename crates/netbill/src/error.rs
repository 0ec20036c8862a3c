//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError`, protocol and config errors into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use netbill_config::ConfigError;
use netbill_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to router at {addr}")]
    #[diagnostic(
        code(netbill::connection_failed),
        help(
            "Check that the router API service is enabled and reachable.\n\
             Address: {addr}\n\
             Try: netbill router test"
        )
    )]
    ConnectionFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Router did not answer within {seconds}s")]
    #[diagnostic(
        code(netbill::timeout),
        help("Raise [router] timeout_secs in the config file, or set it to 0 to wait indefinitely.")
    )]
    Timeout { seconds: u64 },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Router login failed: {message}")]
    #[diagnostic(
        code(netbill::auth_failed),
        help(
            "Verify the router username and password.\n\
             Run: netbill config set-password <router>"
        )
    )]
    AuthFailed { message: String },

    #[error("No credentials available for router '{router}'")]
    #[diagnostic(
        code(netbill::no_credentials),
        help(
            "Store one with: netbill config set-password {router}\n\
             Or set password_env / password under [routers.{router}]."
        )
    )]
    NoCredentials { router: String },

    #[error("No active router configuration")]
    #[diagnostic(
        code(netbill::no_active_router),
        help(
            "Add a [routers.<name>] entry to {path} and either set default_router\n\
             or run: netbill router activate <name>"
        )
    )]
    NoActiveRouter { path: String },

    // ── Router replies ───────────────────────────────────────────────
    #[error("Router rejected the command: {message}")]
    #[diagnostic(code(netbill::router_rejected))]
    RouterRejected { message: String },

    #[error("Router protocol error: {message}")]
    #[diagnostic(
        code(netbill::protocol),
        help("The peer on this port may not speak the router API. Check host and port.")
    )]
    Protocol { message: String },

    // ── Records ──────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(netbill::not_found),
        help("Run: netbill {list_command} to see available records")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("{resource_type} '{identifier}': {reason}")]
    #[diagnostic(code(netbill::conflict))]
    Conflict {
        resource_type: String,
        identifier: String,
        reason: String,
    },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(netbill::validation))]
    Validation { field: String, reason: String },

    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(netbill::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Configuration / storage ──────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(netbill::config))]
    Config(#[from] ConfigError),

    #[error("Data store error: {message}")]
    #[diagnostic(
        code(netbill::store),
        help("Check the data file path (--data) and its permissions.")
    )]
    Store { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {message}")]
    #[diagnostic(code(netbill::render))]
    Render { message: String },
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. }
            | Self::NonInteractiveRequiresYes { .. }
            | Self::NoActiveRouter { .. }
            | Self::Config(_) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    pub fn validation(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ── Protocol error → CliError ────────────────────────────────────────

impl From<netbill_api::Error> for CliError {
    fn from(err: netbill_api::Error) -> Self {
        use netbill_api::Error as ApiError;

        match err {
            ApiError::NoActiveConfig => Self::NoActiveRouter {
                path: netbill_config::config_path().display().to_string(),
            },
            ApiError::ConnectionFailed { addr, source } => Self::ConnectionFailed { addr, source },
            ApiError::AuthenticationFailed { message } => Self::AuthFailed { message },
            ApiError::Timeout { timeout_secs } => Self::Timeout {
                seconds: timeout_secs,
            },
            ApiError::Trap { message, .. } | ApiError::Fatal { message } => {
                Self::RouterRejected { message }
            }
            ApiError::Protocol(message) => Self::Protocol { message },
            ApiError::Io(e) => Self::Io(e),
        }
    }
}

// ── CoreError → CliError ─────────────────────────────────────────────

fn list_command(entity: &str) -> &'static str {
    match entity {
        "Subscriber" => "subscriber list",
        "Package" => "package list",
        "Bill" => "billing bills",
        "Payment" => "payment list <bill>",
        "Router config" => "router list",
        _ => "--help",
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound { entity, identifier } => Self::NotFound {
                resource_type: entity.into(),
                identifier,
                list_command: list_command(entity).into(),
            },

            CoreError::DuplicateBill { subscriber, period } => Self::Conflict {
                resource_type: "Bill".into(),
                identifier: format!("{subscriber}/{period}"),
                reason: "already exists for this period".into(),
            },

            CoreError::PackageInUse {
                package,
                subscribers,
            } => Self::Conflict {
                resource_type: "Package".into(),
                identifier: package,
                reason: format!("still assigned to {subscribers} subscriber(s)"),
            },

            CoreError::UsernameTaken { username } => Self::Conflict {
                resource_type: "PPP username".into(),
                identifier: username,
                reason: "already taken".into(),
            },

            CoreError::ValidationFailed { message } => Self::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::NoActiveConfig => Self::NoActiveRouter {
                path: netbill_config::config_path().display().to_string(),
            },

            CoreError::NetworkSyncFailed { reason } => Self::RouterRejected { message: reason },

            CoreError::Router(inner) => inner.into(),

            CoreError::Store { message } => Self::Store { message },
        }
    }
}
