use thiserror::Error;

/// Top-level error type for the `netbill-api` crate.
///
/// Covers every failure mode of a single command cycle: connecting,
/// logging in, framing, and router-side rejection. `netbill-core` maps
/// these into billing-level errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Configuration ───────────────────────────────────────────────
    /// No router endpoint was configured (no active config).
    #[error("No active router configuration")]
    NoActiveConfig,

    // ── Connection ──────────────────────────────────────────────────
    /// TCP connect failed (refused, unreachable, DNS failure, etc.)
    #[error("Cannot connect to router at {addr}: {source}")]
    ConnectionFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Login reply did not carry `!done`.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// Connect or reply read exceeded the configured timeout.
    #[error("Router did not answer within {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Router replies ──────────────────────────────────────────────
    /// `!trap` reply: the router rejected the command.
    #[error("Command rejected by router: {message}")]
    Trap { message: String, reply: Vec<String> },

    /// `!fatal` reply: the router is closing the connection.
    #[error("Router closed the session: {message}")]
    Fatal { message: String },

    // ── Framing ─────────────────────────────────────────────────────
    /// Malformed length prefix, invalid UTF-8, or premature end of stream.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Socket I/O failure after the connection was established.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
