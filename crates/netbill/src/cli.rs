//! Clap derive structures for the `netbill` CLI.
//!
//! Defines the complete command tree, global flags, and shared value enums.
//! This file is also compiled by `build.rs` for man page generation, so it
//! must only depend on `clap`, `clap_complete` and `std`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// netbill -- billing automation for PPPoE subscribers
#[derive(Debug, Parser)]
#[command(
    name = "netbill",
    version,
    about = "Billing automation and router secret management for PPPoE subscribers",
    long_about = "Generates monthly bills, escalates overdue ones, suspends and reactivates\n\
        subscribers, and keeps their PPP secrets on the router in step with\n\
        their payment state.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "NETBILL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Data file holding subscribers, bills and payments
    #[arg(long, short = 'd', env = "NETBILL_DATA", global = true)]
    pub data: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "NETBILL_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run billing batches and view statistics
    #[command(alias = "b")]
    Billing(BillingArgs),

    /// Router configs, connectivity, secret push and presence
    #[command(alias = "r")]
    Router(RouterArgs),

    /// Manage individual PPP secrets on the active router
    Secret(SecretArgs),

    /// Record and delete payments
    #[command(alias = "pay")]
    Payment(PaymentArgs),

    /// Register and manage subscribers
    #[command(alias = "sub")]
    Subscriber(SubscriberArgs),

    /// Manage service packages
    #[command(alias = "pkg")]
    Package(PackageArgs),

    /// Inspect CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Billing ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct BillingArgs {
    #[command(subcommand)]
    pub command: BillingCommand,
}

/// Shared `--date` override for billing batches.
#[derive(Debug, Args)]
pub struct RunDate {
    /// Run as of this calendar date (YYYY-MM-DD) instead of today
    #[arg(long)]
    pub date: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum BillingCommand {
    /// Create this month's bill for every active subscriber
    Generate(RunDate),

    /// Escalate overdue bills, suspend subscribers and issue reminders
    Overdue(RunDate),

    /// Restore a suspended subscriber whose bills are all paid
    Reactivate {
        /// Subscriber ID
        subscriber: u64,

        #[command(flatten)]
        run: RunDate,
    },

    /// Bill counts and amounts
    Stats(RunDate),

    /// List bills
    Bills {
        /// Only bills of this subscriber
        #[arg(long, short = 's')]
        subscriber: Option<u64>,

        /// Only bills of this period (YYYY-MM)
        #[arg(long)]
        period: Option<String>,

        /// Only bills in this status (repeatable)
        #[arg(long)]
        status: Vec<BillStatusArg>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum BillStatusArg {
    Unpaid,
    Paid,
    Overdue,
}

// ── Router ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RouterArgs {
    #[command(subcommand)]
    pub command: RouterCommand,
}

#[derive(Debug, Subcommand)]
pub enum RouterCommand {
    /// Save a router config and probe it (active router when NAME is omitted)
    Test {
        /// Router entry name from the config file
        name: Option<String>,

        /// Also make this router the active one
        #[arg(long)]
        activate: bool,
    },

    /// List live PPP sessions on the active router
    Active,

    /// Push a PPP secret for every active subscriber
    Sync,

    /// Compare live sessions against active subscribers
    Presence,

    /// List known router configs
    #[command(alias = "ls")]
    List,

    /// Make a router config the only active one
    Activate {
        /// Router entry name
        name: String,
    },
}

// ── Secret ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SecretArgs {
    #[command(subcommand)]
    pub command: SecretCommand,
}

#[derive(Debug, Subcommand)]
pub enum SecretCommand {
    /// Create a PPPoE secret
    Add {
        /// PPP username
        username: String,

        /// PPP password (generated when omitted)
        #[arg(long, env = "NETBILL_SECRET_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Router profile
        #[arg(long, default_value = "default")]
        profile: String,

        /// Fixed remote address
        #[arg(long)]
        remote_address: Option<String>,

        /// Free-text comment
        #[arg(long)]
        comment: Option<String>,
    },

    /// Remove a secret
    #[command(alias = "rm")]
    Remove {
        /// PPP username
        username: String,
    },

    /// Enable a secret
    Enable {
        /// PPP username
        username: String,
    },

    /// Disable a secret
    Disable {
        /// PPP username
        username: String,
    },

    /// Print the router's internal ID for a secret
    Find {
        /// PPP username
        username: String,
    },
}

// ── Payment ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PaymentArgs {
    #[command(subcommand)]
    pub command: PaymentCommand,
}

#[derive(Debug, Subcommand)]
pub enum PaymentCommand {
    /// Record a payment against a bill
    Record {
        /// Bill ID
        bill: u64,

        /// Amount paid (decimal)
        amount: String,

        /// Payment method
        #[arg(long, short = 'm', default_value = "cash")]
        method: PaymentMethodArg,

        /// Date paid (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Receipt reference
        #[arg(long)]
        proof: Option<String>,

        /// Free-text note
        #[arg(long)]
        note: Option<String>,
    },

    /// Delete a payment and re-evaluate its bill
    #[command(alias = "rm")]
    Delete {
        /// Payment ID
        payment: u64,
    },

    /// List payments recorded against a bill
    #[command(alias = "ls")]
    List {
        /// Bill ID
        bill: u64,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PaymentMethodArg {
    Cash,
    Transfer,
    EWallet,
    Other,
}

// ── Subscriber ───────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SubscriberArgs {
    #[command(subcommand)]
    pub command: SubscriberCommand,
}

#[derive(Debug, Subcommand)]
pub enum SubscriberCommand {
    /// Register a subscriber with a generated username and PPP secret
    Register {
        /// Display name
        #[arg(long)]
        name: String,

        /// Package ID
        #[arg(long, short = 'p')]
        package: u64,

        #[arg(long)]
        address: Option<String>,

        /// Phone or e-mail
        #[arg(long)]
        contact: Option<String>,

        /// Address hint pushed as the secret's remote address
        #[arg(long)]
        ip_pool: Option<String>,

        #[arg(long)]
        note: Option<String>,
    },

    /// List subscribers
    #[command(alias = "ls")]
    List {
        /// Only subscribers in this state
        #[arg(long)]
        state: Option<StateArg>,
    },

    /// Switch a subscriber between active and inactive
    SetState {
        /// Subscriber ID
        subscriber: u64,

        state: ManualStateArg,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StateArg {
    Active,
    Inactive,
    Suspended,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ManualStateArg {
    Active,
    Inactive,
}

// ── Package ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PackageArgs {
    #[command(subcommand)]
    pub command: PackageCommand,
}

#[derive(Debug, Subcommand)]
pub enum PackageCommand {
    /// Add a package
    Add {
        /// Package name, also used as the router profile
        #[arg(long)]
        name: String,

        /// Monthly price (decimal)
        #[arg(long)]
        price: String,

        /// Bandwidth label, e.g. "20 Mbps"
        #[arg(long)]
        bandwidth: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Create the package as inactive
        #[arg(long)]
        inactive: bool,
    },

    /// Delete a package that no subscriber uses
    #[command(alias = "rm")]
    Delete {
        /// Package ID
        package: u64,
    },

    /// List packages
    #[command(alias = "ls")]
    List,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current resolved configuration (passwords redacted)
    Show,

    /// Print the config and data file paths
    Path,

    /// Store a router password in the system keyring
    SetPassword {
        /// Router entry name
        router: String,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
