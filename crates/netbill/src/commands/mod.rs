//! Command dispatch: bridges CLI args -> core services -> output formatting.

pub mod billing;
pub mod config_cmd;
pub mod package;
pub mod payment;
pub mod router;
pub mod secret;
pub mod subscriber;
pub mod util;

use crate::cli::{Command, GlobalOpts};
use crate::config::Context;
use crate::error::CliError;

/// Dispatch a store-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Billing(args) => billing::handle(ctx, args, global).await,
        Command::Router(args) => router::handle(ctx, args, global).await,
        Command::Secret(args) => secret::handle(ctx, args, global).await,
        Command::Payment(args) => payment::handle(ctx, args, global).await,
        Command::Subscriber(args) => subscriber::handle(ctx, args, global).await,
        Command::Package(args) => package::handle(ctx, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
