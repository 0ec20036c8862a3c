//! PPP secret handlers against the active router.

use secrecy::SecretString;
use serde::Serialize;

use netbill_api::{NewSecret, SecretChange};
use netbill_core::registry::generate_ppp_secret;

use crate::cli::{GlobalOpts, SecretArgs, SecretCommand};
use crate::config::Context;
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Serialize)]
struct SecretResult<'a> {
    username: &'a str,
    action: &'static str,
    result: SecretChange,
}

fn require_applied(change: SecretChange, username: &str) -> Result<(), CliError> {
    match change {
        SecretChange::Applied => Ok(()),
        SecretChange::NotFound => Err(CliError::NotFound {
            resource_type: "PPP secret".into(),
            identifier: username.into(),
            list_command: "router active".into(),
        }),
    }
}

fn report(
    global: &GlobalOpts,
    username: &str,
    action: &'static str,
    change: SecretChange,
) -> Result<(), CliError> {
    require_applied(change, username)?;
    let view = SecretResult {
        username,
        action,
        result: change,
    };
    let out = output::render_single(
        &global.output,
        &view,
        |v| format!("Secret '{}' {}", v.username, v.action),
        |v| v.username.to_owned(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn handle(ctx: &Context, args: SecretArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let client = ctx.router_client().await?;

    match args.command {
        SecretCommand::Add {
            username,
            password,
            profile,
            remote_address,
            comment,
        } => {
            let generated = password.is_none();
            let password = password.unwrap_or_else(generate_ppp_secret);
            let secret = NewSecret {
                username: username.clone(),
                password: SecretString::from(password.clone()),
                profile: Some(profile),
                remote_address,
                comment,
            };
            client.try_add_secret(&secret).await?;
            report(global, &username, "added", SecretChange::Applied)?;
            if generated {
                util::note(&format!("Generated password: {password}"), global.quiet);
            }
            Ok(())
        }

        SecretCommand::Remove { username } => {
            if !util::confirm(&format!("Remove PPP secret '{username}' from the router?"), global.yes)? {
                return Ok(());
            }
            let change = client.try_remove_secret(&username).await?;
            report(global, &username, "removed", change)
        }

        SecretCommand::Enable { username } => {
            let change = client.try_toggle_secret(&username, true).await?;
            report(global, &username, "enabled", change)
        }

        SecretCommand::Disable { username } => {
            let change = client.try_toggle_secret(&username, false).await?;
            report(global, &username, "disabled", change)
        }

        SecretCommand::Find { username } => {
            let id = client.find_secret_id(&username).await?;
            let id = id.ok_or_else(|| CliError::NotFound {
                resource_type: "PPP secret".into(),
                identifier: username.clone(),
                list_command: "router active".into(),
            })?;
            output::print_output(&id, global.quiet);
            Ok(())
        }
    }
}
