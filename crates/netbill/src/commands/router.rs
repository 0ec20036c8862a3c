//! Router command handlers: config probing, live sessions, secret push and
//! presence.

use serde::Serialize;
use tabled::Tabled;

use netbill_api::{ActiveConnection, ConnectionTest};
use netbill_core::repository::RouterConfigRepository;
use netbill_core::{PresenceReport, PushReport, Registry, RouterConfig, RouterSync};

use crate::cli::{GlobalOpts, RouterArgs, RouterCommand};
use crate::config::Context;
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct RouterRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Address")]
    addr: String,
    #[tabled(rename = "User")]
    username: String,
    #[tabled(rename = "Active")]
    active: String,
    #[tabled(rename = "Last Sync")]
    last_sync: String,
}

impl From<&RouterConfig> for RouterRow {
    fn from(r: &RouterConfig) -> Self {
        Self {
            name: r.name.clone(),
            addr: format!("{}:{}", r.host, r.port),
            username: r.username.clone(),
            active: if r.is_active { "*".into() } else { String::new() },
            last_sync: r
                .last_sync_at
                .map_or_else(|| "-".into(), |t| t.format("%Y-%m-%d %H:%M").to_string()),
        }
    }
}

#[derive(Tabled)]
struct SessionRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Uptime")]
    uptime: String,
    #[tabled(rename = "Caller")]
    caller: String,
}

impl From<&ActiveConnection> for SessionRow {
    fn from(c: &ActiveConnection) -> Self {
        Self {
            name: c.name.clone(),
            address: output::or_dash(c.address()),
            uptime: output::or_dash(c.uptime()),
            caller: output::or_dash(c.attributes.get("caller-id").map(String::as_str)),
        }
    }
}

#[derive(Tabled)]
struct PresenceRow {
    #[tabled(rename = "Status")]
    status: &'static str,
    #[tabled(rename = "Username")]
    username: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Uptime")]
    uptime: String,
}

// ── Detail views ────────────────────────────────────────────────────

/// Probe result plus the saved config it ran against.
#[derive(Serialize)]
struct ProbeView<'a> {
    router: &'a RouterConfig,
    test: &'a ConnectionTest,
}

fn push_detail(r: &PushReport) -> String {
    let mut lines = vec![
        format!("Pushed:     {}", r.pushed),
        format!("Failed:     {}", r.failed),
        format!(
            "Synced at:  {}",
            r.synced_at
                .map_or_else(|| "-".into(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        ),
    ];
    for failure in &r.failures {
        lines.push(format!("  {}: {}", failure.username, failure.reason));
    }
    lines.join("\n")
}

fn presence_detail(r: &PresenceReport) -> String {
    let mut rows: Vec<PresenceRow> = Vec::new();
    for (status, entries) in [("online", &r.online), ("offline", &r.offline)] {
        rows.extend(entries.iter().map(|e| PresenceRow {
            status,
            username: e.ppp_username.clone(),
            name: e.display_name.clone(),
            address: output::or_dash(e.address.as_deref()),
            uptime: output::or_dash(e.uptime.as_deref()),
        }));
    }
    rows.extend(r.unknown.iter().map(|name| PresenceRow {
        status: "unknown",
        username: name.clone(),
        name: "-".into(),
        address: "-".into(),
        uptime: "-".into(),
    }));
    format!(
        "{}\n{} online, {} offline, {} unknown",
        output::render_table(&rows),
        r.online.len(),
        r.offline.len(),
        r.unknown.len()
    )
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(ctx: &Context, args: RouterArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        RouterCommand::Test { name, activate } => {
            let name = match name {
                Some(name) => name,
                None => ctx.active_router().await?.name,
            };
            let draft = ctx.router_draft(&name).await?;
            let registry = Registry::new(ctx.store.clone());
            let (router, test) = registry
                .save_router_config(draft, activate, &ctx.config.transport())
                .await?;
            ctx.save()?;

            let color = output::should_color(&global.color);
            let view = ProbeView {
                router: &router,
                test: &test,
            };
            let out = output::render_single(
                &global.output,
                &view,
                |v| {
                    let r = v.router;
                    let line = format!("{} ({}:{}): {}", r.name, r.host, r.port, v.test.message);
                    output::verdict(v.test.success, &line, color)
                },
                |v| v.test.success.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            if test.success {
                Ok(())
            } else {
                Err(CliError::RouterRejected {
                    message: test.message,
                })
            }
        }

        RouterCommand::Active => {
            let client = ctx.router_client().await?;
            let sessions = client.try_list_active_connections().await?;
            let out = output::render_list(
                &global.output,
                &sessions,
                |c| SessionRow::from(c),
                |c| c.name.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        RouterCommand::Sync => {
            let sync = RouterSync::new(ctx.store.clone(), ctx.router_client().await?);
            let report = sync.push_secrets().await?;
            ctx.save()?;
            let out = output::render_single(&global.output, &report, push_detail, |r| {
                r.pushed.to_string()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        RouterCommand::Presence => {
            let sync = RouterSync::new(ctx.store.clone(), ctx.router_client().await?);
            let report = sync.presence().await?;
            let out = output::render_single(&global.output, &report, presence_detail, |r| {
                r.online
                    .iter()
                    .map(|e| e.ppp_username.as_str())
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        RouterCommand::List => {
            let routers = ctx.store.list_router_configs().await?;
            let out = output::render_list(
                &global.output,
                &routers,
                |r| RouterRow::from(r),
                |r| r.name.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        RouterCommand::Activate { name } => {
            let router = Registry::new(ctx.store.clone()).activate_router(&name).await?;
            ctx.save()?;
            let routers = ctx.store.list_router_configs().await?;
            let out = output::render_list(
                &global.output,
                &routers,
                |r| RouterRow::from(r),
                |r| r.name.clone(),
            )?;
            output::print_output(&out, global.quiet);
            util::note(&format!("Router '{}' is now active", router.name), global.quiet);
            Ok(())
        }
    }
}
