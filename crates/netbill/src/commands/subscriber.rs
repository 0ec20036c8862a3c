//! Subscriber handlers.
//!
//! Listings never carry the PPP secret; registration prints it once so the
//! operator can hand it to the subscriber.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tabled::Tabled;

use netbill_core::repository::SubscriberRepository;
use netbill_core::{
    LifecycleState, PackageId, Registration, Registry, Subscriber, SubscriberId,
};

use crate::cli::{GlobalOpts, ManualStateArg, StateArg, SubscriberArgs, SubscriberCommand};
use crate::config::Context;
use crate::error::CliError;
use crate::output;

/// Serializable subscriber without its PPP secret.
#[derive(Serialize)]
struct SubscriberView<'a> {
    id: SubscriberId,
    display_name: &'a str,
    ppp_username: &'a str,
    package_id: PackageId,
    state: LifecycleState,
    address: Option<&'a str>,
    contact: Option<&'a str>,
    ip_pool_hint: Option<&'a str>,
    registered_at: DateTime<Utc>,
    note: Option<&'a str>,
}

impl<'a> From<&'a Subscriber> for SubscriberView<'a> {
    fn from(s: &'a Subscriber) -> Self {
        Self {
            id: s.id,
            display_name: &s.display_name,
            ppp_username: &s.ppp_username,
            package_id: s.package_id,
            state: s.state,
            address: s.address.as_deref(),
            contact: s.contact.as_deref(),
            ip_pool_hint: s.ip_pool_hint.as_deref(),
            registered_at: s.registered_at,
            note: s.note.as_deref(),
        }
    }
}

#[derive(Tabled)]
struct SubscriberRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Username")]
    username: String,
    #[tabled(rename = "Package")]
    package: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Contact")]
    contact: String,
    #[tabled(rename = "Note")]
    note: String,
}

impl From<&SubscriberView<'_>> for SubscriberRow {
    fn from(s: &SubscriberView<'_>) -> Self {
        Self {
            id: s.id.to_string(),
            name: s.display_name.to_owned(),
            username: s.ppp_username.to_owned(),
            package: s.package_id.to_string(),
            state: s.state.to_string(),
            contact: output::or_dash(s.contact),
            note: output::or_dash(s.note),
        }
    }
}

/// Registration result: the one place the generated secret is shown.
#[derive(Serialize)]
struct RegisteredView<'a> {
    #[serde(flatten)]
    subscriber: SubscriberView<'a>,
    ppp_secret: &'a str,
}

fn registered_detail(v: &RegisteredView<'_>) -> String {
    let s = &v.subscriber;
    [
        format!("ID:         {}", s.id),
        format!("Name:       {}", s.display_name),
        format!("Username:   {}", s.ppp_username),
        format!("Secret:     {}", v.ppp_secret),
        format!("Package:    {}", s.package_id),
        format!("State:      {}", s.state),
        format!("Registered: {}", s.registered_at.format("%Y-%m-%d %H:%M")),
    ]
    .join("\n")
}

fn state_of(arg: StateArg) -> LifecycleState {
    match arg {
        StateArg::Active => LifecycleState::Active,
        StateArg::Inactive => LifecycleState::Inactive,
        StateArg::Suspended => LifecycleState::Suspended,
    }
}

pub async fn handle(
    ctx: &Context,
    args: SubscriberArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let registry = Registry::new(ctx.store.clone());

    match args.command {
        SubscriberCommand::Register {
            name,
            package,
            address,
            contact,
            ip_pool,
            note,
        } => {
            let subscriber = registry
                .register_subscriber(Registration {
                    display_name: name,
                    address,
                    contact,
                    package_id: PackageId::new(package),
                    ip_pool_hint: ip_pool,
                    note,
                })
                .await?;
            ctx.save()?;

            let view = RegisteredView {
                subscriber: SubscriberView::from(&subscriber),
                ppp_secret: &subscriber.ppp_secret,
            };
            let out = output::render_single(&global.output, &view, registered_detail, |v| {
                v.subscriber.ppp_username.to_owned()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SubscriberCommand::List { state } => {
            let subscribers = ctx.store.list_subscribers(state.map(state_of)).await?;
            let views: Vec<SubscriberView<'_>> = subscribers.iter().map(SubscriberView::from).collect();
            let out = output::render_list(
                &global.output,
                &views,
                |s| SubscriberRow::from(s),
                |s| s.ppp_username.to_owned(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SubscriberCommand::SetState { subscriber, state } => {
            let state = match state {
                ManualStateArg::Active => LifecycleState::Active,
                ManualStateArg::Inactive => LifecycleState::Inactive,
            };
            let updated = registry
                .set_subscriber_state(SubscriberId::new(subscriber), state)
                .await?;
            ctx.save()?;
            let view = SubscriberView::from(&updated);
            let out = output::render_list(
                &global.output,
                std::slice::from_ref(&view),
                |s| SubscriberRow::from(s),
                |s| s.ppp_username.to_owned(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
