//! Billing batch handlers.

use tabled::Tabled;
use tracing::warn;

use netbill_api::RouterClient;
use netbill_core::repository::BillRepository;
use netbill_core::{
    Bill, BillFilter, BillStatus, BillingEngine, BillingStats, GenerationReport, MemoryStore,
    OverdueReport, Period, ReactivationOutcome, ReminderIntent, SubscriberId,
};

use crate::cli::{BillStatusArg, BillingArgs, BillingCommand, GlobalOpts};
use crate::config::{self, Context};
use crate::error::CliError;
use crate::output;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct BillRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Subscriber")]
    subscriber: String,
    #[tabled(rename = "Period")]
    period: String,
    #[tabled(rename = "Amount")]
    amount: String,
    #[tabled(rename = "Due")]
    due: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Note")]
    note: String,
}

impl From<&Bill> for BillRow {
    fn from(b: &Bill) -> Self {
        Self {
            id: b.id.to_string(),
            subscriber: b.subscriber_id.to_string(),
            period: b.period.to_string(),
            amount: b.amount.to_string(),
            due: b.due_date.to_string(),
            status: b.status.to_string(),
            note: output::or_dash(b.note.as_deref()),
        }
    }
}

#[derive(Tabled)]
struct ReminderRow {
    #[tabled(rename = "Bill")]
    bill: String,
    #[tabled(rename = "Subscriber")]
    name: String,
    #[tabled(rename = "Contact")]
    contact: String,
    #[tabled(rename = "Amount")]
    amount: String,
    #[tabled(rename = "Due")]
    due: String,
}

impl From<&ReminderIntent> for ReminderRow {
    fn from(r: &ReminderIntent) -> Self {
        Self {
            bill: r.bill_id.to_string(),
            name: r.subscriber_name.clone(),
            contact: output::or_dash(r.contact.as_deref()),
            amount: r.amount.to_string(),
            due: r.due_date.to_string(),
        }
    }
}

// ── Detail views ────────────────────────────────────────────────────

fn generation_detail(r: &GenerationReport) -> String {
    [
        format!("Period:   {}", r.period),
        format!("Created:  {}", r.created),
        format!("Skipped:  {}", r.skipped),
        format!("Failed:   {}", r.failed),
    ]
    .join("\n")
}

fn overdue_detail(r: &OverdueReport) -> String {
    let mut lines = vec![
        format!("Marked overdue:  {}", r.marked_overdue),
        format!("Suspended:       {}", r.suspended),
        format!("Sync failures:   {}", r.sync_failures),
        format!("Reminders:       {}", r.reminders),
    ];
    if !r.reminder_intents.is_empty() {
        let rows: Vec<ReminderRow> = r.reminder_intents.iter().map(ReminderRow::from).collect();
        lines.push(output::render_table(&rows));
    }
    lines.join("\n")
}

fn stats_detail(s: &BillingStats) -> String {
    [
        format!("Total bills:            {}", s.total_bills),
        format!("This month:             {}", s.current_month_bills),
        format!("Unpaid:                 {}", s.unpaid_bills),
        format!("Overdue:                {}", s.overdue_bills),
        format!("Outstanding amount:     {}", s.total_unpaid_amount),
        format!("Revenue this month:     {}", s.current_month_revenue),
    ]
    .join("\n")
}

fn outcome_message(outcome: &ReactivationOutcome) -> String {
    match outcome {
        ReactivationOutcome::Reactivated => "Subscriber reactivated".into(),
        ReactivationOutcome::NotSuspended => "Subscriber is not suspended".into(),
        ReactivationOutcome::OutstandingBills { count } => {
            format!("{count} bill(s) still outstanding")
        }
        ReactivationOutcome::NetworkSyncFailed { reason } => {
            format!("Router did not confirm: {reason}")
        }
    }
}

fn status_of(arg: BillStatusArg) -> BillStatus {
    match arg {
        BillStatusArg::Unpaid => BillStatus::Unpaid,
        BillStatusArg::Paid => BillStatus::Paid,
        BillStatusArg::Overdue => BillStatus::Overdue,
    }
}

fn engine(ctx: &Context, client: RouterClient) -> BillingEngine<MemoryStore, RouterClient> {
    BillingEngine::new(ctx.store.clone(), client).with_policy(ctx.config.billing)
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(ctx: &Context, args: BillingArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        BillingCommand::Generate(run) => {
            let engine = engine(ctx, ctx.offline_client());
            let report = match config::parse_date(run.date.as_deref())? {
                Some(date) => engine.generate_monthly_bills_on(date).await?,
                None => engine.generate_monthly_bills().await?,
            };
            ctx.save()?;
            let out = output::render_single(&global.output, &report, generation_detail, |r| {
                r.created.to_string()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        BillingCommand::Overdue(run) => {
            // Suspensions stand even when the router is unusable.
            let client = ctx.router_client().await.unwrap_or_else(|e| {
                warn!(error = %e, "router unavailable; suspensions will not reach it");
                ctx.offline_client()
            });
            let engine = engine(ctx, client);
            let report = match config::parse_date(run.date.as_deref())? {
                Some(date) => engine.process_overdue_bills_on(date).await?,
                None => engine.process_overdue_bills().await?,
            };
            ctx.save()?;
            let out = output::render_single(&global.output, &report, overdue_detail, |r| {
                r.suspended.to_string()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        BillingCommand::Reactivate { subscriber, run } => {
            let engine = engine(ctx, ctx.router_client().await?);
            let id = SubscriberId::new(subscriber);
            let outcome = match config::parse_date(run.date.as_deref())? {
                Some(date) => engine.reactivate_customer_on(id, date).await?,
                None => engine.reactivate_customer(id).await?,
            };
            if outcome.is_reactivated() {
                ctx.save()?;
            }
            let color = output::should_color(&global.color);
            let out = output::render_single(
                &global.output,
                &outcome,
                |o| output::verdict(o.is_reactivated(), &outcome_message(o), color),
                |o| o.is_reactivated().to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        BillingCommand::Stats(run) => {
            let engine = engine(ctx, ctx.offline_client());
            let stats = match config::parse_date(run.date.as_deref())? {
                Some(date) => engine.billing_stats_on(date).await?,
                None => engine.billing_stats().await?,
            };
            let out = output::render_single(&global.output, &stats, stats_detail, |s| {
                s.total_bills.to_string()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        BillingCommand::Bills {
            subscriber,
            period,
            status,
        } => {
            let mut filter = BillFilter::default();
            if let Some(id) = subscriber {
                filter = filter.subscriber(SubscriberId::new(id));
            }
            if let Some(raw) = period {
                let period: Period = raw
                    .parse()
                    .map_err(|e| CliError::validation("period", format!("{e}")))?;
                filter = filter.period(period);
            }
            for s in status {
                filter = filter.status(status_of(s));
            }

            let bills = ctx.store.list_bills(&filter).await?;
            let out = output::render_list(&global.output, &bills, |b| BillRow::from(b), |b| {
                b.id.to_string()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
