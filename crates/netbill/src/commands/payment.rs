//! Payment ledger handlers.

use chrono::Local;
use tabled::Tabled;

use netbill_core::repository::PaymentRepository;
use netbill_core::{
    BillBalance, BillId, Ledger, NewPayment, Payment, PaymentId, PaymentMethod, Settlement,
};

use crate::cli::{GlobalOpts, OutputFormat, PaymentArgs, PaymentCommand, PaymentMethodArg};
use crate::config::{self, Context};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct PaymentRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Paid On")]
    paid_on: String,
    #[tabled(rename = "Amount")]
    amount: String,
    #[tabled(rename = "Method")]
    method: String,
    #[tabled(rename = "Proof")]
    proof: String,
    #[tabled(rename = "Note")]
    note: String,
}

impl From<&Payment> for PaymentRow {
    fn from(p: &Payment) -> Self {
        Self {
            id: p.id.to_string(),
            paid_on: p.paid_on.to_string(),
            amount: p.amount.to_string(),
            method: p.method.to_string(),
            proof: output::or_dash(p.proof_ref.as_deref()),
            note: output::or_dash(p.note.as_deref()),
        }
    }
}

fn balance_lines(b: &BillBalance) -> Vec<String> {
    vec![
        format!(
            "Bill:       {} ({}, subscriber {})",
            b.bill.id, b.bill.period, b.bill.subscriber_id
        ),
        format!("Amount:     {}", b.bill.amount),
        format!("Paid:       {}", b.paid),
        format!("Remaining:  {}", b.remaining),
        format!("Status:     {}", b.bill.status),
    ]
}

fn settlement_detail(s: &Settlement) -> String {
    let mut lines = vec![format!(
        "Payment {} of {} recorded{}",
        s.payment.id,
        s.payment.amount,
        if s.settled { ", bill settled" } else { "" }
    )];
    lines.extend(balance_lines(&s.balance));
    lines.join("\n")
}

fn method_of(arg: PaymentMethodArg) -> PaymentMethod {
    match arg {
        PaymentMethodArg::Cash => PaymentMethod::Cash,
        PaymentMethodArg::Transfer => PaymentMethod::Transfer,
        PaymentMethodArg::EWallet => PaymentMethod::EWallet,
        PaymentMethodArg::Other => PaymentMethod::Other,
    }
}

pub async fn handle(ctx: &Context, args: PaymentArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let ledger = Ledger::new(ctx.store.clone());

    match args.command {
        PaymentCommand::Record {
            bill,
            amount,
            method,
            date,
            proof,
            note,
        } => {
            let paid_on =
                config::parse_date(date.as_deref())?.unwrap_or_else(|| Local::now().date_naive());
            let settlement = ledger
                .record_payment(NewPayment {
                    bill_id: BillId::new(bill),
                    paid_on,
                    amount: util::parse_amount("amount", &amount)?,
                    method: method_of(method),
                    proof_ref: proof,
                    note,
                })
                .await?;
            ctx.save()?;
            let out = output::render_single(&global.output, &settlement, settlement_detail, |s| {
                s.payment.id.to_string()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        PaymentCommand::Delete { payment } => {
            if !util::confirm(&format!("Delete payment {payment}?"), global.yes)? {
                return Ok(());
            }
            let balance = ledger.delete_payment(PaymentId::new(payment)).await?;
            ctx.save()?;
            let out = output::render_single(
                &global.output,
                &balance,
                |b| balance_lines(b).join("\n"),
                |b| b.bill.status.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        PaymentCommand::List { bill } => {
            let bill_id = BillId::new(bill);
            let balance = ledger.balance(bill_id).await?;
            let payments = ctx.store.list_payments(bill_id).await?;
            let out = output::render_list(
                &global.output,
                &payments,
                |p| PaymentRow::from(p),
                |p| p.id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            if matches!(global.output, OutputFormat::Table) {
                util::note(&balance_lines(&balance).join("\n"), global.quiet);
            }
            Ok(())
        }
    }
}
