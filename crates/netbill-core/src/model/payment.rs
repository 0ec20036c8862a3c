// ── Payment domain types ──

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::ids::{BillId, PaymentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PaymentMethod {
    Cash,
    Transfer,
    EWallet,
    Other,
}

/// Money received against a bill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub bill_id: BillId,
    pub paid_on: NaiveDate,
    pub amount: Decimal,
    pub method: PaymentMethod,
    /// Reference to an uploaded receipt, if any.
    pub proof_ref: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub bill_id: BillId,
    pub paid_on: NaiveDate,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub proof_ref: Option<String>,
    pub note: Option<String>,
}
