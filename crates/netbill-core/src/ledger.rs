// ── Payment ledger ──

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use crate::error::CoreError;
use crate::model::{Bill, BillId, BillStatus, NewPayment, Payment, PaymentId};
use crate::repository::{BillRepository, PaymentRepository};

/// A bill together with what has been paid against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillBalance {
    pub bill: Bill,
    pub paid: Decimal,
    pub remaining: Decimal,
}

/// Result of recording a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settlement {
    pub payment: Payment,
    pub balance: BillBalance,
    /// The payment moved the bill to `paid`.
    pub settled: bool,
}

pub struct Ledger<S> {
    store: S,
}

impl<S> Ledger<S>
where
    S: BillRepository + PaymentRepository,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn balance(&self, bill_id: BillId) -> Result<BillBalance, CoreError> {
        let bill = self
            .store
            .get_bill(bill_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Bill", bill_id))?;
        let paid: Decimal = self
            .store
            .list_payments(bill_id)
            .await?
            .iter()
            .map(|p| p.amount)
            .sum();
        let remaining = (bill.amount - paid).max(Decimal::ZERO);
        Ok(BillBalance {
            bill,
            paid,
            remaining,
        })
    }

    /// Record a payment against an outstanding bill.
    pub async fn record_payment(&self, payment: NewPayment) -> Result<Settlement, CoreError> {
        if payment.amount <= Decimal::ZERO {
            return Err(CoreError::validation("payment amount must be positive"));
        }

        let (payment, bill) = self.store.record_payment(payment).await?;
        let settled = bill.status == BillStatus::Paid;
        info!(
            payment = %payment.id,
            bill = %bill.id,
            amount = %payment.amount,
            settled,
            "payment recorded"
        );

        Ok(Settlement {
            payment,
            balance: self.balance(bill.id).await?,
            settled,
        })
    }

    /// Delete a payment; its bill reverts to `unpaid` if no longer covered.
    pub async fn delete_payment(&self, id: PaymentId) -> Result<BillBalance, CoreError> {
        let bill = self.store.delete_payment(id).await?;
        info!(payment = %id, bill = %bill.id, status = %bill.status, "payment deleted");
        self.balance(bill.id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use pretty_assertions::assert_eq;

    use crate::model::{
        LifecycleState, NewBill, NewPackage, NewSubscriber, PackageStatus, PaymentMethod, Period,
    };
    use crate::repository::{PackageRepository, SubscriberRepository};
    use crate::store::MemoryStore;

    async fn bill_of(amount: i64) -> (Ledger<MemoryStore>, BillId) {
        let store = MemoryStore::new();
        let package = store
            .insert_package(NewPackage {
                name: "Basic".into(),
                price: Decimal::from(amount),
                bandwidth_label: None,
                description: None,
                status: PackageStatus::Active,
            })
            .await
            .unwrap();
        let subscriber = store
            .insert_subscriber(NewSubscriber {
                display_name: "Rina".into(),
                address: None,
                contact: None,
                ppp_username: "rina".into(),
                ppp_secret: "abcd1234".into(),
                package_id: package.id,
                ip_pool_hint: None,
                state: LifecycleState::Active,
                registered_at: Utc::now(),
                note: None,
            })
            .await
            .unwrap();
        let bill = store
            .insert_bill(NewBill {
                subscriber_id: subscriber.id,
                period: Period::new(2025, 4).unwrap(),
                amount: Decimal::from(amount),
                due_date: NaiveDate::from_ymd_opt(2025, 4, 8).unwrap(),
                note: None,
            })
            .await
            .unwrap();
        (Ledger::new(store), bill.id)
    }

    fn pay(bill_id: BillId, amount: i64) -> NewPayment {
        NewPayment {
            bill_id,
            paid_on: NaiveDate::from_ymd_opt(2025, 4, 3).unwrap(),
            amount: Decimal::from(amount),
            method: PaymentMethod::Transfer,
            proof_ref: None,
            note: None,
        }
    }

    #[tokio::test]
    async fn partial_then_full_payment() {
        let (ledger, bill) = bill_of(150_000).await;

        let first = ledger.record_payment(pay(bill, 50_000)).await.unwrap();
        assert!(!first.settled);
        assert_eq!(first.balance.remaining, Decimal::from(100_000));

        let second = ledger.record_payment(pay(bill, 100_000)).await.unwrap();
        assert!(second.settled);
        assert_eq!(second.balance.bill.status, BillStatus::Paid);
        assert_eq!(second.balance.remaining, Decimal::ZERO);

        let err = ledger.record_payment(pay(bill, 1)).await.unwrap_err();
        assert!(matches!(err, CoreError::ValidationFailed { .. }));
    }

    #[tokio::test]
    async fn deleting_payment_reopens_bill() {
        let (ledger, bill) = bill_of(100_000).await;
        let settlement = ledger.record_payment(pay(bill, 100_000)).await.unwrap();

        let balance = ledger.delete_payment(settlement.payment.id).await.unwrap();
        assert_eq!(balance.bill.status, BillStatus::Unpaid);
        assert_eq!(balance.paid, Decimal::ZERO);
    }

    #[tokio::test]
    async fn rejects_non_positive_amount() {
        let (ledger, bill) = bill_of(100_000).await;
        let err = ledger.record_payment(pay(bill, 0)).await.unwrap_err();
        assert!(matches!(err, CoreError::ValidationFailed { .. }));
    }
}
