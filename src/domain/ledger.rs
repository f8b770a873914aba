use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::currency;
use super::payout::PayoutMethod;

/// An immutable double-entry record capturing one money movement.
///
/// Entries are append-only: no store exposes an update or delete.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub offer_id: Uuid,
    pub debit_account: String,
    pub credit_account: String,
    /// Amount in minor units.
    pub amount: i64,
    pub currency: String,
    pub description: String,
    pub transaction_type: String,
    pub reference_id: String,
    pub timestamp: DateTime<Utc>,
}

impl LedgerEntry {
    /// The amount in major units of the entry's currency, e.g. `50000` EUR
    /// cents becomes `500.00` while `50000` JPY stays `50000`.
    pub fn major_amount(&self) -> Decimal {
        currency::to_major_units(self.amount, &self.currency)
    }

    /// The provider that moved the money, recovered from the transaction type.
    pub fn payout_method(&self) -> Option<PayoutMethod> {
        self.transaction_type
            .strip_suffix("_payout")
            .and_then(PayoutMethod::parse)
    }
}

/// The fields a caller supplies when appending to the ledger.
#[derive(Debug, PartialEq, Clone)]
pub struct NewLedgerEntry {
    pub offer_id: Uuid,
    pub debit_account: String,
    pub credit_account: String,
    pub amount: i64,
    pub currency: String,
    pub reference_id: String,
    pub description: String,
    pub transaction_type: String,
}
