use crate::domain::ledger::LedgerEntry;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;
use uuid::Uuid;

#[derive(Serialize)]
struct LedgerRow<'a> {
    id: Uuid,
    offer_id: Uuid,
    debit_account: &'a str,
    credit_account: &'a str,
    amount: Decimal,
    currency: &'a str,
    transaction_type: &'a str,
    reference_id: &'a str,
    timestamp: String,
}

/// Writes ledger entries as CSV with amounts in major units.
pub struct LedgerCsvWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> LedgerCsvWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_entries(&mut self, entries: &[LedgerEntry]) -> Result<()> {
        for entry in entries {
            self.writer.serialize(LedgerRow {
                id: entry.id,
                offer_id: entry.offer_id,
                debit_account: &entry.debit_account,
                credit_account: &entry.credit_account,
                amount: entry.major_amount(),
                currency: &entry.currency,
                transaction_type: &entry.transaction_type,
                reference_id: &entry.reference_id,
                timestamp: entry.timestamp.to_rfc3339(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
