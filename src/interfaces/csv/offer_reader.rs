use crate::domain::offer::Offer;
use crate::error::{PayoutError, Result};
use std::io::Read;

/// Reads offer records from a CSV source with columns
/// `id, status, payable_amount, currency`.
///
/// An empty `payable_amount` column means the offer has not been valued yet.
pub struct OfferReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OfferReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes offers, one `Result` per record.
    pub fn offers(self) -> impl Iterator<Item = Result<Offer>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(PayoutError::from))
    }
}
