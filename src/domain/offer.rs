use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of an offer, as recorded by the offer store.
///
/// Only the `ReadyForPayout -> PaidOut` transition is owned by the payout engine.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferStatus {
    Pending,
    ReadyForPayout,
    PaidOut,
}

impl OfferStatus {
    pub fn is_paid(&self) -> bool {
        *self == OfferStatus::PaidOut
    }
}

/// A completed sale eligible for payout. Owned by an external service.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Offer {
    pub id: Uuid,
    pub status: OfferStatus,
    /// Amount owed to the seller, in minor units. `None` until valuation completes.
    pub payable_amount: Option<i64>,
    pub currency: String,
}

impl Offer {
    pub fn new(id: Uuid, payable_amount: Option<i64>, currency: impl Into<String>) -> Self {
        Self {
            id,
            status: OfferStatus::ReadyForPayout,
            payable_amount,
            currency: currency.into(),
        }
    }
}

/// Result of an offer status write.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StatusWrite {
    Updated,
    NotFound,
}
