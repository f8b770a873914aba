use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Which provider disbursed the funds.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PayoutMethod {
    Primary,
    Secondary,
}

impl PayoutMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutMethod::Primary => "primary",
            PayoutMethod::Secondary => "secondary",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "primary" => Some(PayoutMethod::Primary),
            "secondary" => Some(PayoutMethod::Secondary),
            _ => None,
        }
    }
}

impl fmt::Display for PayoutMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message on the payout-request topic. Immutable once emitted.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PayoutRequest {
    pub event_id: Uuid,
    pub offer_id: Uuid,
    pub amount_cents: i64,
    pub currency_code: String,
    #[serde(default)]
    pub recipient_details: Option<serde_json::Value>,
    pub requested_at: DateTime<Utc>,
}

impl PayoutRequest {
    pub fn new(offer_id: Uuid, amount_cents: i64, currency_code: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            offer_id,
            amount_cents,
            currency_code: currency_code.into(),
            recipient_details: None,
            requested_at: Utc::now(),
        }
    }
}

/// Where a queued payout task came from.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TaskSource {
    Broker,
    ManualRetry,
}

/// A unit of work for the worker pool.
#[derive(Debug, PartialEq, Clone)]
pub struct PayoutTask {
    pub offer_id: Uuid,
    /// The request event that triggered the task, absent for manual retries.
    pub request_id: Option<Uuid>,
    pub requested_amount: Option<i64>,
    pub source: TaskSource,
}

impl PayoutTask {
    pub fn manual(offer_id: Uuid) -> Self {
        Self {
            offer_id,
            request_id: None,
            requested_amount: None,
            source: TaskSource::ManualRetry,
        }
    }
}

impl From<PayoutRequest> for PayoutTask {
    fn from(request: PayoutRequest) -> Self {
        Self {
            offer_id: request.offer_id,
            request_id: Some(request.event_id),
            requested_amount: Some(request.amount_cents),
            source: TaskSource::Broker,
        }
    }
}

/// The money movement handed to a provider adapter.
#[derive(Debug, PartialEq, Clone)]
pub struct Disbursement {
    pub offer_id: Uuid,
    /// Amount in minor units.
    pub amount: i64,
    pub currency: String,
    pub description: String,
    pub metadata: BTreeMap<String, String>,
}

impl Disbursement {
    pub fn for_offer(offer_id: Uuid, amount: i64, currency: impl Into<String>) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert("offer_id".to_string(), offer_id.to_string());
        Self {
            offer_id,
            amount,
            currency: currency.into(),
            description: format!("Payout for offer {offer_id}"),
            metadata,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeStatus {
    Success,
    Failure,
}

/// Message on the payout-completed topic, emitted once per executed attempt.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PayoutOutcomeEvent {
    pub event_id: Uuid,
    pub offer_id: Uuid,
    pub payout_method: Option<PayoutMethod>,
    pub reference_id: Option<String>,
    pub amount_cents: Option<i64>,
    pub currency_code: String,
    pub status: OutcomeStatus,
    pub failure_reason: Option<String>,
    pub completed_at: DateTime<Utc>,
}

/// States of a single payout attempt.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PayoutStage {
    Received,
    AttemptingPrimary,
    AttemptingSecondary,
    Succeeded,
    Failed,
    Completed,
}

/// What a successful (or already settled) payout attempt produced.
#[derive(Debug, PartialEq, Clone)]
pub struct PayoutReport {
    pub offer_id: Uuid,
    pub method: Option<PayoutMethod>,
    pub reference_id: Option<String>,
    pub amount: Option<i64>,
    pub currency: String,
    pub ledger_entry_id: Option<Uuid>,
    /// The offer was already paid; nothing new was disbursed.
    pub already_paid: bool,
    pub stages: Vec<PayoutStage>,
}
