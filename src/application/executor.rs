use crate::application::circuit_breaker::CircuitBreaker;
use crate::application::ledger::LedgerWriter;
use crate::application::publisher::{Outcome, OutcomePublisher};
use crate::domain::offer::{Offer, OfferStatus, StatusWrite};
use crate::domain::payout::{
    Disbursement, OutcomeStatus, PayoutMethod, PayoutReport, PayoutStage, PayoutTask,
};
use crate::domain::ports::{OfferStoreRef, ProviderRef};
use crate::error::{CallError, PayoutError, ProviderError, Result};
use std::sync::Arc;
use uuid::Uuid;

/// Orchestrates one payout attempt for an offer.
///
/// The primary provider is called through its circuit breaker; the secondary is
/// called directly when the primary is failing or its circuit is open. On
/// success one ledger entry is appended and the offer is marked paid. Every
/// attempt that finds its offer ends by publishing exactly one outcome event,
/// whatever path it took.
pub struct PayoutExecutor {
    offers: OfferStoreRef,
    ledger: LedgerWriter,
    primary: ProviderRef,
    secondary: ProviderRef,
    breaker: Arc<CircuitBreaker>,
    publisher: Arc<OutcomePublisher>,
}

/// Mutable record of an attempt in progress.
struct Attempt {
    offer_id: Uuid,
    currency: String,
    amount: Option<i64>,
    method: Option<PayoutMethod>,
    reference_id: Option<String>,
    ledger_entry_id: Option<Uuid>,
    already_paid: bool,
    stages: Vec<PayoutStage>,
}

impl Attempt {
    fn new(offer_id: Uuid) -> Self {
        Self {
            offer_id,
            currency: String::new(),
            amount: None,
            method: None,
            reference_id: None,
            ledger_entry_id: None,
            already_paid: false,
            stages: vec![PayoutStage::Received],
        }
    }

    fn advance(&mut self, stage: PayoutStage) {
        tracing::debug!(offer_id = %self.offer_id, stage = ?stage, "payout_stage");
        self.stages.push(stage);
    }

    fn outcome(&self, result: &Result<()>) -> Outcome {
        let (status, failure_reason) = match result {
            Ok(()) => (OutcomeStatus::Success, None),
            Err(PayoutError::DataIntegrity { reason, .. }) => {
                (OutcomeStatus::Failure, Some(format!("data_integrity: {reason}")))
            }
            Err(err) => (OutcomeStatus::Failure, Some(err.to_string())),
        };
        Outcome {
            offer_id: self.offer_id,
            method: self.method,
            reference_id: self.reference_id.clone(),
            amount: self.amount,
            currency: self.currency.clone(),
            status,
            failure_reason,
        }
    }

    fn into_report(self) -> PayoutReport {
        PayoutReport {
            offer_id: self.offer_id,
            method: self.method,
            reference_id: self.reference_id,
            amount: self.amount,
            currency: self.currency,
            ledger_entry_id: self.ledger_entry_id,
            already_paid: self.already_paid,
            stages: self.stages,
        }
    }
}

impl PayoutExecutor {
    pub fn new(
        offers: OfferStoreRef,
        ledger: LedgerWriter,
        primary: ProviderRef,
        secondary: ProviderRef,
        breaker: Arc<CircuitBreaker>,
        publisher: Arc<OutcomePublisher>,
    ) -> Self {
        Self {
            offers,
            ledger,
            primary,
            secondary,
            breaker,
            publisher,
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Executes the payout for `task.offer_id`.
    ///
    /// A missing offer returns [`PayoutError::NotFound`] without publishing.
    /// Every other path publishes one outcome event before returning.
    pub async fn execute(&self, task: &PayoutTask) -> Result<PayoutReport> {
        let mut attempt = Attempt::new(task.offer_id);
        tracing::info!(offer_id = %task.offer_id, source = ?task.source, "payout_started");

        let result = match self.offers.read(task.offer_id).await {
            Ok(Some(offer)) => {
                attempt.currency = offer.currency.clone();
                if let (Some(requested), Some(payable)) =
                    (task.requested_amount, offer.payable_amount)
                    && requested != payable
                {
                    tracing::warn!(
                        offer_id = %offer.id,
                        requested,
                        payable,
                        "requested_amount_differs_from_offer"
                    );
                }
                self.run(&offer, &mut attempt).await
            }
            Ok(None) => {
                tracing::error!(offer_id = %task.offer_id, "offer_not_found");
                return Err(PayoutError::NotFound(task.offer_id));
            }
            Err(err) => Err(err),
        };

        if let Err(err) = &result {
            attempt.advance(PayoutStage::Failed);
            tracing::error!(
                offer_id = %task.offer_id,
                error = %err,
                retryable = err.is_retryable(),
                "payout_failed"
            );
        }
        attempt.advance(PayoutStage::Completed);

        self.publisher.publish(attempt.outcome(&result)).await;
        result.map(|()| attempt.into_report())
    }

    async fn run(&self, offer: &Offer, attempt: &mut Attempt) -> Result<()> {
        if offer.status.is_paid() {
            return self.describe_prior_payout(offer, attempt).await;
        }
        if offer.status != OfferStatus::ReadyForPayout {
            return Err(PayoutError::InvalidState {
                offer_id: offer.id,
                reason: format!("offer status {:?} is not ready for payout", offer.status),
            });
        }

        let amount = match offer.payable_amount {
            Some(amount) if amount > 0 => amount,
            Some(amount) => {
                return Err(PayoutError::InvalidState {
                    offer_id: offer.id,
                    reason: format!("payable amount {amount} is not positive"),
                });
            }
            None => {
                return Err(PayoutError::InvalidState {
                    offer_id: offer.id,
                    reason: "payable amount is missing".to_string(),
                });
            }
        };
        attempt.amount = Some(amount);

        let disbursement = Disbursement::for_offer(offer.id, amount, &offer.currency);
        let (method, reference_id) = self.disburse(&disbursement, attempt).await?;
        attempt.method = Some(method);
        attempt.reference_id = Some(reference_id.clone());

        self.settle(offer, method, amount, &reference_id, attempt).await?;
        attempt.advance(PayoutStage::Succeeded);
        Ok(())
    }

    /// Duplicate delivery for a paid offer: report the earlier result, write nothing.
    async fn describe_prior_payout(&self, offer: &Offer, attempt: &mut Attempt) -> Result<()> {
        attempt.already_paid = true;
        attempt.amount = offer.payable_amount;

        let prior = self.ledger.entries_for_offer(offer.id).await?;
        if let Some(entry) = prior.last() {
            attempt.method = entry.payout_method();
            attempt.reference_id = Some(entry.reference_id.clone());
            attempt.ledger_entry_id = Some(entry.id);
            attempt.amount = Some(entry.amount);
        }

        tracing::info!(
            offer_id = %offer.id,
            reference_id = ?attempt.reference_id,
            "offer_already_paid"
        );
        attempt.advance(PayoutStage::Succeeded);
        Ok(())
    }

    async fn disburse(
        &self,
        disbursement: &Disbursement,
        attempt: &mut Attempt,
    ) -> Result<(PayoutMethod, String)> {
        attempt.advance(PayoutStage::AttemptingPrimary);
        let primary = self
            .breaker
            .call(|| self.primary.disburse(disbursement))
            .await;

        let primary_failure = match primary {
            Ok(reference_id) => {
                tracing::info!(
                    offer_id = %disbursement.offer_id,
                    provider = self.primary.name(),
                    reference_id = %reference_id,
                    "primary_payout_succeeded"
                );
                return Ok((self.primary.method(), reference_id));
            }
            Err(CallError::Provider(ProviderError::Config { provider, reason })) => {
                return Err(PayoutError::ProviderConfig(format!("{provider}: {reason}")));
            }
            Err(CallError::CircuitOpen(breaker)) => {
                tracing::warn!(
                    offer_id = %disbursement.offer_id,
                    breaker = %breaker,
                    "primary_circuit_open_falling_back"
                );
                format!("circuit breaker '{breaker}' is open")
            }
            Err(CallError::Provider(err)) => {
                tracing::warn!(
                    offer_id = %disbursement.offer_id,
                    error = %err,
                    "primary_payout_failed_falling_back"
                );
                err.to_string()
            }
        };

        attempt.advance(PayoutStage::AttemptingSecondary);
        match self.secondary.disburse(disbursement).await {
            Ok(reference_id) => {
                tracing::info!(
                    offer_id = %disbursement.offer_id,
                    provider = self.secondary.name(),
                    reference_id = %reference_id,
                    "secondary_payout_succeeded"
                );
                Ok((self.secondary.method(), reference_id))
            }
            Err(err) => Err(PayoutError::ProvidersExhausted {
                reason: format!("primary: {primary_failure}; secondary: {err}"),
                retryable: err.is_retryable(),
            }),
        }
    }

    /// Books the disbursement. Failures here happen after money moved, so they
    /// are reported as data-integrity violations and never retried.
    async fn settle(
        &self,
        offer: &Offer,
        method: PayoutMethod,
        amount: i64,
        reference_id: &str,
        attempt: &mut Attempt,
    ) -> Result<()> {
        let entry = self
            .ledger
            .record_payout(offer.id, method, amount, &offer.currency, reference_id)
            .await
            .map_err(|e| PayoutError::DataIntegrity {
                offer_id: offer.id,
                reason: format!(
                    "ledger append failed after {method} disbursement {reference_id}: {e}"
                ),
            })?;
        attempt.ledger_entry_id = Some(entry.id);

        let reason = match self.offers.write_status(offer.id, OfferStatus::PaidOut).await {
            Ok(StatusWrite::Updated) => {
                tracing::info!(offer_id = %offer.id, "offer_marked_paid");
                return Ok(());
            }
            Ok(StatusWrite::NotFound) => format!(
                "offer disappeared before status update; ledger entry {} committed",
                entry.id
            ),
            Err(e) => format!(
                "offer status update failed ({e}); ledger entry {} committed",
                entry.id
            ),
        };
        tracing::error!(
            offer_id = %offer.id,
            ledger_entry_id = %entry.id,
            reason = %reason,
            "payout_data_integrity_violation"
        );
        Err(PayoutError::DataIntegrity {
            offer_id: offer.id,
            reason,
        })
    }
}
