use super::http;
use crate::config::StripeConfig;
use crate::domain::payout::{Disbursement, PayoutMethod};
use crate::domain::ports::PayoutProvider;
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

const PROVIDER: &str = "stripe";

#[derive(Debug, Deserialize)]
struct TransferResponse {
    id: String,
}

/// Primary provider: a transfer to a Stripe connected account.
pub struct StripeTransferProvider {
    client: Client,
    config: StripeConfig,
}

impl StripeTransferProvider {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            client: http::client(config.timeout_ms),
            config,
        }
    }
}

#[async_trait]
impl PayoutProvider for StripeTransferProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn method(&self) -> PayoutMethod {
        PayoutMethod::Primary
    }

    async fn disburse(&self, disbursement: &Disbursement) -> Result<String, ProviderError> {
        let api_key = http::required(PROVIDER, "api_key", &self.config.api_key)?;
        let destination = http::required(
            PROVIDER,
            "connect_account_id",
            &self.config.connect_account_id,
        )?;

        let mut form = vec![
            ("amount".to_string(), disbursement.amount.to_string()),
            ("currency".to_string(), disbursement.currency.to_lowercase()),
            ("destination".to_string(), destination.to_string()),
            ("description".to_string(), disbursement.description.clone()),
        ];
        form.extend(
            disbursement
                .metadata
                .iter()
                .map(|(key, value)| (format!("metadata[{}]", key), value.clone())),
        );

        let request = self
            .client
            .post(format!("{}/v1/transfers", self.config.base_url.trim_end_matches('/')))
            .bearer_auth(api_key)
            .header("Idempotency-Key", format!("payout-{}", disbursement.offer_id))
            .form(&form);

        let transfer: TransferResponse = http::send_json(PROVIDER, request).await?;
        tracing::info!(
            offer_id = %disbursement.offer_id,
            transfer_id = %transfer.id,
            "stripe_transfer_created"
        );
        Ok(transfer.id)
    }
}
