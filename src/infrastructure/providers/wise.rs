use super::http;
use crate::config::WiseConfig;
use crate::domain::currency::to_major_units;
use crate::domain::payout::{Disbursement, PayoutMethod};
use crate::domain::ports::PayoutProvider;
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

const PROVIDER: &str = "wise";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuoteRequest {
    source_currency: String,
    target_currency: String,
    #[serde(with = "rust_decimal::serde::float")]
    target_amount: Decimal,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TransferResponse {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct FundResponse {
    status: String,
}

/// Secondary provider: quote, create and fund a Wise transfer from the balance.
pub struct WiseTransferProvider {
    client: Client,
    config: WiseConfig,
}

impl WiseTransferProvider {
    pub fn new(config: WiseConfig) -> Self {
        Self {
            client: http::client(config.timeout_ms),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl PayoutProvider for WiseTransferProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn method(&self) -> PayoutMethod {
        PayoutMethod::Secondary
    }

    async fn disburse(&self, disbursement: &Disbursement) -> Result<String, ProviderError> {
        let token = http::required(PROVIDER, "api_token", &self.config.api_token)?;
        let profile = http::required(PROVIDER, "profile_id", &self.config.profile_id)?;
        let recipient = http::required(
            PROVIDER,
            "recipient_account_id",
            &self.config.recipient_account_id,
        )?;
        let recipient: i64 = recipient.trim().parse().map_err(|_| ProviderError::Config {
            provider: PROVIDER.to_string(),
            reason: "recipient_account_id must be a numeric account id".to_string(),
        })?;
        let currency = disbursement.currency.to_uppercase();

        let quote: QuoteResponse = http::send_json(
            PROVIDER,
            self.client
                .post(self.url(&format!("/v3/profiles/{}/quotes", profile)))
                .bearer_auth(token)
                .json(&QuoteRequest {
                    source_currency: currency.clone(),
                    target_currency: currency.clone(),
                    target_amount: to_major_units(disbursement.amount, &currency),
                }),
        )
        .await?;

        let transfer: TransferResponse = http::send_json(
            PROVIDER,
            self.client
                .post(self.url("/v1/transfers"))
                .bearer_auth(token)
                .json(&json!({
                    "targetAccount": recipient,
                    "quoteUuid": quote.id,
                    "customerTransactionId": disbursement.offer_id,
                    "details": { "reference": disbursement.description },
                })),
        )
        .await?;

        let funded: FundResponse = http::send_json(
            PROVIDER,
            self.client
                .post(self.url(&format!(
                    "/v3/profiles/{}/transfers/{}/payments",
                    profile, transfer.id
                )))
                .bearer_auth(token)
                .json(&json!({ "type": "BALANCE" })),
        )
        .await?;

        if funded.status != "COMPLETED" {
            return Err(ProviderError::Api {
                provider: PROVIDER.to_string(),
                code: "funding_rejected".to_string(),
                message: format!("transfer {} funding status {}", transfer.id, funded.status),
                retryable: false,
            });
        }

        tracing::info!(
            offer_id = %disbursement.offer_id,
            transfer_id = transfer.id,
            quote_id = %quote.id,
            "wise_transfer_funded"
        );
        Ok(transfer.id.to_string())
    }
}
