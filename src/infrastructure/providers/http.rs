use crate::error::ProviderError;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// Builds the client shared by one adapter. Falls back to a default client if
/// the TLS backend cannot be configured with the requested timeout.
pub(crate) fn client(timeout_ms: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "http_client_build_failed");
            Client::new()
        })
}

/// Sends `request` and decodes a 2xx JSON body into `T`, classifying failures.
///
/// 429 and 5xx are retryable, any other non-success status is an explicit
/// rejection. Transport failures are reported with the `network` code.
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: &str,
    request: RequestBuilder,
) -> Result<T, ProviderError> {
    let response = request.send().await.map_err(|e| ProviderError::Api {
        provider: provider.to_string(),
        code: "network".to_string(),
        message: e.to_string(),
        retryable: true,
    })?;

    let status = response.status();
    let body = response.text().await.map_err(|e| ProviderError::Api {
        provider: provider.to_string(),
        code: "network".to_string(),
        message: e.to_string(),
        retryable: true,
    })?;

    if !status.is_success() {
        let (code, message) = error_details(status, &body);
        return Err(ProviderError::Api {
            provider: provider.to_string(),
            code,
            message,
            retryable: is_retryable_status(status),
        });
    }

    serde_json::from_str(&body).map_err(|e| ProviderError::Unexpected {
        provider: provider.to_string(),
        message: format!("undecodable response body: {}", e),
    })
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Extracts `(code, message)` from the error shapes both providers use:
/// `{"error": {"code", "message"}}` and `{"errors": [{"code", "message"}]}`.
fn error_details(status: StatusCode, body: &str) -> (String, String) {
    let fallback = (format!("http_{}", status.as_u16()), body.trim().to_string());
    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return fallback;
    };

    let detail = json
        .get("error")
        .filter(|error| error.is_object())
        .or_else(|| json.get("errors").and_then(|errors| errors.get(0)));
    let Some(detail) = detail else {
        return fallback;
    };

    let code = detail
        .get("code")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or(fallback.0);
    let message = detail
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or(fallback.1);
    (code, message)
}

/// Returns the value of a required setting, or a configuration error.
pub(crate) fn required<'a>(
    provider: &str,
    field: &str,
    value: &'a Option<String>,
) -> Result<&'a str, ProviderError> {
    match value.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ProviderError::Config {
            provider: provider.to_string(),
            reason: format!("{} is not set", field),
        }),
    }
}
