use crate::error::{PayoutError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Runtime settings. Every section has defaults, so an empty file is valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub broker: BrokerConfig,
    pub breaker: BreakerConfig,
    pub retry: RetryConfig,
    pub workers: WorkerConfig,
    pub ledger: LedgerConfig,
    pub providers: ProvidersConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub request_topic: String,
    pub outcome_topic: String,
    pub consumer_group: String,
    pub poll_timeout_ms: u64,
    pub error_backoff_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            request_topic: "payout.requested".to_string(),
            outcome_topic: "payout.completed".to_string(),
            consumer_group: "payouts-worker-group".to_string(),
            poll_timeout_ms: 1_000,
            error_backoff_ms: 5_000,
        }
    }
}

impl BrokerConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms.max(1))
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout_ms: 180_000,
        }
    }
}

impl BreakerConfig {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total executions of one task, including the first.
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub concurrency: usize,
    pub queue_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            queue_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Debit side of every payout; suffixed with the lowercase currency.
    pub cash_account: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            cash_account: "cash_on_hand".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub stripe: StripeConfig,
    pub wise: WiseConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StripeConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Connected account that receives the transfer.
    pub connect_account_id: Option<String>,
    pub timeout_ms: u64,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.stripe.com".to_string(),
            api_key: None,
            connect_account_id: None,
            timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WiseConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub profile_id: Option<String>,
    pub recipient_account_id: Option<String>,
    pub timeout_ms: u64,
}

impl Default for WiseConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.transferwise.com".to_string(),
            api_token: None,
            profile_id: None,
            recipient_account_id: None,
            timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "payout_engine=info".to_string(),
            json: false,
        }
    }
}

impl Settings {
    /// Loads settings from an optional TOML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                Self::from_toml(&content)?
            }
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| PayoutError::Config(e.to_string()))
    }

    /// Overrides provider credentials with any values found by `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let stripe = &mut self.providers.stripe;
        if let Some(value) = lookup("STRIPE_API_KEY") {
            stripe.api_key = Some(value);
        }
        if let Some(value) = lookup("STRIPE_CONNECT_ID") {
            stripe.connect_account_id = Some(value);
        }

        let wise = &mut self.providers.wise;
        if let Some(value) = lookup("WISE_TOKEN") {
            wise.api_token = Some(value);
        }
        if let Some(value) = lookup("WISE_PROFILE_ID") {
            wise.profile_id = Some(value);
        }
        if let Some(value) = lookup("WISE_RECIPIENT_ID") {
            wise.recipient_account_id = Some(value);
        }
    }
}
