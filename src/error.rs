use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, PayoutError>;

/// Failure raised by a payout provider adapter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Required credentials or destination are missing. Raised before any network call.
    #[error("{provider} is not configured: {reason}")]
    Config { provider: String, reason: String },
    /// The provider answered with an error, or could not be reached.
    #[error("{provider} API error [{code}]: {message}")]
    Api {
        provider: String,
        code: String,
        message: String,
        retryable: bool,
    },
    #[error("unexpected {provider} failure: {message}")]
    Unexpected { provider: String, message: String },
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Config { .. } => false,
            ProviderError::Api { retryable, .. } => *retryable,
            ProviderError::Unexpected { .. } => true,
        }
    }

    pub fn code(&self) -> &str {
        match self {
            ProviderError::Config { .. } => "config_missing",
            ProviderError::Api { code, .. } => code,
            ProviderError::Unexpected { .. } => "unexpected",
        }
    }
}

/// Outcome of a call routed through a circuit breaker.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CallError {
    #[error("circuit breaker '{0}' is open")]
    CircuitOpen(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("broker error: {0}")]
pub struct BrokerError(pub String);

#[derive(Error, Debug)]
pub enum PayoutError {
    #[error("offer {0} not found")]
    NotFound(Uuid),
    #[error("offer {offer_id} is not payable: {reason}")]
    InvalidState { offer_id: Uuid, reason: String },
    #[error("provider configuration error: {0}")]
    ProviderConfig(String),
    #[error("all payout providers failed: {reason}")]
    ProvidersExhausted { reason: String, retryable: bool },
    #[error("data integrity violation for offer {offer_id}: {reason}")]
    DataIntegrity { offer_id: Uuid, reason: String },
    #[error("storage error: {0}")]
    Storage(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
    #[error("payout task queue is closed")]
    QueueClosed,
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Broker(#[from] BrokerError),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PayoutError {
    /// Whether the task-level retry controller may dispatch the payout again.
    pub fn is_retryable(&self) -> bool {
        match self {
            PayoutError::ProvidersExhausted { retryable, .. } => *retryable,
            PayoutError::Storage(_) | PayoutError::Unexpected(_) | PayoutError::Broker(_) => true,
            _ => false,
        }
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for PayoutError {
    fn from(err: rocksdb::Error) -> Self {
        PayoutError::Storage(err.to_string())
    }
}
