//! HTTP adapters for the primary and secondary payout providers.

mod http;
pub mod stripe;
pub mod wise;

pub use stripe::StripeTransferProvider;
pub use wise::WiseTransferProvider;
