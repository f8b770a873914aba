//! Domain layer: payout value types and the ports the engine depends on.

pub mod currency;
pub mod ledger;
pub mod offer;
pub mod payout;
pub mod ports;
