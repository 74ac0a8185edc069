#![warn(clippy::unwrap_used)]

pub mod catalog;
pub mod ledger;

pub use catalog::seeded_rewards;
pub use ledger::LoyaltyLedger;
