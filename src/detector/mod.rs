//! Bidding-war detection.
//!
//! Turns engagement metrics and market conditions into a classified,
//! rate-limited alert. Classification is pure and recomputed from scratch on
//! every analysis; only the notification cooldown ledger persists.

pub mod engine;
pub mod indicators;
pub mod rules;

pub use engine::BiddingWarDetector;
pub use rules::DetectionRules;
