//! bidwatch: property engagement tracking and bidding-war detection.
//!
//! Two cooperating components over an injected persistence backend:
//!
//! - [`PropertyTracker`] records view/like events per property and per user,
//!   and computes time-windowed metrics plus a bounded competition score on
//!   demand.
//! - [`BiddingWarDetector`] evaluates each liked property against threshold
//!   rules, classifies competition and warning levels, and dispatches
//!   cooldown-limited alerts through a pluggable [`notify::NotificationSink`].
//!
//! Wall-clock time, market data, notification delivery, and storage are all
//! injected capabilities, so detection is fully deterministic under test.
//!
//! ```no_run
//! use std::sync::Arc;
//! use bidwatch::clock::SystemClock;
//! use bidwatch::detector::BiddingWarDetector;
//! use bidwatch::market::SimulatedMarketProvider;
//! use bidwatch::notify::LogSink;
//! use bidwatch::storage::FileBackend;
//! use bidwatch::tracker::PropertyTracker;
//!
//! # fn main() -> bidwatch::Result<()> {
//! let backend = Arc::new(FileBackend::open_default()?);
//! let clock = Arc::new(SystemClock);
//! let tracker = Arc::new(PropertyTracker::new(backend.clone(), clock.clone()));
//! let detector = Arc::new(BiddingWarDetector::new(
//!     tracker.clone(),
//!     Arc::new(SimulatedMarketProvider),
//!     Arc::new(LogSink),
//!     clock,
//!     backend,
//!     "buyer@example.com",
//! )?);
//!
//! tracker.record_view("prop-17", serde_json::json!({"address": "12 Elm St"}))?;
//! let _handle = bidwatch::monitor::start(detector, std::time::Duration::from_secs(30 * 60));
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod detector;
pub mod error;
pub mod market;
pub mod monitor;
pub mod notify;
pub mod storage;
pub mod tracker;
pub mod types;

pub use detector::BiddingWarDetector;
pub use error::{Result, TrackerError};
pub use tracker::PropertyTracker;
