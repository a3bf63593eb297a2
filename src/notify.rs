//! Notification delivery seam.
//!
//! Anything able to deliver a formatted bidding-war alert — email gateway,
//! in-app banner, native notification — implements `NotificationSink`.
//! Failures surface as `TrackerError::SinkDelivery`; the detector logs them
//! and leaves the cooldown ledger untouched so a retry stays possible.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{DeliveryOutcome, WarningPayload};

#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one alert. Must return an error rather than panic on failure.
    async fn send(
        &self,
        recipient: &str,
        property: &Value,
        warning: &WarningPayload,
    ) -> Result<DeliveryOutcome>;
}

/// Sink that writes the alert to the log. Useful as a default wiring and in
/// hosts that surface alerts through their own UI.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn send(
        &self,
        recipient: &str,
        property: &Value,
        warning: &WarningPayload,
    ) -> Result<DeliveryOutcome> {
        let address = property
            .get("address")
            .and_then(|a| a.as_str())
            .unwrap_or("unknown address");
        log::info!(
            "Bidding war alert for {} -> {}: level {:?}, {} views in 24h, {} likes",
            address,
            recipient,
            warning.warning_level,
            warning.views_24h,
            warning.total_likes
        );
        Ok(DeliveryOutcome {
            message_id: Uuid::new_v4().to_string(),
        })
    }
}

#[cfg(test)]
pub mod test_utils {
    use std::sync::atomic::{AtomicBool, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::error::TrackerError;

    /// Records every delivery; can be switched into a failing mode.
    #[derive(Default)]
    pub struct RecordingSink {
        pub sent: Mutex<Vec<(String, WarningPayload)>>,
        pub fail: AtomicBool,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_failing(&self, failing: bool) {
            self.fail.store(failing, Ordering::SeqCst);
        }

        pub fn sent_count(&self) -> usize {
            self.sent.lock().len()
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn send(
            &self,
            recipient: &str,
            _property: &Value,
            warning: &WarningPayload,
        ) -> Result<DeliveryOutcome> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(TrackerError::SinkDelivery("simulated outage".to_string()));
            }
            self.sent
                .lock()
                .push((recipient.to_string(), warning.clone()));
            Ok(DeliveryOutcome {
                message_id: format!("msg-{}", self.sent.lock().len()),
            })
        }
    }
}
