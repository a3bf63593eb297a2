//! The bidding-war detector.
//!
//! Evaluates each liked property against the rule set, classifies competition
//! and warning levels, and dispatches rate-limited notifications. Only the
//! cooldown ledger persists across runs — every classification is recomputed
//! from the tracker's event log.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::clock::Clock;
use crate::error::Result;
use crate::market::MarketSignalProvider;
use crate::notify::NotificationSink;
use crate::storage::{PersistenceBackend, LEDGER_KEY};
use crate::tracker::{self, PropertyTracker};
use crate::types::{DetectionResult, DetectionStats, LikedProperty, WarningPayload};

use super::indicators;
use super::rules::DetectionRules;

/// Minimum elapsed time between two notifications for the same property.
const DEFAULT_COOLDOWN_HOURS: i64 = 24;

/// Dump of detector configuration and history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionExport {
    pub rules: DetectionRules,
    pub notifications: HashMap<String, DateTime<Utc>>,
    pub stats: DetectionStats,
    pub export_date: DateTime<Utc>,
}

pub struct BiddingWarDetector {
    tracker: Arc<PropertyTracker>,
    market: Arc<dyn MarketSignalProvider>,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    backend: Arc<dyn PersistenceBackend>,
    recipient: String,
    cooldown: Duration,
    rules: Mutex<DetectionRules>,
    /// propertyId -> last successful notification. Entries only move forward;
    /// a failed send never updates the ledger.
    ledger: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl BiddingWarDetector {
    /// Build a detector over an existing tracker. The cooldown ledger is
    /// loaded from the backend so restarts keep suppressing duplicate alerts.
    pub fn new(
        tracker: Arc<PropertyTracker>,
        market: Arc<dyn MarketSignalProvider>,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        backend: Arc<dyn PersistenceBackend>,
        recipient: impl Into<String>,
    ) -> Result<Self> {
        let ledger: HashMap<String, DateTime<Utc>> =
            tracker::load_or_default(backend.as_ref(), LEDGER_KEY)?;
        Ok(Self {
            tracker,
            market,
            sink,
            clock,
            backend,
            recipient: recipient.into(),
            cooldown: Duration::hours(DEFAULT_COOLDOWN_HOURS),
            rules: Mutex::new(DetectionRules::default()),
            ledger: Mutex::new(ledger),
        })
    }

    /// Override the notification cooldown.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn rules(&self) -> DetectionRules {
        self.rules.lock().clone()
    }

    /// Replace the active rule set.
    pub fn set_rules(&self, rules: DetectionRules) {
        *self.rules.lock() = rules;
        log::info!("Detection rules updated");
    }

    // -----------------------------------------------------------------------
    // Analysis
    // -----------------------------------------------------------------------

    /// Analyze one property: current metrics + market signal -> classified
    /// result. Pure given the injected clock and market provider.
    pub async fn analyze(&self, property_id: &str, property_data: &Value) -> Result<DetectionResult> {
        let metrics = self.tracker.metrics(property_id)?;
        let market = self.market.fetch(property_data).await?;
        let rules = self.rules.lock().clone();

        let ind = indicators::compute(&metrics, &market, &rules, self.clock.local_now());
        let level = indicators::competition_level(metrics.competition_score, &rules);
        let is_war = indicators::is_bidding_war(level, &ind);
        let warning = indicators::warning_level(is_war, level, &ind);
        let recommendations = indicators::recommendations(warning, &ind);

        Ok(DetectionResult {
            property_id: property_id.to_string(),
            metrics,
            market,
            indicators: ind,
            competition_level: level,
            is_bidding_war: is_war,
            warning_level: warning,
            recommendations,
            timestamp: self.clock.now(),
        })
    }

    /// Scan all liked properties in insertion order. Returns the results that
    /// classified as bidding wars; each triggers a cooldown-gated notify.
    /// One property's failure never aborts the rest of the scan.
    pub async fn scan(&self) -> Result<Vec<DetectionResult>> {
        let liked = self.tracker.liked_properties()?;
        let mut wars = Vec::new();

        for property in liked {
            let result = match self.analyze(&property.id, &property.property_data).await {
                Ok(r) => r,
                Err(e) => {
                    log::warn!("Analysis failed for property {}: {}", property.id, e);
                    continue;
                }
            };
            if !result.is_bidding_war {
                continue;
            }

            match self.notify(&property, &result).await {
                Ok(true) => {
                    log::info!("Bidding war notification sent for property {}", property.id);
                }
                Ok(false) => {}
                Err(e) => {
                    log::warn!(
                        "Failed to send bidding war notification for {}: {}",
                        property.id,
                        e
                    );
                }
            }
            wars.push(result);
        }

        Ok(wars)
    }

    // -----------------------------------------------------------------------
    // Notification
    // -----------------------------------------------------------------------

    /// Dispatch an alert for one detected bidding war.
    ///
    /// Returns `Ok(false)` without touching the sink when the per-property
    /// cooldown is still active or the user has bidding-war alerts disabled.
    /// The ledger is updated only after the sink accepted the delivery.
    pub async fn notify(&self, property: &LikedProperty, result: &DetectionResult) -> Result<bool> {
        let now = self.clock.now();

        {
            let ledger = self.ledger.lock();
            if let Some(last) = ledger.get(&property.id) {
                if now - *last < self.cooldown {
                    log::debug!("Notification cooldown active for property {}", property.id);
                    return Ok(false);
                }
            }
        }

        let prefs = self.tracker.notification_preferences()?;
        if !prefs.bidding_war {
            log::debug!("Bidding war notifications disabled by user");
            return Ok(false);
        }

        let warning = WarningPayload {
            views_24h: result.metrics.views_24h,
            total_likes: result.metrics.total_likes,
            similar_sold: result.market.similar_sold,
            competition_level: result.competition_level,
            warning_level: result.warning_level,
            recommendations: result.recommendations.clone(),
        };

        self.sink
            .send(&self.recipient, &property.property_data, &warning)
            .await?;

        let ledger_snapshot = {
            let mut ledger = self.ledger.lock();
            ledger.insert(property.id.clone(), now);
            ledger.clone()
        };
        tracker::save(self.backend.as_ref(), LEDGER_KEY, &ledger_snapshot)?;

        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Reporting
    // -----------------------------------------------------------------------

    /// Aggregate statistics across the user's liked properties.
    pub fn stats(&self) -> Result<DetectionStats> {
        let liked = self.tracker.liked_properties()?;
        let rules = self.rules.lock().clone();

        let mut total_score = 0u32;
        let mut high = 0usize;
        let mut medium = 0usize;
        for property in &liked {
            let metrics = self.tracker.metrics(&property.id)?;
            total_score += metrics.competition_score as u32;
            if metrics.competition_score >= rules.triggers.urgent_alert {
                high += 1;
            } else if metrics.competition_score >= rules.triggers.watch_alert {
                medium += 1;
            }
        }

        let average = if liked.is_empty() {
            0
        } else {
            (total_score as f64 / liked.len() as f64).round() as u32
        };

        Ok(DetectionStats {
            total_liked_properties: liked.len(),
            high_competition: high,
            medium_competition: medium,
            average_competition_score: average,
            notifications_sent: self.ledger.lock().len(),
        })
    }

    /// Export rules, notification history, and stats.
    pub fn export_detection(&self) -> Result<DetectionExport> {
        // Clone the ledger before building the struct: a temporary guard kept
        // alive across the `stats()` call would re-lock `ledger` and deadlock.
        let notifications = self.ledger.lock().clone();
        Ok(DetectionExport {
            rules: self.rules(),
            notifications,
            stats: self.stats()?,
            export_date: self.clock.now(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::error::TrackerError;
    use crate::market::{FixedMarketProvider, MarketSignalProvider};
    use crate::notify::test_utils::RecordingSink;
    use crate::storage::MemoryBackend;
    use crate::types::{CompetitionLevel, PreferenceUpdate, WarningLevel};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use serde_json::json;

    struct Fixture {
        clock: Arc<FixedClock>,
        tracker: Arc<PropertyTracker>,
        sink: Arc<RecordingSink>,
        detector: BiddingWarDetector,
    }

    fn fixture(market: FixedMarketProvider) -> Fixture {
        let _ = env_logger::builder().is_test(true).try_init();
        // A Monday at noon
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap(),
        ));
        let backend = Arc::new(MemoryBackend::new());
        let tracker = Arc::new(PropertyTracker::new(backend.clone(), clock.clone()));
        let sink = Arc::new(RecordingSink::new());
        let detector = BiddingWarDetector::new(
            tracker.clone(),
            Arc::new(market),
            sink.clone(),
            clock.clone(),
            backend,
            "buyer@example.com",
        )
        .unwrap();
        Fixture {
            clock,
            tracker,
            sink,
            detector,
        }
    }

    /// 55 views + 22 likes inside 24h pushes the score to critical territory.
    fn record_critical_activity(tracker: &PropertyTracker, id: &str) {
        for _ in 0..55 {
            tracker.record_view(id, json!({"address": "12 Elm St"})).unwrap();
        }
        for _ in 0..22 {
            tracker.record_like(id, json!({"address": "12 Elm St"})).unwrap();
        }
    }

    #[tokio::test]
    async fn test_critical_score_is_a_bidding_war_in_any_market() {
        let f = fixture(FixedMarketProvider::quiet());
        record_critical_activity(&f.tracker, "p1");

        let result = f.detector.analyze("p1", &json!({})).await.unwrap();
        assert!(result.metrics.competition_score >= 85);
        assert_eq!(result.competition_level, CompetitionLevel::Critical);
        assert!(result.is_bidding_war);
        assert_eq!(result.warning_level, WarningLevel::Critical);
        assert!(result.recommendations[0].contains("URGENT"));
    }

    #[tokio::test]
    async fn test_medium_level_without_growing_interest_is_not_a_war() {
        let f = fixture(FixedMarketProvider::hot());

        // 100 views and 20 likes three days ago: score lands exactly on the
        // medium cutoff (likes +25, weekly volume +15, engagement +10) while
        // views24h stays zero, so growingInterest cannot hold.
        for _ in 0..100 {
            f.tracker.record_view("p1", json!({})).unwrap();
        }
        for _ in 0..20 {
            f.tracker.record_like("p1", json!({})).unwrap();
        }
        f.clock.advance(Duration::days(3));

        let result = f.detector.analyze("p1", &json!({})).await.unwrap();
        assert_eq!(result.competition_level, CompetitionLevel::Medium);
        assert!(result.indicators.hot_market);
        assert!(result.indicators.fast_selling);
        assert!(!result.indicators.growing_interest);
        assert!(!result.is_bidding_war);
        assert_eq!(result.warning_level, WarningLevel::None);
    }

    #[tokio::test]
    async fn test_scan_notifies_and_respects_cooldown_boundaries() {
        let f = fixture(FixedMarketProvider::quiet());
        record_critical_activity(&f.tracker, "p1");

        let wars = f.detector.scan().await.unwrap();
        assert_eq!(wars.len(), 1);
        assert_eq!(f.sink.sent_count(), 1);

        // 23h59m after the send: still inside the cooldown window
        f.clock.advance(Duration::hours(23) + Duration::minutes(59));
        f.detector.scan().await.unwrap();
        assert_eq!(f.sink.sent_count(), 1);

        // 24h01m after the send: a fresh surge dispatches again
        f.clock.advance(Duration::minutes(2));
        record_critical_activity(&f.tracker, "p1");
        f.detector.scan().await.unwrap();
        assert_eq!(f.sink.sent_count(), 2);
    }

    #[tokio::test]
    async fn test_cooldown_override_shortens_the_window() {
        let f = fixture(FixedMarketProvider::quiet());
        record_critical_activity(&f.tracker, "p1");
        let detector = f.detector.with_cooldown(Duration::minutes(5));

        detector.scan().await.unwrap();
        assert_eq!(f.sink.sent_count(), 1);

        // Inside the shortened window: suppressed
        f.clock.advance(Duration::minutes(4));
        detector.scan().await.unwrap();
        assert_eq!(f.sink.sent_count(), 1);

        // Past it: dispatches again
        f.clock.advance(Duration::minutes(2));
        detector.scan().await.unwrap();
        assert_eq!(f.sink.sent_count(), 2);
    }

    #[tokio::test]
    async fn test_preference_gating_suppresses_sink_call() {
        let f = fixture(FixedMarketProvider::quiet());
        record_critical_activity(&f.tracker, "p1");
        f.tracker
            .update_notification_preferences(PreferenceUpdate {
                bidding_war: Some(false),
                ..Default::default()
            })
            .unwrap();

        let wars = f.detector.scan().await.unwrap();
        // Detection still reports the war; only delivery is suppressed
        assert_eq!(wars.len(), 1);
        assert_eq!(f.sink.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_sink_failure_leaves_ledger_untouched() {
        let f = fixture(FixedMarketProvider::quiet());
        record_critical_activity(&f.tracker, "p1");
        f.sink.set_failing(true);

        let wars = f.detector.scan().await.unwrap();
        assert_eq!(wars.len(), 1);
        assert_eq!(f.detector.stats().unwrap().notifications_sent, 0);

        // Sink recovers: the very next scan delivers, no cooldown in the way
        f.sink.set_failing(false);
        f.detector.scan().await.unwrap();
        assert_eq!(f.sink.sent_count(), 1);
        assert_eq!(f.detector.stats().unwrap().notifications_sent, 1);
    }

    #[tokio::test]
    async fn test_warning_payload_carries_detection_fields() {
        let f = fixture(FixedMarketProvider::quiet());
        record_critical_activity(&f.tracker, "p1");
        f.detector.scan().await.unwrap();

        let sent = f.sink.sent.lock();
        let (recipient, warning) = &sent[0];
        assert_eq!(recipient, "buyer@example.com");
        assert_eq!(warning.views_24h, 55);
        assert_eq!(warning.total_likes, 22);
        assert_eq!(warning.similar_sold, 0);
        assert_eq!(warning.warning_level, WarningLevel::Critical);
        assert!(!warning.recommendations.is_empty());
    }

    struct FailingFor {
        property: String,
        inner: FixedMarketProvider,
    }

    #[async_trait]
    impl MarketSignalProvider for FailingFor {
        async fn fetch(&self, property: &Value) -> crate::error::Result<crate::types::MarketSignal> {
            if property.get("id").and_then(|v| v.as_str()) == Some(self.property.as_str()) {
                return Err(TrackerError::Market("provider unavailable".to_string()));
            }
            self.inner.fetch(property).await
        }
    }

    #[tokio::test]
    async fn test_one_failing_property_does_not_abort_the_scan() {
        let f = fixture(FixedMarketProvider::quiet());
        // Rebuild the detector with a provider that fails for "bad" only
        let detector = BiddingWarDetector::new(
            f.tracker.clone(),
            Arc::new(FailingFor {
                property: "bad".to_string(),
                inner: FixedMarketProvider::quiet(),
            }),
            f.sink.clone(),
            f.clock.clone(),
            Arc::new(MemoryBackend::new()),
            "buyer@example.com",
        )
        .unwrap();

        // "bad" is liked first, so a hard failure there would mask "good"
        f.tracker.record_like("bad", json!({"id": "bad"})).unwrap();
        record_critical_activity(&f.tracker, "good");

        let wars = detector.scan().await.unwrap();
        assert_eq!(wars.len(), 1);
        assert_eq!(wars[0].property_id, "good");
    }

    #[tokio::test]
    async fn test_ledger_survives_restart() {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap(),
        ));
        let backend = Arc::new(MemoryBackend::new());
        let tracker = Arc::new(PropertyTracker::new(backend.clone(), clock.clone()));
        let sink = Arc::new(RecordingSink::new());
        record_critical_activity(&tracker, "p1");

        let detector = BiddingWarDetector::new(
            tracker.clone(),
            Arc::new(FixedMarketProvider::quiet()),
            sink.clone(),
            clock.clone(),
            backend.clone(),
            "buyer@example.com",
        )
        .unwrap();
        detector.scan().await.unwrap();
        assert_eq!(sink.sent_count(), 1);

        // A new detector over the same backend inherits the cooldown
        let restarted = BiddingWarDetector::new(
            tracker,
            Arc::new(FixedMarketProvider::quiet()),
            sink.clone(),
            clock,
            backend,
            "buyer@example.com",
        )
        .unwrap();
        restarted.scan().await.unwrap();
        assert_eq!(sink.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_stats_and_export() {
        let f = fixture(FixedMarketProvider::quiet());
        record_critical_activity(&f.tracker, "p1");
        f.tracker.record_like("quiet", json!({})).unwrap();

        f.detector.scan().await.unwrap();
        let stats = f.detector.stats().unwrap();
        assert_eq!(stats.total_liked_properties, 2);
        assert_eq!(stats.high_competition, 1);
        assert_eq!(stats.notifications_sent, 1);

        let export = f.detector.export_detection().unwrap();
        assert_eq!(export.rules.triggers.immediate_alert, 85);
        assert!(export.notifications.contains_key("p1"));
    }

    #[tokio::test]
    async fn test_rules_override_changes_classification() {
        let f = fixture(FixedMarketProvider::quiet());
        record_critical_activity(&f.tracker, "p1");

        let mut rules = f.detector.rules();
        rules.triggers.immediate_alert = 100;
        rules.triggers.urgent_alert = 100;
        rules.triggers.watch_alert = 100;
        f.detector.set_rules(rules);

        let result = f.detector.analyze("p1", &json!({})).await.unwrap();
        assert_eq!(result.competition_level, CompetitionLevel::Low);
        assert!(!result.is_bidding_war);
    }
}
