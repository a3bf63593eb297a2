//! Property engagement tracking.
//!
//! `PropertyTracker` is the single source of truth for view/like events and
//! per-user liked/viewed state. Metrics and the competition score are
//! recomputed from the event log on every read so they can never drift from
//! recorded events.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{Result, TrackerError};
use crate::storage::{PersistenceBackend, TRACKING_KEY, USER_KEY};
use crate::types::{
    CompetitionMetrics, EngagementEvent, HighCompetitionProperty, LikedProperty,
    NotificationPreferences, PreferenceUpdate, PropertySnapshot, StateExport, TrackingLog,
    TrendingProperty, UserState, ViewedProperty,
};

/// Maximum number of entries kept in the per-user viewed list.
const MAX_VIEWED_PROPERTIES: usize = 100;

/// Default retention window for `cleanup`.
const DEFAULT_RETENTION_DAYS: i64 = 30;

/// Engagement event store with on-demand metric computation.
///
/// The persistence backend holds the durable state; every read-modify-write
/// sequence runs under a single internal lock so a parallel host cannot
/// interleave load/mutate/store.
pub struct PropertyTracker {
    backend: Arc<dyn PersistenceBackend>,
    clock: Arc<dyn Clock>,
    session_id: String,
    write_lock: Mutex<()>,
}

impl PropertyTracker {
    pub fn new(backend: Arc<dyn PersistenceBackend>, clock: Arc<dyn Clock>) -> Self {
        // One token per tracker instance, reused for every event it records.
        // Attribute-only: it carries no access-control meaning.
        let session_id = format!("session_{}", Uuid::new_v4());
        Self {
            backend,
            clock,
            session_id,
            write_lock: Mutex::new(()),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    // -----------------------------------------------------------------------
    // Recording
    // -----------------------------------------------------------------------

    /// Record a view event and update the user's viewed list.
    pub fn record_view(&self, property_id: &str, property_data: Value) -> Result<PropertySnapshot> {
        let _guard = self.write_lock.lock();
        let now = self.clock.now();

        let mut tracking = self.load_tracking()?;
        let mut user = self.load_user()?;

        let snapshot = tracking
            .entry(property_id.to_string())
            .or_insert_with(|| PropertySnapshot::new(now, property_data.clone()));

        snapshot.views.push(EngagementEvent {
            timestamp: now,
            session_id: self.session_id.clone(),
        });
        snapshot.total_views = snapshot.views.len() as u32;
        snapshot.last_viewed = now;
        let result = snapshot.clone();

        // Per-user viewed list: bump existing entry or insert at the front
        if let Some(existing) = user.viewed_properties.iter_mut().find(|p| p.id == property_id) {
            existing.last_viewed = now;
            existing.view_count += 1;
        } else {
            user.viewed_properties.insert(
                0,
                ViewedProperty {
                    id: property_id.to_string(),
                    first_viewed: now,
                    last_viewed: now,
                    view_count: 1,
                    property_data,
                },
            );
        }

        // Cap the viewed list, evicting least-recently-viewed entries
        if user.viewed_properties.len() > MAX_VIEWED_PROPERTIES {
            user.viewed_properties
                .sort_by(|a, b| b.last_viewed.cmp(&a.last_viewed));
            user.viewed_properties.truncate(MAX_VIEWED_PROPERTIES);
        }

        self.save_tracking(&tracking)?;
        self.save_user(&user)?;

        log::debug!("Property {} view tracked", property_id);
        Ok(result)
    }

    /// Record a like event and add the property to the liked set.
    ///
    /// The liked set is idempotent — a second like for the same property still
    /// appends an event (it counts toward scoring) but does not duplicate the
    /// membership entry.
    pub fn record_like(&self, property_id: &str, property_data: Value) -> Result<PropertySnapshot> {
        let _guard = self.write_lock.lock();
        let now = self.clock.now();

        let mut tracking = self.load_tracking()?;
        let mut user = self.load_user()?;

        let snapshot = tracking
            .entry(property_id.to_string())
            .or_insert_with(|| PropertySnapshot::new(now, property_data.clone()));

        snapshot.likes.push(EngagementEvent {
            timestamp: now,
            session_id: self.session_id.clone(),
        });
        snapshot.total_likes = snapshot.likes.len() as u32;
        let result = snapshot.clone();

        if !user.liked_properties.iter().any(|p| p.id == property_id) {
            user.liked_properties.push(LikedProperty {
                id: property_id.to_string(),
                liked_at: now,
                property_data,
            });
        }

        self.save_tracking(&tracking)?;
        self.save_user(&user)?;

        log::debug!("Property {} like tracked", property_id);
        Ok(result)
    }

    /// Remove a property from the liked set. Historical like events are
    /// retained for scoring.
    pub fn remove_like(&self, property_id: &str) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut user = self.load_user()?;
        user.liked_properties.retain(|p| p.id != property_id);
        self.save_user(&user)?;
        log::debug!("Property {} like removed", property_id);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Metrics
    // -----------------------------------------------------------------------

    /// Point-in-time metrics for one property. All-zero when the property has
    /// never been tracked.
    pub fn metrics(&self, property_id: &str) -> Result<CompetitionMetrics> {
        let tracking = self.load_tracking()?;
        let now = self.clock.now();
        Ok(tracking
            .get(property_id)
            .map(|snapshot| metrics_from_snapshot(snapshot, now))
            .unwrap_or_default())
    }

    /// Properties whose competition score meets `threshold`, highest first.
    pub fn high_competition_properties(&self, threshold: u8) -> Result<Vec<HighCompetitionProperty>> {
        let tracking = self.load_tracking()?;
        let now = self.clock.now();

        let mut out: Vec<HighCompetitionProperty> = tracking
            .iter()
            .filter_map(|(id, snapshot)| {
                let metrics = metrics_from_snapshot(snapshot, now);
                (metrics.competition_score >= threshold).then(|| HighCompetitionProperty {
                    property_id: id.clone(),
                    metrics,
                    property_data: snapshot.property_data.clone(),
                })
            })
            .collect();

        out.sort_by(|a, b| b.metrics.competition_score.cmp(&a.metrics.competition_score));
        Ok(out)
    }

    /// Properties with any 24h activity, ranked by a weighted trend score.
    pub fn trending_properties(&self, limit: usize) -> Result<Vec<TrendingProperty>> {
        let tracking = self.load_tracking()?;
        let now = self.clock.now();

        let mut out: Vec<TrendingProperty> = tracking
            .iter()
            .filter_map(|(id, snapshot)| {
                let metrics = metrics_from_snapshot(snapshot, now);
                if metrics.views_24h == 0 && metrics.likes_24h == 0 {
                    return None;
                }
                let trend_score = metrics.views_24h * 2 + metrics.likes_24h * 5;
                Some(TrendingProperty {
                    property_id: id.clone(),
                    metrics,
                    property_data: snapshot.property_data.clone(),
                    trend_score,
                })
            })
            .collect();

        out.sort_by(|a, b| b.trend_score.cmp(&a.trend_score));
        out.truncate(limit);
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // User state
    // -----------------------------------------------------------------------

    /// Liked properties in insertion order.
    pub fn liked_properties(&self) -> Result<Vec<LikedProperty>> {
        Ok(self.load_user()?.liked_properties)
    }

    /// Viewed properties, most-recently-viewed entries first among inserts.
    pub fn viewed_properties(&self) -> Result<Vec<ViewedProperty>> {
        Ok(self.load_user()?.viewed_properties)
    }

    pub fn is_liked(&self, property_id: &str) -> Result<bool> {
        Ok(self
            .load_user()?
            .liked_properties
            .iter()
            .any(|p| p.id == property_id))
    }

    pub fn notification_preferences(&self) -> Result<NotificationPreferences> {
        Ok(self.load_user()?.notifications)
    }

    /// Merge the provided preference values into the stored preferences.
    pub fn update_notification_preferences(&self, update: PreferenceUpdate) -> Result<NotificationPreferences> {
        let _guard = self.write_lock.lock();
        let mut user = self.load_user()?;
        if let Some(v) = update.bidding_war {
            user.notifications.bidding_war = v;
        }
        if let Some(v) = update.price_drops {
            user.notifications.price_drops = v;
        }
        if let Some(v) = update.similar_properties {
            user.notifications.similar_properties = v;
        }
        self.save_user(&user)?;
        Ok(user.notifications)
    }

    // -----------------------------------------------------------------------
    // Maintenance
    // -----------------------------------------------------------------------

    /// Drop events older than `retention` (default 30 days), recompute
    /// totals, and remove snapshots left with no events. Idempotent.
    pub fn cleanup(&self, retention: Option<Duration>) -> Result<usize> {
        let _guard = self.write_lock.lock();
        let retention = retention.unwrap_or_else(|| Duration::days(DEFAULT_RETENTION_DAYS));
        let cutoff = self.clock.now() - retention;

        let mut tracking = self.load_tracking()?;
        let before = tracking.len();

        for snapshot in tracking.values_mut() {
            snapshot.views.retain(|e| e.timestamp > cutoff);
            snapshot.likes.retain(|e| e.timestamp > cutoff);
            snapshot.total_views = snapshot.views.len() as u32;
            snapshot.total_likes = snapshot.likes.len() as u32;
        }
        tracking.retain(|_, s| !s.views.is_empty() || !s.likes.is_empty());

        self.save_tracking(&tracking)?;
        let removed = before - tracking.len();
        if removed > 0 {
            log::info!("Cleanup removed {} inactive properties", removed);
        }
        Ok(removed)
    }

    /// Export all tracker state for backup or migration.
    pub fn export_state(&self) -> Result<StateExport> {
        Ok(StateExport {
            tracking: self.load_tracking()?,
            user: self.load_user()?,
            export_date: self.clock.now(),
        })
    }

    /// Replace tracker state with a previously exported dump.
    pub fn import_state(&self, export: &StateExport) -> Result<()> {
        let _guard = self.write_lock.lock();
        self.save_tracking(&export.tracking)?;
        self.save_user(&export.user)?;
        log::info!("Tracking data imported ({} properties)", export.tracking.len());
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Persistence helpers
    // -----------------------------------------------------------------------

    fn load_tracking(&self) -> Result<TrackingLog> {
        load_or_default(self.backend.as_ref(), TRACKING_KEY)
    }

    fn load_user(&self) -> Result<UserState> {
        load_or_default(self.backend.as_ref(), USER_KEY)
    }

    fn save_tracking(&self, tracking: &TrackingLog) -> Result<()> {
        save(self.backend.as_ref(), TRACKING_KEY, tracking)
    }

    fn save_user(&self, user: &UserState) -> Result<()> {
        save(self.backend.as_ref(), USER_KEY, user)
    }
}

/// Load a namespace, treating malformed JSON as empty default state.
/// Storage unavailability still propagates — only corruption is degraded.
pub(crate) fn load_or_default<T: DeserializeOwned + Default>(
    backend: &dyn PersistenceBackend,
    key: &str,
) -> Result<T> {
    match backend.get(key)? {
        None => Ok(T::default()),
        Some(raw) => match serde_json::from_str(&raw) {
            Ok(value) => Ok(value),
            Err(e) => {
                log::warn!("Stored state under '{}' is malformed, using defaults: {}", key, e);
                Ok(T::default())
            }
        },
    }
}

pub(crate) fn save<T: serde::Serialize>(
    backend: &dyn PersistenceBackend,
    key: &str,
    value: &T,
) -> Result<()> {
    let raw = serde_json::to_string(value).map_err(|e| TrackerError::MalformedState {
        key: key.to_string(),
        source: e,
    })?;
    backend.set(key, &raw)
}

// ---------------------------------------------------------------------------
// Metric computation
// ---------------------------------------------------------------------------

/// Compute windowed metrics and the competition score for one snapshot.
/// Window inclusion is strict: an event lands in a window only when its
/// timestamp is after the cutoff.
pub fn metrics_from_snapshot(snapshot: &PropertySnapshot, now: DateTime<Utc>) -> CompetitionMetrics {
    let day_ago = now - Duration::hours(24);
    let week_ago = now - Duration::days(7);

    let count_after = |events: &[EngagementEvent], cutoff: DateTime<Utc>| {
        events.iter().filter(|e| e.timestamp > cutoff).count() as u32
    };

    let total_views = snapshot.views.len() as u32;
    let total_likes = snapshot.likes.len() as u32;
    let views_24h = count_after(&snapshot.views, day_ago);
    let views_7d = count_after(&snapshot.views, week_ago);
    let likes_24h = count_after(&snapshot.likes, day_ago);
    let likes_7d = count_after(&snapshot.likes, week_ago);

    let competition_score =
        competition_score(total_views, total_likes, views_24h, likes_24h, views_7d);

    CompetitionMetrics {
        total_views,
        total_likes,
        views_24h,
        views_7d,
        likes_24h,
        likes_7d,
        competition_score,
        first_viewed: Some(snapshot.first_viewed),
        last_viewed: Some(snapshot.last_viewed),
    }
}

/// Banded competition score, 0..=100.
///
/// Each band group is mutually exclusive — the highest applicable band wins,
/// bands are not cumulative within a group. The final sum is clamped to 100.
pub fn competition_score(
    total_views: u32,
    total_likes: u32,
    views_24h: u32,
    likes_24h: u32,
    views_7d: u32,
) -> u8 {
    let mut score = 0u32;

    // 24h view activity
    if views_24h >= 50 {
        score += 30;
    } else if views_24h >= 20 {
        score += 20;
    } else if views_24h >= 10 {
        score += 10;
    }

    // Cumulative likes
    if total_likes >= 20 {
        score += 25;
    } else if total_likes >= 10 {
        score += 15;
    } else if total_likes >= 5 {
        score += 10;
    }

    // Recent like activity
    if likes_24h >= 5 {
        score += 20;
    } else if likes_24h >= 2 {
        score += 10;
    }

    // Weekly view volume
    if views_7d >= 100 {
        score += 15;
    } else if views_7d >= 50 {
        score += 10;
    }

    // Engagement rate
    let engagement_rate = if total_views > 0 {
        total_likes as f64 / total_views as f64 * 100.0
    } else {
        0.0
    };
    if engagement_rate >= 10.0 {
        score += 10;
    } else if engagement_rate >= 5.0 {
        score += 5;
    }

    score.min(100) as u8
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
