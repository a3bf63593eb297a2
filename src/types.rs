//! Shared data model for engagement tracking and bidding-war detection.
//!
//! Everything that reaches the persistence backend serializes as camelCase
//! JSON, matching the payloads the web client stores — a fresh tracker can
//! adopt browser-written state unchanged.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Engagement events and snapshots
// ---------------------------------------------------------------------------

/// A single view or like, appended to a per-property log. Immutable once
/// recorded. Which log it lives in (views vs likes) implies its kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementEvent {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
}

/// Per-property engagement record: ordered view/like logs plus derived
/// totals. Totals are recomputed from the logs whenever they change; they are
/// serialized for interoperability, never trusted over the logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySnapshot {
    #[serde(default)]
    pub views: Vec<EngagementEvent>,
    #[serde(default)]
    pub likes: Vec<EngagementEvent>,
    #[serde(default)]
    pub total_views: u32,
    #[serde(default)]
    pub total_likes: u32,
    pub first_viewed: DateTime<Utc>,
    pub last_viewed: DateTime<Utc>,
    /// Opaque listing payload (address, price, photos, ...). The core never
    /// inspects it beyond pass-through.
    #[serde(default)]
    pub property_data: Value,
}

impl PropertySnapshot {
    pub fn new(now: DateTime<Utc>, property_data: Value) -> Self {
        Self {
            views: Vec::new(),
            likes: Vec::new(),
            total_views: 0,
            total_likes: 0,
            first_viewed: now,
            last_viewed: now,
            property_data,
        }
    }
}

/// The full per-property tracking log, keyed by property id.
pub type TrackingLog = HashMap<String, PropertySnapshot>;

// ---------------------------------------------------------------------------
// User state
// ---------------------------------------------------------------------------

/// A property the user has liked. At most one entry per property id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikedProperty {
    pub id: String,
    pub liked_at: DateTime<Utc>,
    #[serde(default)]
    pub property_data: Value,
}

/// A property the user has viewed, with per-user view bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewedProperty {
    pub id: String,
    pub first_viewed: DateTime<Utc>,
    pub last_viewed: DateTime<Utc>,
    pub view_count: u32,
    #[serde(default)]
    pub property_data: Value,
}

/// Which alert categories the user wants delivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    pub bidding_war: bool,
    pub price_drops: bool,
    pub similar_properties: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            bidding_war: true,
            price_drops: true,
            similar_properties: true,
        }
    }
}

/// Partial preference update; unset fields keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceUpdate {
    pub bidding_war: Option<bool>,
    pub price_drops: Option<bool>,
    pub similar_properties: Option<bool>,
}

/// Per-user engagement state: liked set, bounded viewed list, preferences.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserState {
    #[serde(default)]
    pub liked_properties: Vec<LikedProperty>,
    #[serde(default)]
    pub viewed_properties: Vec<ViewedProperty>,
    #[serde(default)]
    pub notifications: NotificationPreferences,
}

// ---------------------------------------------------------------------------
// Derived metrics
// ---------------------------------------------------------------------------

/// Point-in-time engagement metrics for one property. Recomputed from the
/// event log on every read — never cached.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetitionMetrics {
    pub total_views: u32,
    pub total_likes: u32,
    pub views_24h: u32,
    pub views_7d: u32,
    pub likes_24h: u32,
    pub likes_7d: u32,
    /// Bounded 0..=100 by construction.
    pub competition_score: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_viewed: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_viewed: Option<DateTime<Utc>>,
}

/// A property whose competition score cleared a threshold.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HighCompetitionProperty {
    pub property_id: String,
    pub metrics: CompetitionMetrics,
    pub property_data: Value,
}

/// A property with 24h activity, ranked for trending lists.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingProperty {
    pub property_id: String,
    pub metrics: CompetitionMetrics,
    pub property_data: Value,
    pub trend_score: u32,
}

// ---------------------------------------------------------------------------
// Market signal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketTrend {
    Rising,
    Stable,
    Declining,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InventoryLevel {
    Low,
    Medium,
    High,
}

/// Area market conditions around a property, from the injected provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSignal {
    pub similar_sold: u32,
    pub avg_days_on_market: u32,
    pub new_listings: u32,
    pub price_drops: u32,
    pub trend: MarketTrend,
    pub inventory_level: InventoryLevel,
}

// ---------------------------------------------------------------------------
// Detection results
// ---------------------------------------------------------------------------

/// Coarse competition bucket derived solely from the competition score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompetitionLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Severity actually communicated to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningLevel {
    None,
    Low,
    Medium,
    High,
    Critical,
}

/// Boolean signals feeding the bidding-war decision table. Each flag is
/// computed independently from metrics, market signal, or evaluation time.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Indicators {
    // Activity
    pub high_view_activity: bool,
    pub high_like_activity: bool,
    pub popular_property: bool,
    // Engagement
    pub high_engagement: bool,
    pub recent_surge: bool,
    // Market
    pub hot_market: bool,
    pub fast_selling: bool,
    pub competitive_area: bool,
    // Time of day
    pub weekend_activity: bool,
    pub peak_hours: bool,
    // Trend
    pub growing_interest: bool,
    pub accelerating_views: bool,
}

/// Full analysis of one property at one instant. Transient — recomputed from
/// scratch on every `analyze` call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub property_id: String,
    pub metrics: CompetitionMetrics,
    pub market: MarketSignal,
    pub indicators: Indicators,
    pub competition_level: CompetitionLevel,
    pub is_bidding_war: bool,
    pub warning_level: WarningLevel,
    pub recommendations: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Payload handed to the notification sink when an alert fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarningPayload {
    pub views_24h: u32,
    pub total_likes: u32,
    pub similar_sold: u32,
    pub competition_level: CompetitionLevel,
    pub warning_level: WarningLevel,
    pub recommendations: Vec<String>,
}

/// Outcome of a successful sink delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryOutcome {
    pub message_id: String,
}

// ---------------------------------------------------------------------------
// Export / import
// ---------------------------------------------------------------------------

/// Full tracker state dump. Re-importing into a fresh store yields identical
/// metrics for every property present at export time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateExport {
    pub tracking: TrackingLog,
    pub user: UserState,
    pub export_date: DateTime<Utc>,
}

/// Aggregate detection statistics across the user's liked properties.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionStats {
    pub total_liked_properties: usize,
    pub high_competition: usize,
    pub medium_competition: usize,
    pub average_competition_score: u32,
    pub notifications_sent: usize,
}
