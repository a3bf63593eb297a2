//! Indicator flags and the bidding-war decision table.
//!
//! Pure functions of metrics, market signal, rules, and the evaluation time.
//! No storage access, no randomness — the engine isolates those at its
//! boundaries.

use chrono::{DateTime, Datelike, FixedOffset, Timelike, Weekday};

use crate::types::{CompetitionLevel, CompetitionMetrics, Indicators, MarketSignal, WarningLevel};

use super::rules::DetectionRules;

/// Likes per hundred views; zero when nothing has been viewed.
pub fn engagement_rate(metrics: &CompetitionMetrics) -> f64 {
    if metrics.total_views == 0 {
        return 0.0;
    }
    metrics.total_likes as f64 / metrics.total_views as f64 * 100.0
}

/// Compute all indicator flags for one property at one instant.
pub fn compute(
    metrics: &CompetitionMetrics,
    market: &MarketSignal,
    rules: &DetectionRules,
    local_now: DateTime<FixedOffset>,
) -> Indicators {
    let high = &rules.high_competition;
    let area = &rules.market_indicators;
    let weekly_average = metrics.views_7d as f64 / 7.0;

    Indicators {
        // Activity
        high_view_activity: metrics.views_24h >= high.views_24h,
        high_like_activity: metrics.likes_24h >= high.likes_24h,
        popular_property: metrics.total_likes >= high.total_likes,

        // Engagement
        high_engagement: engagement_rate(metrics) >= high.engagement_rate,
        recent_surge: metrics.views_24h as f64 > weekly_average * 2.0,

        // Market
        hot_market: market.similar_sold >= area.similar_properties_sold_7d,
        fast_selling: market.avg_days_on_market < area.average_days_on_market,
        competitive_area: market.new_listings >= area.new_listings_in_area,

        // Time of day
        weekend_activity: matches!(local_now.weekday(), Weekday::Sat | Weekday::Sun),
        peak_hours: (18..=21).contains(&local_now.hour()),

        // Trend. Both compare 24h activity against a weekly baseline with
        // deliberately distinct multipliers; they are kept separate on purpose.
        growing_interest: metrics.views_24h as f64
            > (metrics.views_7d as f64 - metrics.views_24h as f64) / 6.0,
        accelerating_views: metrics.views_24h as f64 > weekly_average * 1.5,
    }
}

/// Coarse competition bucket from the score alone.
pub fn competition_level(score: u8, rules: &DetectionRules) -> CompetitionLevel {
    let t = &rules.triggers;
    if score >= t.immediate_alert {
        CompetitionLevel::Critical
    } else if score >= t.urgent_alert {
        CompetitionLevel::High
    } else if score >= t.watch_alert {
        CompetitionLevel::Medium
    } else {
        CompetitionLevel::Low
    }
}

/// Bidding-war decision table, evaluated top to bottom, first match wins.
pub fn is_bidding_war(level: CompetitionLevel, ind: &Indicators) -> bool {
    // Critical level is always a bidding war
    if level == CompetitionLevel::Critical {
        return true;
    }

    // High level with multiple reinforcing indicators
    if level == CompetitionLevel::High
        && ((ind.high_view_activity && ind.high_like_activity)
            || (ind.hot_market && ind.high_engagement)
            || (ind.recent_surge && ind.popular_property))
    {
        return true;
    }

    // Medium level needs strong market indicators across the board
    level == CompetitionLevel::Medium && ind.hot_market && ind.fast_selling && ind.growing_interest
}

/// Severity communicated to the user.
pub fn warning_level(is_war: bool, level: CompetitionLevel, ind: &Indicators) -> WarningLevel {
    if !is_war {
        return WarningLevel::None;
    }
    match level {
        CompetitionLevel::Critical => WarningLevel::Critical,
        CompetitionLevel::High => WarningLevel::High,
        _ if ind.hot_market && ind.fast_selling => WarningLevel::Medium,
        _ => WarningLevel::Low,
    }
}

/// Canned recommendations: the level block first, then indicator-specific
/// additions in fixed order (hot market, weekend, surge).
pub fn recommendations(warning: WarningLevel, ind: &Indicators) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();

    match warning {
        WarningLevel::Critical => {
            out.push("🚨 URGENT: Schedule viewing immediately".to_string());
            out.push("💰 Prepare your best offer - consider going above asking price".to_string());
            out.push("📋 Get pre-approval letter ready".to_string());
            out.push("⚡ Contact your agent NOW".to_string());
        }
        WarningLevel::High => {
            out.push("🏃‍♂️ Schedule viewing within 24 hours".to_string());
            out.push("💵 Prepare competitive offer".to_string());
            out.push("📞 Contact your real estate agent".to_string());
            out.push("🔍 Research comparable sales".to_string());
        }
        WarningLevel::Medium => {
            out.push("📅 Schedule viewing this week".to_string());
            out.push("💡 Research the property thoroughly".to_string());
            out.push("📊 Analyze recent sales in the area".to_string());
            out.push("🤝 Consider making an offer soon".to_string());
        }
        WarningLevel::Low | WarningLevel::None => {}
    }

    if ind.hot_market {
        out.push("🔥 Market is hot - properties selling fast".to_string());
    }
    if ind.weekend_activity {
        out.push("📅 High weekend activity - many buyers looking".to_string());
    }
    if ind.recent_surge {
        out.push("📈 Recent surge in interest detected".to_string());
    }

    out
}
