//! Detection thresholds.
//!
//! Defaults mirror the tuning the product shipped with; hosts may override
//! the whole set via `BiddingWarDetector::set_rules`.

use serde::{Deserialize, Serialize};

/// Engagement thresholds for one competition tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetitionThresholds {
    pub views_24h: u32,
    pub likes_24h: u32,
    pub total_likes: u32,
    pub competition_score: u8,
    /// Percentage, e.g. 8 means 8%.
    pub engagement_rate: f64,
}

/// Area market thresholds feeding the market indicators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketThresholds {
    pub similar_properties_sold_7d: u32,
    pub price_drops_in_area: u32,
    pub new_listings_in_area: u32,
    pub average_days_on_market: u32,
}

/// Competition-score cutoffs for the alert tiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerThresholds {
    pub immediate_alert: u8,
    pub urgent_alert: u8,
    pub watch_alert: u8,
}

/// Full rule set for indicator computation and level classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionRules {
    pub high_competition: CompetitionThresholds,
    pub medium_competition: CompetitionThresholds,
    pub market_indicators: MarketThresholds,
    pub triggers: TriggerThresholds,
}

impl Default for DetectionRules {
    fn default() -> Self {
        Self {
            high_competition: CompetitionThresholds {
                views_24h: 30,
                likes_24h: 5,
                total_likes: 10,
                competition_score: 75,
                engagement_rate: 8.0,
            },
            medium_competition: CompetitionThresholds {
                views_24h: 15,
                likes_24h: 3,
                total_likes: 5,
                competition_score: 50,
                engagement_rate: 5.0,
            },
            market_indicators: MarketThresholds {
                similar_properties_sold_7d: 3,
                price_drops_in_area: 2,
                new_listings_in_area: 5,
                average_days_on_market: 30,
            },
            triggers: TriggerThresholds {
                immediate_alert: 85,
                urgent_alert: 70,
                watch_alert: 50,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_round_trip() {
        let rules = DetectionRules::default();
        let json = serde_json::to_string(&rules).unwrap();
        let back: DetectionRules = serde_json::from_str(&json).unwrap();
        assert_eq!(back.triggers.immediate_alert, 85);
        assert_eq!(back.high_competition.views_24h, 30);
        assert_eq!(back.market_indicators.average_days_on_market, 30);
    }
}
