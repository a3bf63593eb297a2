//! Market-data collaborator.
//!
//! Area market conditions feed the detector's market indicators. The provider
//! is an injected capability: production hosts wire a real listing API,
//! tests wire `FixedMarketProvider` so analysis is reproducible.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::types::{InventoryLevel, MarketSignal, MarketTrend};

#[async_trait]
pub trait MarketSignalProvider: Send + Sync {
    /// Fetch market conditions around the given property.
    async fn fetch(&self, property: &Value) -> Result<MarketSignal>;
}

/// Placeholder provider that fabricates plausible market data. Stands in for
/// a real MLS/listing API during demos; never used in tests.
pub struct SimulatedMarketProvider;

#[async_trait]
impl MarketSignalProvider for SimulatedMarketProvider {
    async fn fetch(&self, _property: &Value) -> Result<MarketSignal> {
        use rand::Rng;
        let mut rng = rand::thread_rng();

        let trend = match rng.gen_range(0..3) {
            0 => MarketTrend::Rising,
            1 => MarketTrend::Stable,
            _ => MarketTrend::Declining,
        };
        let inventory_level = match rng.gen_range(0..3) {
            0 => InventoryLevel::Low,
            1 => InventoryLevel::Medium,
            _ => InventoryLevel::High,
        };

        Ok(MarketSignal {
            similar_sold: rng.gen_range(0..8),
            avg_days_on_market: rng.gen_range(20..60),
            new_listings: rng.gen_range(0..10),
            price_drops: rng.gen_range(0..5),
            trend,
            inventory_level,
        })
    }
}

/// Deterministic provider returning the same signal on every fetch.
pub struct FixedMarketProvider {
    signal: MarketSignal,
}

impl FixedMarketProvider {
    pub fn new(signal: MarketSignal) -> Self {
        Self { signal }
    }

    /// A quiet market: nothing selling, slow turnover, no new listings.
    pub fn quiet() -> Self {
        Self::new(MarketSignal {
            similar_sold: 0,
            avg_days_on_market: 60,
            new_listings: 0,
            price_drops: 0,
            trend: MarketTrend::Stable,
            inventory_level: InventoryLevel::High,
        })
    }

    /// A hot market: frequent comparable sales and fast turnover.
    pub fn hot() -> Self {
        Self::new(MarketSignal {
            similar_sold: 5,
            avg_days_on_market: 15,
            new_listings: 7,
            price_drops: 1,
            trend: MarketTrend::Rising,
            inventory_level: InventoryLevel::Low,
        })
    }
}

#[async_trait]
impl MarketSignalProvider for FixedMarketProvider {
    async fn fetch(&self, _property: &Value) -> Result<MarketSignal> {
        Ok(self.signal.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_simulated_provider_stays_in_range() {
        let provider = SimulatedMarketProvider;
        for _ in 0..50 {
            let signal = provider.fetch(&json!({})).await.unwrap();
            assert!(signal.similar_sold < 8);
            assert!((20..60).contains(&signal.avg_days_on_market));
            assert!(signal.new_listings < 10);
            assert!(signal.price_drops < 5);
        }
    }

    #[tokio::test]
    async fn test_fixed_provider_is_deterministic() {
        let provider = FixedMarketProvider::hot();
        let a = provider.fetch(&json!({})).await.unwrap();
        let b = provider.fetch(&json!({})).await.unwrap();
        assert_eq!(a.similar_sold, b.similar_sold);
        assert_eq!(a.trend, MarketTrend::Rising);
    }
}
