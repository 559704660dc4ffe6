use crate::error::CoefficientError;
use crate::repositories::MarketStore;
use chrono::NaiveDateTime;
use std::sync::Arc;
use tracing::{info, warn};

/// A committed coefficient change
#[derive(Debug, Clone, PartialEq)]
pub struct CoefficientUpdate {
    pub market_id: i64,
    pub event_id: i64,
    pub old_coefficient: f64,
    pub new_coefficient: f64,
    pub updated_at: NaiveDateTime,
    pub history_id: i64,
}

/// Validates proposed coefficients and commits them through the market store.
///
/// Bounds always come from the stored market row; the store re-checks them
/// under its row lock, so a bounds change racing with this call can still
/// only produce an in-bounds commit.
pub struct CoefficientService {
    store: Arc<dyn MarketStore>,
}

impl CoefficientService {
    pub fn new(store: Arc<dyn MarketStore>) -> Self {
        Self { store }
    }

    /// Update a market's coefficient on behalf of `user_id`.
    ///
    /// Either the whole change (market row + history entry) is committed and
    /// `Ok` is returned, or nothing is written.
    pub async fn update_market_coefficient(
        &self,
        market_id: i64,
        new_coefficient: f64,
        user_id: i64,
    ) -> Result<CoefficientUpdate, CoefficientError> {
        let market = self.store.get_market(market_id).await.map_err(|e| {
            warn!("Coefficient update for market {} rejected: {}", market_id, e);
            e
        })?;

        // Fast rejection without opening a transaction
        if let Err(e) = market.check_bounds(new_coefficient) {
            warn!("Coefficient update for market {} rejected: {}", market_id, e);
            return Err(e);
        }

        let committed = self
            .store
            .commit_update(market_id, new_coefficient, user_id)
            .await
            .map_err(|e| {
                warn!("Coefficient commit for market {} failed: {}", market_id, e);
                e
            })?;

        info!(
            "Market {} coefficient {:.2} -> {:.2} by user {}",
            market_id, committed.old_value, new_coefficient, user_id
        );

        Ok(CoefficientUpdate {
            market_id,
            event_id: committed.market.event_id,
            old_coefficient: committed.old_value,
            new_coefficient: committed.market.current_coefficient,
            updated_at: committed.market.last_updated,
            history_id: committed.history_entry.id,
        })
    }
}
