//! Market store: markets and their coefficient history.

use crate::error::{CoefficientError, RepositoryError};
use crate::models::{CoefficientHistoryEntry, CommittedUpdate, Event, Market, MarketDetails, NewMarket};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

/// Persistence contract the coefficient pipeline and gateway are written against.
///
/// `commit_update` must apply the market change and its history row
/// atomically, re-checking bounds against the stored row, and must serialize
/// concurrent commits to the same market.
#[async_trait]
pub trait MarketStore: Send + Sync {
    async fn get_market(&self, market_id: i64) -> Result<Market, CoefficientError>;

    async fn commit_update(
        &self,
        market_id: i64,
        new_value: f64,
        actor_id: i64,
    ) -> Result<CommittedUpdate, CoefficientError>;

    async fn get_market_with_history(&self, market_id: i64) -> Result<MarketDetails, CoefficientError>;
}

/// Postgres-backed market store
pub struct MarketRepository {
    pool: PgPool,
}

impl MarketRepository {
    /// Create a new MarketRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new market. Previous coefficient starts equal to the current one.
    pub async fn create(&self, input: &NewMarket) -> Result<Market, RepositoryError> {
        input.validate().map_err(RepositoryError::InvalidInput)?;

        let market = sqlx::query_as::<_, Market>(
            r#"
            INSERT INTO markets
                (name, market_type, event_id, current_coefficient, previous_coefficient,
                 min_coefficient, max_coefficient)
            VALUES ($1, $2, $3, $4, $4, $5, $6)
            RETURNING
                id, name, market_type, event_id,
                current_coefficient, previous_coefficient,
                min_coefficient, max_coefficient,
                is_active, last_updated, created_at
            "#,
        )
        .bind(&input.name)
        .bind(&input.market_type)
        .bind(input.event_id)
        .bind(input.coefficient)
        .bind(input.min_coefficient)
        .bind(input.max_coefficient)
        .fetch_one(&self.pool)
        .await?;

        Ok(market)
    }

    /// Find a market by id
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Market>, RepositoryError> {
        let market = sqlx::query_as::<_, Market>(
            r#"
            SELECT
                id, name, market_type, event_id,
                current_coefficient, previous_coefficient,
                min_coefficient, max_coefficient,
                is_active, last_updated, created_at
            FROM markets
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(market)
    }

    /// All markets offered on an event
    pub async fn find_by_event(&self, event_id: i64) -> Result<Vec<Market>, RepositoryError> {
        let markets = sqlx::query_as::<_, Market>(
            r#"
            SELECT
                id, name, market_type, event_id,
                current_coefficient, previous_coefficient,
                min_coefficient, max_coefficient,
                is_active, last_updated, created_at
            FROM markets
            WHERE event_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(markets)
    }

    /// Toggle whether a market is offered
    pub async fn set_active(&self, id: i64, is_active: bool) -> Result<Market, RepositoryError> {
        let market = sqlx::query_as::<_, Market>(
            r#"
            UPDATE markets
            SET is_active = $2
            WHERE id = $1
            RETURNING
                id, name, market_type, event_id,
                current_coefficient, previous_coefficient,
                min_coefficient, max_coefficient,
                is_active, last_updated, created_at
            "#,
        )
        .bind(id)
        .bind(is_active)
        .fetch_one(&self.pool)
        .await?;

        Ok(market)
    }

    /// Coefficient history for a market in commit order.
    ///
    /// Ids are assigned under the market row lock, so they follow commit order
    /// even when writers' clocks disagree.
    pub async fn history(&self, market_id: i64) -> Result<Vec<CoefficientHistoryEntry>, RepositoryError> {
        let history = sqlx::query_as::<_, CoefficientHistoryEntry>(
            r#"
            SELECT id, market_id, old_value, new_value, changed_by_id, timestamp
            FROM coefficient_history
            WHERE market_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(market_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(history)
    }

    /// Total number of markets
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM markets")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[async_trait]
impl MarketStore for MarketRepository {
    async fn get_market(&self, market_id: i64) -> Result<Market, CoefficientError> {
        self.find_by_id(market_id)
            .await?
            .ok_or(CoefficientError::MarketNotFound(market_id))
    }

    async fn commit_update(
        &self,
        market_id: i64,
        new_value: f64,
        actor_id: i64,
    ) -> Result<CommittedUpdate, CoefficientError> {
        let mut tx = self.pool.begin().await?;

        // Row lock: concurrent commits to this market queue here, so each one
        // reads the value the previous one wrote.
        let current = sqlx::query_as::<_, Market>(
            r#"
            SELECT
                id, name, market_type, event_id,
                current_coefficient, previous_coefficient,
                min_coefficient, max_coefficient,
                is_active, last_updated, created_at
            FROM markets
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(market_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(CoefficientError::MarketNotFound(market_id))?;

        // Dropping `tx` on any early return rolls back.
        current.check_bounds(new_value)?;

        let old_value = current.current_coefficient;
        let now = chrono::Utc::now().naive_utc();

        let market = sqlx::query_as::<_, Market>(
            r#"
            UPDATE markets
            SET previous_coefficient = $2,
                current_coefficient = $3,
                last_updated = $4
            WHERE id = $1
            RETURNING
                id, name, market_type, event_id,
                current_coefficient, previous_coefficient,
                min_coefficient, max_coefficient,
                is_active, last_updated, created_at
            "#,
        )
        .bind(market_id)
        .bind(old_value)
        .bind(new_value)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let history_entry = sqlx::query_as::<_, CoefficientHistoryEntry>(
            r#"
            INSERT INTO coefficient_history (market_id, old_value, new_value, changed_by_id, timestamp)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, market_id, old_value, new_value, changed_by_id, timestamp
            "#,
        )
        .bind(market_id)
        .bind(old_value)
        .bind(new_value)
        .bind(actor_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            "Committed market {} coefficient {:.2} -> {:.2} (history {})",
            market_id, old_value, new_value, history_entry.id
        );

        Ok(CommittedUpdate {
            old_value,
            market,
            history_entry,
        })
    }

    async fn get_market_with_history(&self, market_id: i64) -> Result<MarketDetails, CoefficientError> {
        let mut tx = self.pool.begin().await?;

        // One snapshot for all three reads
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await?;

        let market = sqlx::query_as::<_, Market>(
            r#"
            SELECT
                id, name, market_type, event_id,
                current_coefficient, previous_coefficient,
                min_coefficient, max_coefficient,
                is_active, last_updated, created_at
            FROM markets
            WHERE id = $1
            "#,
        )
        .bind(market_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(CoefficientError::MarketNotFound(market_id))?;

        let event = sqlx::query_as::<_, Event>(
            r#"
            SELECT id, name, competition_id, created_at
            FROM events
            WHERE id = $1
            "#,
        )
        .bind(market.event_id)
        .fetch_one(&mut *tx)
        .await?;

        let history = sqlx::query_as::<_, CoefficientHistoryEntry>(
            r#"
            SELECT id, market_id, old_value, new_value, changed_by_id, timestamp
            FROM coefficient_history
            WHERE market_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(market_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(MarketDetails {
            market,
            event,
            history,
        })
    }
}
