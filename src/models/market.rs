use super::Event;
use crate::error::CoefficientError;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A single bettable proposition on an event, e.g. "Home win".
///
/// `min_coefficient <= current_coefficient <= max_coefficient` holds for every
/// committed state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Market {
    pub id: i64,
    pub name: String,
    pub market_type: String,
    pub event_id: i64,
    pub current_coefficient: f64,
    pub previous_coefficient: f64,
    pub min_coefficient: f64,
    pub max_coefficient: f64,
    pub is_active: bool,
    pub last_updated: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

impl Market {
    /// Whether `value` lies within the stored bounds (inclusive). NaN and
    /// infinities never do.
    pub fn accepts(&self, value: f64) -> bool {
        value.is_finite() && (self.min_coefficient..=self.max_coefficient).contains(&value)
    }

    /// Check `value` against the stored bounds
    pub fn check_bounds(&self, value: f64) -> Result<(), CoefficientError> {
        if self.accepts(value) {
            Ok(())
        } else {
            Err(CoefficientError::OutOfBounds {
                market_id: self.id,
                value,
                min: self.min_coefficient,
                max: self.max_coefficient,
            })
        }
    }
}

/// Input for creating a market
#[derive(Debug, Clone, PartialEq)]
pub struct NewMarket {
    pub name: String,
    pub market_type: String,
    pub event_id: i64,
    pub coefficient: f64,
    pub min_coefficient: f64,
    pub max_coefficient: f64,
}

impl NewMarket {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("market name must not be empty".to_string());
        }
        if !self.min_coefficient.is_finite() || !self.max_coefficient.is_finite() {
            return Err("coefficient bounds must be finite".to_string());
        }
        if self.min_coefficient > self.max_coefficient {
            return Err(format!(
                "min coefficient {:.2} exceeds max coefficient {:.2}",
                self.min_coefficient, self.max_coefficient
            ));
        }
        if !self.coefficient.is_finite()
            || !(self.min_coefficient..=self.max_coefficient).contains(&self.coefficient)
        {
            return Err(format!(
                "initial coefficient {:.2} outside [{:.2}, {:.2}]",
                self.coefficient, self.min_coefficient, self.max_coefficient
            ));
        }
        Ok(())
    }
}

/// Immutable audit record of one committed coefficient change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CoefficientHistoryEntry {
    pub id: i64,
    pub market_id: i64,
    pub old_value: f64,
    pub new_value: f64,
    pub changed_by_id: i64,
    pub timestamp: NaiveDateTime,
}

/// Market with its event and full history, oldest change first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDetails {
    pub market: Market,
    pub event: Event,
    pub history: Vec<CoefficientHistoryEntry>,
}

/// Outcome of a successful store commit
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedUpdate {
    pub old_value: f64,
    pub market: Market,
    pub history_entry: CoefficientHistoryEntry,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market(min: f64, max: f64, current: f64) -> Market {
        let now = chrono::Utc::now().naive_utc();
        Market {
            id: 4,
            name: "Over 2.5 Goals".to_string(),
            market_type: "total".to_string(),
            event_id: 2,
            current_coefficient: current,
            previous_coefficient: current,
            min_coefficient: min,
            max_coefficient: max,
            is_active: true,
            last_updated: now,
            created_at: now,
        }
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let m = market(1.5, 4.0, 2.1);
        assert!(m.accepts(1.5));
        assert!(m.accepts(4.0));
        assert!(!m.accepts(1.49));
        assert!(!m.accepts(4.01));
    }

    #[test]
    fn test_non_finite_values_are_rejected() {
        let m = market(1.5, 4.0, 2.1);
        assert!(!m.accepts(f64::NAN));
        assert!(!m.accepts(f64::INFINITY));
        assert!(matches!(
            m.check_bounds(f64::NAN),
            Err(CoefficientError::OutOfBounds { market_id: 4, .. })
        ));
    }

    #[test]
    fn test_new_market_validation() {
        let mut input = NewMarket {
            name: "Draw".to_string(),
            market_type: "1x2".to_string(),
            event_id: 1,
            coefficient: 4.65,
            min_coefficient: 2.0,
            max_coefficient: 8.0,
        };
        assert!(input.validate().is_ok());

        input.coefficient = 9.0;
        assert!(input.validate().is_err());

        input.coefficient = 4.0;
        input.min_coefficient = 10.0;
        assert!(input.validate().is_err());
    }
}
