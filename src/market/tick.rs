//! Raw market events

use serde::{Deserialize, Serialize};

/// Side of a tick or of the order being executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Kind of market event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Executed trade; `side` is the aggressor
    Trade,
    /// Resting volume at a price level; `side` is the book side, volume 0 clears the level
    BookUpdate,
}

/// A single market event. Timestamps are nanoseconds and non-decreasing within a stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub timestamp: u64,
    pub price: f64,
    pub volume: f64,
    pub side: Side,
    pub event_type: EventType,
}

impl Tick {
    pub fn trade(timestamp: u64, price: f64, volume: f64, side: Side) -> Self {
        Self {
            timestamp,
            price,
            volume,
            side,
            event_type: EventType::Trade,
        }
    }

    pub fn book(timestamp: u64, price: f64, volume: f64, side: Side) -> Self {
        Self {
            timestamp,
            price,
            volume,
            side,
            event_type: EventType::BookUpdate,
        }
    }

    /// Finite positive price and finite non-negative volume
    pub fn is_well_formed(&self) -> bool {
        self.price.is_finite() && self.price > 0.0 && self.volume.is_finite() && self.volume >= 0.0
    }

    pub fn is_trade(&self) -> bool {
        self.event_type == EventType::Trade
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_formed() {
        assert!(Tick::trade(1, 100.0, 5.0, Side::Buy).is_well_formed());
        assert!(Tick::book(1, 100.0, 0.0, Side::Sell).is_well_formed());
        assert!(!Tick::trade(1, f64::NAN, 5.0, Side::Buy).is_well_formed());
        assert!(!Tick::trade(1, 100.0, -1.0, Side::Buy).is_well_formed());
        assert!(!Tick::book(1, 0.0, 1.0, Side::Buy).is_well_formed());
    }

    #[test]
    fn test_serde_names() {
        let tick = Tick::book(42, 10.5, 3.0, Side::Sell);
        let json = serde_json::to_string(&tick).unwrap();
        assert!(json.contains("\"book_update\""));
        assert!(json.contains("\"sell\""));
    }
}
