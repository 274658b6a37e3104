//! Simplified Order Book
//!
//! Aggregated price-level liquidity updated by market ticks and by our own
//! simulated fills. Levels are keyed by integer price ticks so that
//! ordering and lookups are exact.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::tick::{EventType, Side, Tick};

/// Volume below this is treated as an empty level
const DUST: f64 = 1e-9;

/// Lifecycle of the book model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookPhase {
    /// No two-sided quote yet; fills execute nothing
    Idle,
    /// Two-sided book maintained from ticks and fills
    Updating,
}

/// Aggregated liquidity in one price bucket
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthBucket {
    /// Distance from the touch in price units
    pub price_offset: f64,
    pub volume: f64,
}

/// Derived view of the book: touch prices and N buckets per side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub best_bid: Option<f64>,
    pub best_ask: Option<f64>,
    /// Nearest bucket first
    pub bid_depth: Vec<DepthBucket>,
    /// Nearest bucket first
    pub ask_depth: Vec<DepthBucket>,
}

impl BookSnapshot {
    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) => Some((bid + ask) / 2.0),
            _ => None,
        }
    }

    pub fn spread(&self) -> Option<f64> {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Share of visible bucketed volume in each bucket, bids then asks.
    /// Always 2N values in [0, 1]; all zeros on an empty book.
    pub fn pressure_features(&self) -> Vec<f64> {
        let total: f64 = self
            .bid_depth
            .iter()
            .chain(self.ask_depth.iter())
            .map(|b| b.volume)
            .sum();

        self.bid_depth
            .iter()
            .chain(self.ask_depth.iter())
            .map(|b| if total > DUST { b.volume / total } else { 0.0 })
            .collect()
    }
}

/// Order type of a child order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ChildOrderKind {
    Market,
    /// Limit price in ticks from the opposite touch; >= 0 is marketable
    Limit { price_offset: i64 },
}

/// An absolute-size child order submitted to the book
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChildOrder {
    pub side: Side,
    pub size: f64,
    pub kind: ChildOrderKind,
}

/// Result of simulating a child order
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FillOutcome {
    pub requested_volume: f64,
    pub executed_volume: f64,
    /// Volume-weighted average execution price, if anything executed
    pub executed_price_avg: Option<f64>,
    pub residual_unfilled: f64,
    pub levels_consumed: usize,
}

impl FillOutcome {
    fn nothing(requested: f64) -> Self {
        Self {
            requested_volume: requested,
            executed_volume: 0.0,
            executed_price_avg: None,
            residual_unfilled: requested,
            levels_consumed: 0,
        }
    }
}

/// Bucketed price-level book
#[derive(Debug, Clone)]
pub struct OrderBookModel {
    tick_size: f64,
    buckets: usize,
    bucket_ticks: i64,
    bids: BTreeMap<i64, f64>,
    asks: BTreeMap<i64, f64>,
    phase: BookPhase,
    last_trade: Option<(u64, f64)>,
    last_update: Option<u64>,
}

impl OrderBookModel {
    pub fn new(tick_size: f64, buckets: usize, bucket_ticks: u32) -> Self {
        Self {
            tick_size,
            buckets,
            bucket_ticks: i64::from(bucket_ticks.max(1)),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            phase: BookPhase::Idle,
            last_trade: None,
            last_update: None,
        }
    }

    fn to_ticks(&self, price: f64) -> i64 {
        (price / self.tick_size).round() as i64
    }

    fn to_price(&self, ticks: i64) -> f64 {
        ticks as f64 * self.tick_size
    }

    fn levels_mut(&mut self, side: Side) -> &mut BTreeMap<i64, f64> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    pub fn phase(&self) -> BookPhase {
        self.phase
    }

    pub fn best_bid(&self) -> Option<f64> {
        self.bids.keys().next_back().map(|&t| self.to_price(t))
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.asks.keys().next().map(|&t| self.to_price(t))
    }

    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / 2.0),
            _ => None,
        }
    }

    pub fn last_trade_price(&self) -> Option<f64> {
        self.last_trade.map(|(_, p)| p)
    }

    pub fn last_update(&self) -> Option<u64> {
        self.last_update
    }

    /// Total resting volume on one side of the book
    pub fn depth(&self, side: Side) -> f64 {
        match side {
            Side::Buy => self.bids.values().sum(),
            Side::Sell => self.asks.values().sum(),
        }
    }

    /// Apply a market event
    pub fn apply_tick(&mut self, tick: &Tick) {
        if !tick.is_well_formed() {
            return;
        }
        let level = self.to_ticks(tick.price);

        match tick.event_type {
            EventType::BookUpdate => {
                let levels = self.levels_mut(tick.side);
                if tick.volume <= DUST {
                    levels.remove(&level);
                } else {
                    levels.insert(level, tick.volume);
                    self.uncross(tick.side, level);
                }
            }
            EventType::Trade => {
                // Aggressor buy lifts asks, aggressor sell hits bids
                let passive = self.levels_mut(tick.side.opposite());
                if let Some(qty) = passive.get_mut(&level) {
                    *qty -= tick.volume;
                    if *qty <= DUST {
                        passive.remove(&level);
                    }
                }
                self.last_trade = Some((tick.timestamp, tick.price));
            }
        }

        self.last_update = Some(tick.timestamp);
        self.refresh_phase();
    }

    /// Drop stale levels on the other side when an update crosses the book
    fn uncross(&mut self, updated: Side, level: i64) {
        match updated {
            Side::Buy => {
                let stale: Vec<i64> = self.asks.range(..=level).map(|(&t, _)| t).collect();
                for t in stale {
                    self.asks.remove(&t);
                }
            }
            Side::Sell => {
                let stale: Vec<i64> = self.bids.range(level..).map(|(&t, _)| t).collect();
                for t in stale {
                    self.bids.remove(&t);
                }
            }
        }
    }

    fn refresh_phase(&mut self) {
        self.phase = if self.bids.is_empty() || self.asks.is_empty() {
            BookPhase::Idle
        } else {
            BookPhase::Updating
        };
    }

    /// Simulate a child order against current depth, consuming liquidity
    /// nearest the touch first. Consumed volume is removed from the book.
    pub fn apply_fill(&mut self, order: &ChildOrder) -> FillOutcome {
        let requested = order.size.max(0.0);
        if requested <= DUST || self.phase == BookPhase::Idle {
            return FillOutcome::nothing(requested);
        }

        let limit = match order.kind {
            ChildOrderKind::Market => None,
            ChildOrderKind::Limit { price_offset } => match order.side {
                Side::Buy => self.asks.keys().next().map(|&t| t + price_offset),
                Side::Sell => self.bids.keys().next_back().map(|&t| t - price_offset),
            },
        };

        // Walk passive levels in priority order, stopping at the limit
        let candidates: Vec<(i64, f64)> = match order.side {
            Side::Buy => self
                .asks
                .iter()
                .take_while(|&(&t, _)| limit.map_or(true, |l| t <= l))
                .map(|(&t, &q)| (t, q))
                .collect(),
            Side::Sell => self
                .bids
                .iter()
                .rev()
                .take_while(|&(&t, _)| limit.map_or(true, |l| t >= l))
                .map(|(&t, &q)| (t, q))
                .collect(),
        };

        let mut remaining = requested;
        let mut executed = 0.0;
        let mut notional = 0.0;
        let mut levels_consumed = 0;
        let tick_size = self.tick_size;
        let passive = self.levels_mut(order.side.opposite());

        for (level, available) in candidates {
            if remaining <= DUST {
                break;
            }
            let take = remaining.min(available);
            executed += take;
            notional += take * level as f64 * tick_size;
            remaining -= take;
            levels_consumed += 1;

            if available - take <= DUST {
                passive.remove(&level);
            } else if let Some(qty) = passive.get_mut(&level) {
                *qty -= take;
            }
        }

        self.refresh_phase();

        debug_assert!(executed <= requested + DUST);
        FillOutcome {
            requested_volume: requested,
            executed_volume: executed,
            executed_price_avg: (executed > DUST).then(|| notional / executed),
            residual_unfilled: (requested - executed).max(0.0),
            levels_consumed,
        }
    }

    /// Touch prices plus N buckets per side
    pub fn snapshot(&self) -> BookSnapshot {
        let best_bid = self.bids.keys().next_back().copied();
        let best_ask = self.asks.keys().next().copied();

        let mut bid_depth = self.empty_buckets();
        if let Some(top) = best_bid {
            for (&t, &q) in self.bids.iter().rev() {
                let idx = ((top - t) / self.bucket_ticks) as usize;
                if idx >= self.buckets {
                    break;
                }
                bid_depth[idx].volume += q;
            }
        }

        let mut ask_depth = self.empty_buckets();
        if let Some(top) = best_ask {
            for (&t, &q) in self.asks.iter() {
                let idx = ((t - top) / self.bucket_ticks) as usize;
                if idx >= self.buckets {
                    break;
                }
                ask_depth[idx].volume += q;
            }
        }

        BookSnapshot {
            best_bid: best_bid.map(|t| self.to_price(t)),
            best_ask: best_ask.map(|t| self.to_price(t)),
            bid_depth,
            ask_depth,
        }
    }

    fn empty_buckets(&self) -> Vec<DepthBucket> {
        (0..self.buckets)
            .map(|i| DepthBucket {
                price_offset: (i as i64 * self.bucket_ticks) as f64 * self.tick_size,
                volume: 0.0,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
        self.last_trade = None;
        self.last_update = None;
        self.phase = BookPhase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> OrderBookModel {
        let mut book = OrderBookModel::new(0.01, 3, 1);
        // Bids 99.99 x 100, 99.98 x 200; asks 100.01 x 100, 100.02 x 200, 100.03 x 300
        book.apply_tick(&Tick::book(1, 99.99, 100.0, Side::Buy));
        book.apply_tick(&Tick::book(2, 99.98, 200.0, Side::Buy));
        book.apply_tick(&Tick::book(3, 100.01, 100.0, Side::Sell));
        book.apply_tick(&Tick::book(4, 100.02, 200.0, Side::Sell));
        book.apply_tick(&Tick::book(5, 100.03, 300.0, Side::Sell));
        book
    }

    fn market(side: Side, size: f64) -> ChildOrder {
        ChildOrder {
            side,
            size,
            kind: ChildOrderKind::Market,
        }
    }

    #[test]
    fn test_phase_transitions() {
        let mut book = OrderBookModel::new(0.01, 3, 1);
        assert_eq!(book.phase(), BookPhase::Idle);
        book.apply_tick(&Tick::book(1, 99.99, 100.0, Side::Buy));
        assert_eq!(book.phase(), BookPhase::Idle);
        book.apply_tick(&Tick::book(2, 100.01, 100.0, Side::Sell));
        assert_eq!(book.phase(), BookPhase::Updating);
        assert!((book.mid_price().unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_market_order_walks_book() {
        let mut book = book();
        let fill = book.apply_fill(&market(Side::Buy, 250.0));

        assert!((fill.executed_volume - 250.0).abs() < 1e-9);
        assert_eq!(fill.levels_consumed, 2);
        // 100 @ 100.01 + 150 @ 100.02
        let expected = (100.0 * 100.01 + 150.0 * 100.02) / 250.0;
        assert!((fill.executed_price_avg.unwrap() - expected).abs() < 1e-9);
        assert!(fill.executed_price_avg.unwrap() > book.mid_price().unwrap());
        assert!((book.depth(Side::Sell) - 350.0).abs() < 1e-9);
    }

    #[test]
    fn test_market_order_limited_by_liquidity() {
        let mut book = book();
        let fill = book.apply_fill(&market(Side::Sell, 1_000.0));
        assert!((fill.executed_volume - 300.0).abs() < 1e-9);
        assert!((fill.residual_unfilled - 700.0).abs() < 1e-9);
        assert_eq!(book.phase(), BookPhase::Idle);
    }

    #[test]
    fn test_limit_at_touch_fills_best_level_only() {
        let mut book = book();
        let fill = book.apply_fill(&ChildOrder {
            side: Side::Buy,
            size: 150.0,
            kind: ChildOrderKind::Limit { price_offset: 0 },
        });
        assert!((fill.executed_volume - 100.0).abs() < 1e-9);
        assert!((fill.executed_price_avg.unwrap() - 100.01).abs() < 1e-9);
        assert!((fill.residual_unfilled - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_passive_limit_rests_without_fill() {
        let mut book = book();
        let fill = book.apply_fill(&ChildOrder {
            side: Side::Buy,
            size: 50.0,
            kind: ChildOrderKind::Limit { price_offset: -1 },
        });
        assert_eq!(fill.executed_volume, 0.0);
        assert_eq!(fill.executed_price_avg, None);
        assert_eq!(fill.residual_unfilled, 50.0);
    }

    #[test]
    fn test_trade_consumes_passive_level() {
        let mut book = book();
        book.apply_tick(&Tick::trade(6, 100.01, 100.0, Side::Buy));
        assert!((book.best_ask().unwrap() - 100.02).abs() < 1e-9);
        assert_eq!(book.last_trade_price(), Some(100.01));
    }

    #[test]
    fn test_crossing_update_removes_stale_levels() {
        let mut book = book();
        book.apply_tick(&Tick::book(6, 100.02, 50.0, Side::Buy));
        assert!((book.best_bid().unwrap() - 100.02).abs() < 1e-9);
        assert!((book.best_ask().unwrap() - 100.03).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_buckets_and_pressure() {
        let book = book();
        let snap = book.snapshot();
        assert_eq!(snap.bid_depth.len(), 3);
        assert_eq!(snap.ask_depth.len(), 3);
        assert_eq!(snap.bid_depth[0].volume, 100.0);
        assert_eq!(snap.bid_depth[1].volume, 200.0);
        assert_eq!(snap.bid_depth[2].volume, 0.0);
        assert_eq!(snap.ask_depth[2].volume, 300.0);

        let pressure = snap.pressure_features();
        assert_eq!(pressure.len(), 6);
        assert!((pressure.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(pressure.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_idle_book_fills_nothing() {
        let mut book = OrderBookModel::new(0.01, 3, 1);
        let fill = book.apply_fill(&market(Side::Buy, 10.0));
        assert_eq!(fill.executed_volume, 0.0);
        assert_eq!(fill.residual_unfilled, 10.0);
    }
}
