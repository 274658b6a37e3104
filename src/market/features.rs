//! Rolling Market Features
//!
//! Fixed-size circular windows over trade prices and volumes. Nothing grows
//! with the length of the stream: each window holds at most `W` samples.

use serde::{Deserialize, Serialize};

use super::tick::Tick;

/// Fixed-capacity ring buffer with a running sum
#[derive(Debug, Clone)]
pub struct RollingWindow {
    values: Vec<f64>,
    capacity: usize,
    head: usize,
    len: usize,
    sum: f64,
    /// Evictions since `sum` was last rebuilt from `values`
    evictions: usize,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: vec![0.0; capacity],
            capacity,
            head: 0,
            len: 0,
            sum: 0.0,
            evictions: 0,
        }
    }

    /// Insert a sample, evicting the oldest once full. Amortized O(1): the
    /// running sum is rebuilt once per `capacity` evictions.
    pub fn push(&mut self, value: f64) {
        if self.len == self.capacity {
            self.sum -= self.values[self.head];
            self.evictions += 1;
        } else {
            self.len += 1;
        }
        self.values[self.head] = value;
        self.sum += value;
        self.head = (self.head + 1) % self.capacity;

        if self.evictions >= self.capacity {
            self.sum = self.values.iter().sum();
            self.evictions = 0;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Mean of the samples seen so far (0 when empty)
    pub fn mean(&self) -> f64 {
        if self.len == 0 {
            0.0
        } else {
            self.sum / self.len as f64
        }
    }

    /// Sample standard deviation; 0 with fewer than two samples
    pub fn std_dev(&self) -> f64 {
        if self.len < 2 {
            return 0.0;
        }
        let mean = self.mean();
        let squares: f64 = self.iter().map(|v| (v - mean) * (v - mean)).sum();
        (squares / (self.len as f64 - 1.0)).sqrt()
    }

    /// Samples oldest first
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        let start = (self.head + self.capacity - self.len) % self.capacity;
        (0..self.len).map(move |i| self.values[(start + i) % self.capacity])
    }

    /// Least-squares slope against sample index; 0 with fewer than two samples
    pub fn slope(&self) -> f64 {
        if self.len < 2 {
            return 0.0;
        }
        let n = self.len as f64;
        let x_mean = (n - 1.0) / 2.0;
        let y_mean = self.mean();
        let (num, den) = self
            .iter()
            .enumerate()
            .fold((0.0, 0.0), |(num, den), (i, y)| {
                let dx = i as f64 - x_mean;
                (num + dx * (y - y_mean), den + dx * dx)
            });
        if den > 0.0 {
            num / den
        } else {
            0.0
        }
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
        self.sum = 0.0;
        self.evictions = 0;
    }
}

/// Snapshot of the aggregator's rolling statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedFeatures {
    /// Std dev of trade-to-trade price changes, in basis points
    pub volatility_bps: f64,
    /// Slope of traded volume per trade, relative to mean volume
    pub volume_trend: f64,
    /// Simple moving average of traded volume
    pub volume_sma: f64,
    /// Trades observed in the volume window
    pub samples: usize,
}

/// Maintains rolling volatility and volume trend from trade ticks
#[derive(Debug, Clone)]
pub struct FeatureAggregator {
    price_changes: RollingWindow,
    volumes: RollingWindow,
    last_trade_price: Option<f64>,
    observed: u64,
}

impl FeatureAggregator {
    pub fn new(window_size: usize) -> Self {
        Self {
            price_changes: RollingWindow::new(window_size),
            volumes: RollingWindow::new(window_size),
            last_trade_price: None,
            observed: 0,
        }
    }

    /// Update with a tick. Book updates are ignored; only trades move the windows.
    pub fn observe(&mut self, tick: &Tick) {
        self.observed += 1;
        if !tick.is_trade() || !tick.is_well_formed() {
            return;
        }

        if let Some(last) = self.last_trade_price {
            let change_bps = (tick.price - last) / last * 10_000.0;
            self.price_changes.push(change_bps);
        }
        self.last_trade_price = Some(tick.price);
        self.volumes.push(tick.volume);
    }

    /// Pure read of the current statistics
    pub fn features(&self) -> AggregatedFeatures {
        let volume_sma = self.volumes.mean();
        let volume_trend = if volume_sma > 0.0 {
            self.volumes.slope() / volume_sma
        } else {
            0.0
        };

        AggregatedFeatures {
            volatility_bps: self.price_changes.std_dev(),
            volume_trend,
            volume_sma,
            samples: self.volumes.len(),
        }
    }

    pub fn last_trade_price(&self) -> Option<f64> {
        self.last_trade_price
    }

    pub fn observed(&self) -> u64 {
        self.observed
    }

    pub fn window_size(&self) -> usize {
        self.volumes.capacity()
    }

    pub fn reset(&mut self) {
        self.price_changes.clear();
        self.volumes.clear();
        self.last_trade_price = None;
        self.observed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::tick::Side;

    #[test]
    fn test_rolling_window_evicts_oldest() {
        let mut window = RollingWindow::new(3);
        for v in [1.0, 2.0, 3.0, 4.0] {
            window.push(v);
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.iter().collect::<Vec<_>>(), vec![2.0, 3.0, 4.0]);
        assert!((window.mean() - 3.0).abs() < 1e-12);
        assert!((window.std_dev() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_long_stream_matches_exact_window() {
        let mut window = RollingWindow::new(4);
        for i in 0..100_000u64 {
            window.push(1e9 + (i % 7) as f64 * 0.1);
        }
        let values: Vec<f64> = window.iter().collect();
        let mean = values.iter().sum::<f64>() / 4.0;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 3.0;
        assert!((window.mean() - mean).abs() < 1e-6);
        assert!((window.std_dev() - var.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_slope() {
        let mut window = RollingWindow::new(5);
        for v in [10.0, 12.0, 14.0, 16.0] {
            window.push(v);
        }
        assert!((window.slope() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_defined_with_few_samples() {
        let mut agg = FeatureAggregator::new(50);
        assert_eq!(agg.features(), AggregatedFeatures::default());

        agg.observe(&Tick::trade(1, 100.0, 10.0, Side::Buy));
        let f = agg.features();
        assert_eq!(f.volatility_bps, 0.0);
        assert_eq!(f.volume_trend, 0.0);
        assert_eq!(f.volume_sma, 10.0);
        assert_eq!(f.samples, 1);
    }

    #[test]
    fn test_volatility_in_bps() {
        let mut agg = FeatureAggregator::new(10);
        for (i, p) in [100.0, 101.0, 100.0, 101.0].iter().enumerate() {
            agg.observe(&Tick::trade(i as u64, *p, 1.0, Side::Buy));
        }
        let f = agg.features();
        assert!(f.volatility_bps > 90.0 && f.volatility_bps < 120.0);
    }

    #[test]
    fn test_book_updates_ignored() {
        let mut agg = FeatureAggregator::new(10);
        agg.observe(&Tick::book(1, 100.0, 10.0, Side::Buy));
        assert_eq!(agg.features().samples, 0);
        assert_eq!(agg.observed(), 1);
    }

    #[test]
    fn test_rising_volume_trend_positive() {
        let mut agg = FeatureAggregator::new(20);
        for i in 0..10 {
            agg.observe(&Tick::trade(i, 100.0, 10.0 + i as f64, Side::Sell));
        }
        assert!(agg.features().volume_trend > 0.0);
    }
}
