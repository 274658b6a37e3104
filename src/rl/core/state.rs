//! State Representation
//!
//! Fixed-length, bounded observation handed to the agent:
//! `[time_remaining, volume_remaining, volatility, volume_trend, pressure[2N]]`.

use serde::{Deserialize, Serialize};

use crate::error::{ErrorContext, ExecError, Result};
use crate::market::{AggregatedFeatures, BookSnapshot};

/// Features before the book pressure block
pub const BASE_FEATURES: usize = 4;

/// Validated observation vector: every value finite and within [-1, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateVector {
    values: Vec<f64>,
}

impl StateVector {
    /// Construct, rejecting NaN/inf with a `NumericInstability` error
    pub fn try_new(values: Vec<f64>, context: ErrorContext) -> Result<Self> {
        if let Some((idx, value)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(ExecError::numeric(
                context,
                format!("state feature {idx} is {value}"),
            ));
        }
        Ok(Self {
            values: values.into_iter().map(|v| v.clamp(-1.0, 1.0)).collect(),
        })
    }

    /// All-zero state of the given length
    pub fn zeros(len: usize) -> Self {
        Self {
            values: vec![0.0; len],
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn time_remaining(&self) -> f64 {
        self.values.first().copied().unwrap_or(0.0)
    }

    pub fn volume_remaining(&self) -> f64 {
        self.values.get(1).copied().unwrap_or(0.0)
    }

    pub fn volatility(&self) -> f64 {
        self.values.get(2).copied().unwrap_or(0.0)
    }

    pub fn volume_trend(&self) -> f64 {
        self.values.get(3).copied().unwrap_or(0.0)
    }

    pub fn book_pressure(&self) -> &[f64] {
        self.values.get(BASE_FEATURES..).unwrap_or(&[])
    }
}

/// Raw episode quantities that feed the encoder
#[derive(Debug, Clone, Copy)]
pub struct EpisodeProgress {
    pub steps_remaining: u32,
    pub deadline_steps: u32,
    pub volume_remaining: f64,
    pub total_volume: f64,
}

/// Encodes raw market and episode quantities into a bounded state vector
#[derive(Debug, Clone)]
pub struct StateEncoder {
    book_buckets: usize,
    volatility_scale_bps: f64,
}

impl StateEncoder {
    pub fn new(book_buckets: usize, volatility_scale_bps: f64) -> Self {
        Self {
            book_buckets,
            volatility_scale_bps,
        }
    }

    pub fn output_dim(&self) -> usize {
        BASE_FEATURES + 2 * self.book_buckets
    }

    pub fn encode(
        &self,
        progress: &EpisodeProgress,
        features: &AggregatedFeatures,
        book: &BookSnapshot,
        context: ErrorContext,
    ) -> Result<StateVector> {
        let mut values = Vec::with_capacity(self.output_dim());

        values.push(ratio(
            f64::from(progress.steps_remaining),
            f64::from(progress.deadline_steps),
        ));
        values.push(ratio(progress.volume_remaining, progress.total_volume));
        values.push((features.volatility_bps / self.volatility_scale_bps).tanh());
        // Relative change across the observed window
        values.push((features.volume_trend * features.samples as f64).tanh());

        let mut pressure = book.pressure_features();
        pressure.resize(2 * self.book_buckets, 0.0);
        values.extend(pressure);

        StateVector::try_new(values, context)
    }
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Component;
    use crate::market::DepthBucket;

    fn ctx() -> ErrorContext {
        ErrorContext::new(Component::Environment).episode(1).step(4)
    }

    fn snapshot() -> BookSnapshot {
        let bucket = |volume| DepthBucket {
            price_offset: 0.0,
            volume,
        };
        BookSnapshot {
            best_bid: Some(99.99),
            best_ask: Some(100.01),
            bid_depth: vec![bucket(100.0), bucket(100.0)],
            ask_depth: vec![bucket(200.0), bucket(0.0)],
        }
    }

    #[test]
    fn test_rejects_non_finite() {
        let err = StateVector::try_new(vec![0.5, f64::NAN], ctx()).unwrap_err();
        assert!(err.is_fatal_to_run());
        assert_eq!(err.context().and_then(|c| c.step), Some(4));

        assert!(StateVector::try_new(vec![f64::INFINITY], ctx()).is_err());
    }

    #[test]
    fn test_values_clamped() {
        let state = StateVector::try_new(vec![2.0, -3.0, 0.25], ctx()).unwrap();
        assert_eq!(state.as_slice(), &[1.0, -1.0, 0.25]);
    }

    #[test]
    fn test_encode_layout() {
        let encoder = StateEncoder::new(2, 5.0);
        let progress = EpisodeProgress {
            steps_remaining: 25,
            deadline_steps: 50,
            volume_remaining: 2_500.0,
            total_volume: 10_000.0,
        };
        let features = AggregatedFeatures {
            volatility_bps: 5.0,
            volume_trend: 0.0,
            volume_sma: 10.0,
            samples: 10,
        };
        let state = encoder.encode(&progress, &features, &snapshot(), ctx()).unwrap();

        assert_eq!(state.len(), encoder.output_dim());
        assert_eq!(state.time_remaining(), 0.5);
        assert_eq!(state.volume_remaining(), 0.25);
        assert!((state.volatility() - 1.0_f64.tanh()).abs() < 1e-12);
        assert_eq!(state.volume_trend(), 0.0);
        assert_eq!(state.book_pressure(), &[0.25, 0.25, 0.5, 0.0]);
    }
}
