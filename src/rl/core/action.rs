//! Action Space
//!
//! Child-order decisions available to the agent at each step.

use serde::{Deserialize, Serialize};

use crate::market::{ChildOrder, ChildOrderKind, Side};
use crate::rl::config::ActionSpaceConfig;

/// One execution decision
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Submit nothing this step
    NoOp,
    /// Walk the book for `size_fraction` of the sizing basis
    MarketOrder { size_fraction: f64 },
    /// Limit order `price_offset` ticks from the opposite touch
    LimitOrder { size_fraction: f64, price_offset: i64 },
}

impl Action {
    pub fn size_fraction(&self) -> f64 {
        match self {
            Action::NoOp => 0.0,
            Action::MarketOrder { size_fraction } | Action::LimitOrder { size_fraction, .. } => {
                *size_fraction
            }
        }
    }

    pub fn is_no_op(&self) -> bool {
        matches!(self, Action::NoOp)
    }

    /// size_fraction must lie in (0, 1]
    pub fn is_valid(&self) -> bool {
        match self {
            Action::NoOp => true,
            _ => {
                let f = self.size_fraction();
                f.is_finite() && f > 0.0 && f <= 1.0
            }
        }
    }

    /// Absolute child order for this action, capped at `remaining`.
    /// `None` for no-ops and when nothing is left.
    pub fn to_child_order(&self, side: Side, basis: f64, remaining: f64) -> Option<ChildOrder> {
        let kind = match self {
            Action::NoOp => return None,
            Action::MarketOrder { .. } => ChildOrderKind::Market,
            Action::LimitOrder { price_offset, .. } => ChildOrderKind::Limit {
                price_offset: *price_offset,
            },
        };
        let size = (self.size_fraction() * basis).min(remaining);
        if size <= 0.0 {
            return None;
        }
        Some(ChildOrder { side, size, kind })
    }

    /// Short human-readable label
    pub fn label(&self) -> String {
        match self {
            Action::NoOp => "no_op".to_string(),
            Action::MarketOrder { size_fraction } => format!("market({size_fraction})"),
            Action::LimitOrder {
                size_fraction,
                price_offset,
            } => format!("limit({size_fraction}, {price_offset:+})"),
        }
    }
}

impl Default for Action {
    fn default() -> Self {
        Action::NoOp
    }
}

/// Ordered discrete action set. Index order is the greedy tie-break order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpace {
    actions: Vec<Action>,
}

impl ActionSpace {
    /// Build from an explicit list; no-op is always index 0
    pub fn new(actions: impl IntoIterator<Item = Action>) -> Self {
        let mut all = vec![Action::NoOp];
        all.extend(actions.into_iter().filter(|a| !a.is_no_op()));
        Self { actions: all }
    }

    /// no_op, then market fractions, then limit (fraction, offset) pairs
    pub fn from_config(config: &ActionSpaceConfig) -> Self {
        let market = config
            .market_fractions
            .iter()
            .map(|&size_fraction| Action::MarketOrder { size_fraction });
        let limit = config.limit_fractions.iter().flat_map(|&size_fraction| {
            config
                .limit_offsets
                .iter()
                .map(move |&price_offset| Action::LimitOrder {
                    size_fraction,
                    price_offset,
                })
        });
        Self::new(market.chain(limit))
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Action> {
        self.actions.get(index).copied()
    }

    pub fn index_of(&self, action: &Action) -> Option<usize> {
        self.actions.iter().position(|a| a == action)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter()
    }
}

impl Default for ActionSpace {
    fn default() -> Self {
        Self::from_config(&ActionSpaceConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_space_ordering() {
        let config = ActionSpaceConfig {
            market_fractions: vec![0.1, 0.5],
            limit_fractions: vec![0.2],
            limit_offsets: vec![-1, 0],
        };
        let space = ActionSpace::from_config(&config);

        assert_eq!(space.len(), 5);
        assert_eq!(space.get(0), Some(Action::NoOp));
        assert_eq!(space.get(1), Some(Action::MarketOrder { size_fraction: 0.1 }));
        assert_eq!(
            space.get(4),
            Some(Action::LimitOrder {
                size_fraction: 0.2,
                price_offset: 0
            })
        );
        assert_eq!(space.index_of(&Action::MarketOrder { size_fraction: 0.5 }), Some(2));
    }

    #[test]
    fn test_child_order_capped_at_remaining() {
        let action = Action::MarketOrder { size_fraction: 0.1 };
        let order = action.to_child_order(Side::Buy, 10_000.0, 400.0).unwrap();
        assert_eq!(order.size, 400.0);
        assert_eq!(order.kind, ChildOrderKind::Market);

        assert!(Action::NoOp.to_child_order(Side::Buy, 10_000.0, 400.0).is_none());
        assert!(action.to_child_order(Side::Buy, 10_000.0, 0.0).is_none());
    }

    #[test]
    fn test_validity() {
        assert!(Action::MarketOrder { size_fraction: 1.0 }.is_valid());
        assert!(!Action::MarketOrder { size_fraction: 0.0 }.is_valid());
        assert!(!Action::LimitOrder {
            size_fraction: 1.5,
            price_offset: 0
        }
        .is_valid());
    }
}
