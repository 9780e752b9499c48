use thiserror::Error;
use tracing::{debug, instrument, trace};

use crate::engine::types::{Order, OrderBook, Side};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookError {
    #[error("{side} side has {rates} rates but {quantities} quantities")]
    LengthMismatch { side: Side, rates: usize, quantities: usize },
}

impl OrderBook {
    pub fn new(buy: Vec<Order>, sell: Vec<Order>) -> Self {
        Self { buy, sell }
    }

    /// Pair up parallel rate/quantity sequences, keeping input order.
    #[instrument(level = "trace", skip_all, fields(buy = buy_rates.len(), sell = sell_rates.len()))]
    pub fn from_parallel(
        buy_rates: &[f64],
        buy_quantities: &[f64],
        sell_rates: &[f64],
        sell_quantities: &[f64],
    ) -> Result<Self, BookError> {
        let buy = side_from_parallel(Side::Buy, buy_rates, buy_quantities)?;
        let sell = side_from_parallel(Side::Sell, sell_rates, sell_quantities)?;
        trace!(buy_levels = buy.len(), sell_levels = sell.len(), "Built order book");
        Ok(Self { buy, sell })
    }

    pub fn side(&self, side: Side) -> &[Order] {
        match side {
            Side::Buy => &self.buy,
            Side::Sell => &self.sell,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buy.is_empty() && self.sell.is_empty()
    }

    /// Mid of the two best levels, if both sides have one.
    pub fn market_rate(&self) -> Option<f64> {
        match (self.buy.first(), self.sell.first()) {
            (Some(b), Some(s)) => Some((b.rate + s.rate) / 2.0),
            _ => None,
        }
    }

    pub fn trim_to_depth(&mut self, depth: f64) {
        trim_to_depth(&mut self.buy, depth);
        trim_to_depth(&mut self.sell, depth);
    }
}

fn side_from_parallel(side: Side, rates: &[f64], quantities: &[f64]) -> Result<Vec<Order>, BookError> {
    if rates.len() != quantities.len() {
        let error = BookError::LengthMismatch { side, rates: rates.len(), quantities: quantities.len() };
        debug!(%side, error = %error, "Rejecting book side");
        return Err(error);
    }
    Ok(rates
        .iter()
        .zip(quantities)
        .map(|(&rate, &quantity)| Order::new(rate, quantity))
        .collect())
}

/// Number of leading levels needed for cumulative notional to reach `depth`
/// (all of them if it never does).
pub fn depth_levels(levels: impl IntoIterator<Item = Order>, depth: f64) -> usize {
    let mut in_depth = 0.0;
    let mut count = 0;
    for level in levels {
        count += 1;
        in_depth += level.notional();
        if in_depth >= depth {
            break;
        }
    }
    count
}

pub fn trim_to_depth(levels: &mut Vec<Order>, depth: f64) {
    let keep = depth_levels(levels.iter().copied(), depth);
    levels.truncate(keep);
}

/// [`trim_to_depth`] over parallel rate/quantity sequences. Mismatched
/// sequences are left alone so book construction can reject them.
pub fn trim_parallel(rates: &mut Vec<f64>, quantities: &mut Vec<f64>, depth: f64) {
    if rates.len() != quantities.len() {
        return;
    }
    let keep = depth_levels(rates.iter().zip(quantities.iter()).map(|(&r, &q)| Order::new(r, q)), depth);
    rates.truncate(keep);
    quantities.truncate(keep);
}

/// Notional resting at or below `rate` at the top of the buy side.
pub fn buy_depth(rate: f64, levels: &[Order]) -> f64 {
    levels
        .iter()
        .take_while(|level| level.rate <= rate)
        .map(Order::notional)
        .sum()
}

/// Notional resting at or above `rate` at the top of the sell side.
pub fn sell_depth(rate: f64, levels: &[Order]) -> f64 {
    levels
        .iter()
        .take_while(|level| level.rate >= rate)
        .map(Order::notional)
        .sum()
}
