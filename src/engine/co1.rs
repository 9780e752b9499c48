//! Expected-volume quoting ("CO1").
//!
//! Each candidate order sits one tick inside an existing book level. Its
//! expected fill volume comes from a histogram of market-order sizes
//! (`tuning1` = sizes, `tuning2` = probabilities), discounted by the notional
//! resting ahead of it. The buy/sell pair with the highest
//! `min(volume) * fee-adjusted margin` wins.

use std::collections::HashSet;

use itertools::iproduct;
use ordered_float::OrderedFloat;
use tracing::{debug, instrument, trace};

use crate::engine::types::{EngineError, NextOrders, Order, QuoteRequest, Side};
use crate::engine::QuoteEngine;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Co1Engine {
    /// Keep candidates that land on a rate already present in the book.
    pub allow_order_conflicts: bool,
}

/// Candidate rates for one side, with the notional resting ahead of each.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidates {
    pub rates: Vec<f64>,
    pub pv: Vec<f64>,
}

impl Candidates {
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

/// Smallest tick whose decimal scale still fits comfortably in an f64.
pub const MIN_TICK: f64 = 1e-15;

/// Decimal places implied by a tick size (1e-8 -> 8).
pub fn rate_precision(tick: f64) -> i32 {
    (-tick.log10()).round() as i32
}

/// Round to `precision` decimals, ties to even.
pub fn round_to(x: f64, precision: i32) -> f64 {
    let scale = 10f64.powi(precision);
    (x * scale).round_ties_even() / scale
}

/// Expected fill volume for an order with `pv` notional ahead of it.
pub fn expected_volume(pv: f64, quantity_limit: f64, sizes: &[f64], probabilities: &[f64]) -> f64 {
    sizes
        .iter()
        .zip(probabilities)
        .map(|(&size, &p)| (size - pv).max(0.0).min(quantity_limit) * p)
        .sum()
}

/// Index pair `(buy, sell)` with the highest expected profit, and that profit.
/// Ties keep the first pair in buy-major order; NaN profits never win.
pub fn best_pair(
    buy_rates: &[f64],
    buy_ev: &[f64],
    sell_rates: &[f64],
    sell_ev: &[f64],
    fee: f64,
) -> Option<(usize, usize, f64)> {
    let keep = 1.0 - fee;
    let mut best: Option<(usize, usize, f64)> = None;
    for (b, s) in iproduct!(0..buy_rates.len(), 0..sell_rates.len()) {
        let margin = sell_rates[s] * keep - buy_rates[b] / keep;
        let profit = buy_ev[b].min(sell_ev[s]) * margin;
        if best.map_or(!profit.is_nan(), |(_, _, max)| profit > max) {
            best = Some((b, s, profit));
        }
    }
    best
}

impl Co1Engine {
    pub fn new(allow_order_conflicts: bool) -> Self {
        Self { allow_order_conflicts }
    }

    pub fn candidates(&self, levels: &[Order], side: Side, tick: f64) -> Candidates {
        let precision = rate_precision(tick);
        let existing: HashSet<OrderedFloat<f64>> = levels
            .iter()
            .map(|level| OrderedFloat(round_to(level.rate, precision)))
            .collect();

        let mut out = Candidates::default();
        let mut ahead = 0.0;
        for level in levels {
            let rate = round_to(level.rate, precision);
            let candidate = match side {
                Side::Buy => round_to(rate + tick, precision),
                Side::Sell => round_to(rate - tick, precision),
            };
            let pv = ahead;
            ahead += rate * level.quantity;

            if !self.allow_order_conflicts && existing.contains(&OrderedFloat(candidate)) {
                trace!(%side, candidate, "Candidate collides with a resting level");
                continue;
            }
            out.rates.push(candidate);
            out.pv.push(pv);
        }
        out
    }

    fn validate(request: &QuoteRequest<'_>) -> Result<(), EngineError> {
        if !(request.tick.is_finite() && request.tick >= MIN_TICK) {
            return Err(EngineError::InvalidTick { tick: request.tick });
        }
        if !(0.0..1.0).contains(&request.fee) {
            return Err(EngineError::InvalidFee { fee: request.fee });
        }
        if !(request.quantity_limit > 0.0) {
            return Err(EngineError::InvalidQuantityLimit { quantity_limit: request.quantity_limit });
        }
        if request.tuning1.len() != request.tuning2.len() {
            return Err(EngineError::TuningShapeMismatch {
                tuning1: request.tuning1.len(),
                tuning2: request.tuning2.len(),
            });
        }
        if request.tuning1.is_empty() {
            return Err(EngineError::EmptyTuning);
        }
        Ok(())
    }
}

impl QuoteEngine for Co1Engine {
    #[instrument(level = "debug", skip_all, fields(buy_levels = request.book.buy.len(), sell_levels = request.book.sell.len()))]
    fn compute_orders(&self, request: &QuoteRequest<'_>) -> Result<NextOrders, EngineError> {
        Self::validate(request)?;

        let buy = self.candidates(&request.book.buy, Side::Buy, request.tick);
        let sell = self.candidates(&request.book.sell, Side::Sell, request.tick);
        if buy.is_empty() || sell.is_empty() {
            debug!(buy = buy.len(), sell = sell.len(), "No candidate rates");
            return Ok(NextOrders::NO_QUOTE);
        }

        let ev = |pv: &f64| expected_volume(*pv, request.quantity_limit, request.tuning1, request.tuning2);
        let buy_ev: Vec<f64> = buy.pv.iter().map(ev).collect();
        let sell_ev: Vec<f64> = sell.pv.iter().map(ev).collect();
        trace!(?buy.rates, ?buy_ev, ?sell.rates, ?sell_ev, "Candidates");

        match best_pair(&buy.rates, &buy_ev, &sell.rates, &sell_ev, request.fee) {
            Some((b, s, profit)) if profit > 0.0 => {
                let next = NextOrders { buy_rate: buy.rates[b], sell_rate: sell.rates[s], expected_profit: profit };
                debug!(buy_rate = next.buy_rate, sell_rate = next.sell_rate, profit, "Selected quote pair");
                Ok(next)
            }
            _ => {
                debug!("No profitable quote pair");
                Ok(NextOrders::NO_QUOTE)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::OrderBook;

    const PDF_X: [f64; 2] = [0.01, 0.1];
    const PDF_Y: [f64; 2] = [0.8, 0.2];

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    fn request<'a>(book: &'a OrderBook, tick: f64, x: &'a [f64], y: &'a [f64]) -> QuoteRequest<'a> {
        QuoteRequest {
            fee: 0.002,
            quantity_limit: 0.1,
            tick,
            update_threshold: 0.0,
            place_threshold: 0.0,
            tuning1: x,
            tuning2: y,
            book,
            incumbent_buy: Order::NULL,
            incumbent_sell: Order::NULL,
        }
    }

    fn reference_book() -> OrderBook {
        OrderBook::new(
            vec![Order::new(0.011, 0.05), Order::new(0.010, 0.1)],
            vec![Order::new(0.012, 0.05), Order::new(0.013, 0.1)],
        )
    }

    fn ladder(rates: &[f64], quantities: &[f64]) -> Vec<Order> {
        rates.iter().zip(quantities).map(|(&r, &q)| Order::new(r, q)).collect()
    }

    #[test]
    fn test_reference_quote_tick_1e8() {
        let book = reference_book();
        let next = Co1Engine::default().compute_orders(&request(&book, 1e-8, &PDF_X, &PDF_Y)).unwrap();
        assert!(close(next.buy_rate, 0.01000001), "{next:?}");
        assert!(close(next.sell_rate, 0.01299999), "{next:?}");
        assert!(next.expected_profit > 0.0);
    }

    #[test]
    fn test_reference_quote_tick_1e6() {
        let book = reference_book();
        let next = Co1Engine::default().compute_orders(&request(&book, 1e-6, &PDF_X, &PDF_Y)).unwrap();
        assert!(close(next.buy_rate, 0.010001), "{next:?}");
        assert!(close(next.sell_rate, 0.012999), "{next:?}");
    }

    #[test]
    fn test_crossed_margin_yields_no_quote() {
        // Sell candidates below buy candidates: every margin is negative.
        let book = OrderBook::new(vec![Order::new(0.02, 1.0)], vec![Order::new(0.01, 1.0)]);
        let next = Co1Engine::default().compute_orders(&request(&book, 1e-8, &PDF_X, &PDF_Y)).unwrap();
        assert_eq!(next, NextOrders::NO_QUOTE);
    }

    #[test]
    fn test_empty_book_yields_no_quote() {
        let book = OrderBook::default();
        let next = Co1Engine::default().compute_orders(&request(&book, 1e-8, &PDF_X, &PDF_Y)).unwrap();
        assert_eq!(next, NextOrders::NO_QUOTE);
    }

    #[test]
    fn test_buy_candidates_skip_conflicts() {
        let levels = ladder(&[0.4, 0.3, 0.2, 0.1], &[10.0, 20.0, 30.0, 40.0]);

        let c = Co1Engine::new(false).candidates(&levels, Side::Buy, 0.01);
        assert_eq!(c.len(), 4);
        for (got, want) in c.pv.iter().zip([0.0, 4.0, 10.0, 16.0]) {
            assert!(close(*got, want));
        }
        for (got, want) in c.rates.iter().zip([0.41, 0.31, 0.21, 0.11]) {
            assert!(close(*got, want));
        }

        // One tick up lands on the next level everywhere except the top.
        let c = Co1Engine::new(false).candidates(&levels, Side::Buy, 0.1);
        assert_eq!(c.pv, vec![0.0]);
        assert!(close(c.rates[0], 0.5));

        let c = Co1Engine::new(true).candidates(&levels, Side::Buy, 0.1);
        assert_eq!(c.len(), 4);
        for (got, want) in c.rates.iter().zip([0.5, 0.4, 0.3, 0.2]) {
            assert!(close(*got, want));
        }
    }

    #[test]
    fn test_sell_candidates() {
        let levels = ladder(&[0.2, 0.3, 0.4, 0.5], &[10.0, 20.0, 30.0, 40.0]);
        let c = Co1Engine::default().candidates(&levels, Side::Sell, 0.01);
        for (got, want) in c.pv.iter().zip([0.0, 2.0, 8.0, 20.0]) {
            assert!(close(*got, want));
        }
        for (got, want) in c.rates.iter().zip([0.19, 0.29, 0.39, 0.49]) {
            assert!(close(*got, want));
        }

        let c = Co1Engine::default().candidates(&ladder(&[0.1], &[10.0]), Side::Sell, 0.01);
        assert_eq!(c.pv, vec![0.0]);
        assert!(close(c.rates[0], 0.09));

        let c = Co1Engine::default().candidates(&ladder(&[0.1], &[10.0]), Side::Buy, 0.01);
        assert!(close(c.rates[0], 0.11));
    }

    #[test]
    fn test_expected_volume() {
        let pv = [0.0, 10.0, 20.0, 30.0];
        let ev: Vec<f64> = pv.iter().map(|&p| expected_volume(p, 0.1, &[0.1], &[1.0])).collect();
        assert_eq!(ev, vec![0.1, 0.0, 0.0, 0.0]);

        let ev = expected_volume(0.0, 0.1, &[0.1, 1.0, 2.0], &[0.8, 0.1, 0.1]);
        assert!(close(ev, 0.1));

        let pv = [0.0, 0.05, 0.10, 0.15];
        let ev: Vec<f64> = pv.iter().map(|&p| expected_volume(p, 0.05, &[0.1, 1.0], &[0.5, 0.5])).collect();
        for (got, want) in ev.iter().zip([0.05, 0.05, 0.025, 0.025]) {
            assert!(close(*got, want), "{ev:?}");
        }
    }

    #[test]
    fn test_rate_precision() {
        assert_eq!(rate_precision(1e-8), 8);
        assert_eq!(rate_precision(0.01), 2);
        assert_eq!(rate_precision(1.0), 0);
        assert!(close(round_to(0.3 + 0.1, 1), 0.4));
    }

    #[test]
    fn test_round_to_ties_even() {
        // 0.125 and 0.375 are exact in binary, so these are true halves.
        assert_eq!(round_to(0.125, 2), 0.12);
        assert_eq!(round_to(0.375, 2), 0.38);
        assert_eq!(round_to(2.5, 0), 2.0);
        assert_eq!(round_to(-0.125, 2), -0.12);
    }

    #[test]
    fn test_best_pair_first_max_buy_major() {
        let ev = [1.0, 1.0];

        // (0,1) and (1,1) tie at 2.0: the lower buy index wins.
        assert_eq!(best_pair(&[1.0, 1.0], &ev, &[2.0, 3.0], &ev, 0.0), Some((0, 1, 2.0)));

        // (1,0) and (1,1) tie at 2.0: the lower sell index wins.
        assert_eq!(best_pair(&[2.0, 1.0], &ev, &[3.0, 3.0], &ev, 0.0), Some((1, 0, 2.0)));

        // Three-way tie at 3.0 across rows and columns.
        let buy_ev = [3.0, 1.5];
        let sell_ev = [3.0, 1.5];
        assert_eq!(best_pair(&[1.0, 1.0], &buy_ev, &[2.0, 3.0], &sell_ev, 0.0), Some((0, 0, 3.0)));
    }

    #[test]
    fn test_best_pair_skips_nan() {
        let got = best_pair(&[f64::NAN, 1.0], &[1.0, 1.0], &[2.0], &[1.0], 0.0);
        assert_eq!(got, Some((1, 0, 1.0)));
        assert_eq!(best_pair(&[], &[], &[2.0], &[1.0], 0.0), None);
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let book = reference_book();
        let engine = Co1Engine::default();

        let err = engine.compute_orders(&request(&book, 0.0, &PDF_X, &PDF_Y)).unwrap_err();
        assert_eq!(err, EngineError::InvalidTick { tick: 0.0 });

        // 10^323 overflows, so rounding would turn every rate into NaN.
        let err = engine.compute_orders(&request(&book, 1e-323, &PDF_X, &PDF_Y)).unwrap_err();
        assert_eq!(err, EngineError::InvalidTick { tick: 1e-323 });
        assert!(engine.compute_orders(&request(&book, MIN_TICK, &PDF_X, &PDF_Y)).is_ok());

        let err = engine.compute_orders(&request(&book, 1e-8, &[0.1, 1.0, 2.0], &[0.5, 0.25])).unwrap_err();
        assert_eq!(err, EngineError::TuningShapeMismatch { tuning1: 3, tuning2: 2 });

        let err = engine.compute_orders(&request(&book, 1e-8, &[], &[])).unwrap_err();
        assert_eq!(err, EngineError::EmptyTuning);

        let mut req = request(&book, 1e-8, &PDF_X, &PDF_Y);
        req.fee = 1.0;
        assert_eq!(engine.compute_orders(&req).unwrap_err(), EngineError::InvalidFee { fee: 1.0 });

        let mut req = request(&book, 1e-8, &PDF_X, &PDF_Y);
        req.quantity_limit = 0.0;
        assert_eq!(
            engine.compute_orders(&req).unwrap_err(),
            EngineError::InvalidQuantityLimit { quantity_limit: 0.0 }
        );
    }
}
