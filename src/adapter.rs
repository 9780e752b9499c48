//! Call boundary: plain scalars and sequences in, `(buy_rate, sell_rate)` out.

use std::time::Instant;

use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::engine::book::BookError;
use crate::engine::co1::Co1Engine;
use crate::engine::{EngineError, Order, OrderBook, QuoteEngine, QuoteRequest, Side};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdapterError {
    #[error("{side} side has {rates} rates but {quantities} quantities")]
    LengthMismatch { side: Side, rates: usize, quantities: usize },
    #[error("engine failed: {0}")]
    Engine(#[from] EngineError),
}

impl From<BookError> for AdapterError {
    fn from(e: BookError) -> Self {
        match e {
            BookError::LengthMismatch { side, rates, quantities } => AdapterError::LengthMismatch { side, rates, quantities },
        }
    }
}

/// Build the order book from parallel sequences and ask `engine` for the next
/// buy/sell rates.
///
/// Both incumbents are `Order::NULL` and both threshold scalars are zero: the
/// caller never has an own order resting. `(-1.0, -1.0)` from the default
/// engine means "quote nothing".
#[allow(clippy::too_many_arguments)]
#[instrument(level = "debug", skip_all, fields(fee = fee, quantity_limit = quantity_limit, tick = tick))]
pub fn compute_orders<E: QuoteEngine + ?Sized>(
    engine: &E,
    fee: f64,
    quantity_limit: f64,
    tick: f64,
    tuning1: &[f64],
    tuning2: &[f64],
    buy_rates: &[f64],
    buy_quantities: &[f64],
    sell_rates: &[f64],
    sell_quantities: &[f64],
) -> Result<(f64, f64), AdapterError> {
    let start = Instant::now();

    let book = match OrderBook::from_parallel(buy_rates, buy_quantities, sell_rates, sell_quantities) {
        Ok(book) => book,
        Err(e) => {
            warn!(error = %e, "Rejecting malformed order book");
            metrics::counter!("quotex_compute_orders_rejected_total").increment(1);
            return Err(e.into());
        }
    };

    let null_incumbent = Order::NULL;
    let dummy = 0.0;

    let request = QuoteRequest {
        fee,
        quantity_limit,
        tick,
        update_threshold: dummy,
        place_threshold: dummy,
        tuning1,
        tuning2,
        book: &book,
        incumbent_buy: null_incumbent,
        incumbent_sell: null_incumbent,
    };

    let next = engine.compute_orders(&request).map_err(|e| {
        warn!(error = %e, "Engine rejected request");
        metrics::counter!("quotex_compute_orders_rejected_total").increment(1);
        AdapterError::from(e)
    })?;

    let elapsed = start.elapsed();
    metrics::counter!("quotex_compute_orders_total").increment(1);
    metrics::histogram!("quotex_compute_latency_us").record(elapsed.as_secs_f64() * 1e6);
    debug!(
        buy_rate = next.buy_rate,
        sell_rate = next.sell_rate,
        processing_time_ns = elapsed.as_nanos(),
        "Computed orders"
    );

    Ok(next.rates())
}

/// [`compute_orders`] against the default CO1 engine.
#[allow(clippy::too_many_arguments)]
pub fn compute_orders_co1(
    fee: f64,
    quantity_limit: f64,
    tick: f64,
    tuning1: &[f64],
    tuning2: &[f64],
    buy_rates: &[f64],
    buy_quantities: &[f64],
    sell_rates: &[f64],
    sell_quantities: &[f64],
) -> Result<(f64, f64), AdapterError> {
    compute_orders(
        &Co1Engine::default(),
        fee,
        quantity_limit,
        tick,
        tuning1,
        tuning2,
        buy_rates,
        buy_quantities,
        sell_rates,
        sell_quantities,
    )
}
