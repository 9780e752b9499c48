// Runner wires a feed into the adapter and the matching engine
use std::io::Write;
use std::time::Instant;

use hdrhistogram::Histogram;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::adapter;
use crate::config::PartitionConfig;
use crate::engine::book::{buy_depth, sell_depth, trim_parallel};
use crate::engine::co1::Co1Engine;
use crate::engine::{Order, OrderBook, QuoteEngine, Side};
use crate::sim::feed::FeedSource;
use crate::sim::matching::{Assets, Fill, MatchingEngine, SideCounters};
use crate::sim::types::{BookSnapshot, FeedEvent, SimError, SimResult};

const FEED_BUFFER: usize = 1000;
const TRACKED_GAPS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimSummary {
    pub orderbooks: u64,
    pub quote_calls: u64,
    pub matching_calls: u64,
    pub buy_trades: u64,
    pub sell_trades: u64,
    pub fills: u64,
    pub buy: SideCounters,
    pub sell: SideCounters,
    pub final_assets: Assets,
    pub latency_p50_us: u64,
    pub latency_p99_us: u64,
    pub latency_max_us: u64,
    /// Largest gaps between consecutive snapshot timestamps, widest first.
    pub largest_gaps_ms: Vec<u64>,
}

// Written one per line to the fills sink
#[derive(Serialize)]
struct FillRecord<'a> {
    snapshot: &'a str,
    buy_depth: f64,
    sell_depth: f64,
    #[serde(flatten)]
    fill: &'a Fill,
}

pub struct Runner<E: QuoteEngine = Co1Engine> {
    config: PartitionConfig,
    engine: E,
    pdf_x: Vec<f64>,
    matching: MatchingEngine,
    fills_out: Option<Box<dyn Write + Send>>,
    latency_us: Histogram<u64>,
    last_ts: Option<u64>,
    gaps_ms: Vec<u64>,
    orderbooks: u64,
    quote_calls: u64,
    matching_calls: u64,
    buy_trades: u64,
    sell_trades: u64,
    fills: u64,
}

impl Runner<Co1Engine> {
    pub fn from_config(config: PartitionConfig) -> SimResult<Self> {
        let engine = config.engine();
        Runner::new(config, engine)
    }
}

impl<E: QuoteEngine> Runner<E> {
    pub fn new(config: PartitionConfig, engine: E) -> SimResult<Self> {
        let matching = MatchingEngine::new(
            config.quantity_limit,
            config.inventory_limit,
            config.actual_fee_rate(),
            config.min_notional,
            Assets { funds: config.initial_funds, inventory: config.initial_inventory },
        );
        Ok(Self {
            pdf_x: config.pdf.sizes(),
            config,
            engine,
            matching,
            fills_out: None,
            latency_us: Histogram::new(3)?,
            last_ts: None,
            gaps_ms: Vec::with_capacity(TRACKED_GAPS + 1),
            orderbooks: 0,
            quote_calls: 0,
            matching_calls: 0,
            buy_trades: 0,
            sell_trades: 0,
            fills: 0,
        })
    }

    pub fn with_fills_sink(mut self, out: Box<dyn Write + Send>) -> Self {
        self.fills_out = Some(out);
        self
    }

    /// Quote one snapshot and match the quotes against its trades.
    #[instrument(level = "debug", skip_all, fields(snapshot = %snapshot.id))]
    pub fn step(&mut self, mut snapshot: BookSnapshot) -> SimResult<Vec<Fill>> {
        self.orderbooks += 1;
        self.track_gap(snapshot.ts);
        self.buy_trades += snapshot.buy_trades.len() as u64;
        self.sell_trades += snapshot.sell_trades.len() as u64;

        if let Some(depth) = self.config.trim_depth() {
            trim_parallel(&mut snapshot.buy_rates, &mut snapshot.buy_quantities, depth);
            trim_parallel(&mut snapshot.sell_rates, &mut snapshot.sell_quantities, depth);
        }

        let start = Instant::now();
        let quoted = adapter::compute_orders(
            &self.engine,
            self.config.fee_rate,
            self.config.quantity_limit,
            self.config.tick,
            &self.pdf_x,
            self.config.pdf.probabilities(),
            &snapshot.buy_rates,
            &snapshot.buy_quantities,
            &snapshot.sell_rates,
            &snapshot.sell_quantities,
        );
        self.latency_us.saturating_record(start.elapsed().as_micros() as u64);
        self.quote_calls += 1;

        let (buy_rate, sell_rate) = quoted.map_err(|source| SimError::Quote { id: snapshot.id.clone(), source })?;
        if !(buy_rate > 0.0 && sell_rate > 0.0) {
            debug!(buy_rate, sell_rate, "No quote for snapshot");
            return Ok(Vec::new());
        }

        self.matching_calls += 1;
        let outcome = self.matching.match_quotes(buy_rate, sell_rate, &snapshot.buy_trades, &snapshot.sell_trades);

        // lengths were validated by the adapter
        let book = OrderBook::new(
            zip_orders(&snapshot.buy_rates, &snapshot.buy_quantities),
            zip_orders(&snapshot.sell_rates, &snapshot.sell_quantities),
        );
        let buy_at = buy_depth(buy_rate, book.side(Side::Buy));
        let sell_at = sell_depth(sell_rate, book.side(Side::Sell));
        debug!(
            buy_rate,
            sell_rate,
            market_rate = ?book.market_rate(),
            buy_depth = buy_at,
            sell_depth = sell_at,
            buy = ?outcome.buy,
            sell = ?outcome.sell,
            "Matched quotes"
        );

        self.fills += outcome.fills.len() as u64;
        if let Some(out) = self.fills_out.as_mut() {
            for fill in &outcome.fills {
                let record = FillRecord { snapshot: &snapshot.id, buy_depth: buy_at, sell_depth: sell_at, fill };
                serde_json::to_writer(&mut *out, &record).map_err(SimError::Encode)?;
                out.write_all(b"\n")?;
            }
        }
        Ok(outcome.fills)
    }

    fn track_gap(&mut self, ts: Option<u64>) {
        let Some(ts) = ts else { return };
        if let Some(last) = self.last_ts {
            self.gaps_ms.push(ts.saturating_sub(last));
            self.gaps_ms.sort_unstable_by(|a, b| b.cmp(a));
            self.gaps_ms.truncate(TRACKED_GAPS);
        }
        self.last_ts = Some(ts);
    }

    pub fn summary(&self) -> SimSummary {
        SimSummary {
            orderbooks: self.orderbooks,
            quote_calls: self.quote_calls,
            matching_calls: self.matching_calls,
            buy_trades: self.buy_trades,
            sell_trades: self.sell_trades,
            fills: self.fills,
            buy: self.matching.buy_counters,
            sell: self.matching.sell_counters,
            final_assets: self.matching.assets,
            latency_p50_us: self.latency_us.value_at_quantile(0.5),
            latency_p99_us: self.latency_us.value_at_quantile(0.99),
            latency_max_us: self.latency_us.max(),
            largest_gaps_ms: self.gaps_ms.clone(),
        }
    }

    /// Drain `feed` through [`Runner::step`] and report the totals.
    pub async fn run<F>(mut self, feed: F) -> SimResult<SimSummary>
    where
        F: FeedSource + Send + Sync + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<FeedEvent>(FEED_BUFFER);
        let feed_task = tokio::spawn(async move {
            feed.spawn(tx).await;
        });

        while let Some(event) = rx.recv().await {
            match event {
                FeedEvent::Snapshot(snapshot) => {
                    self.step(snapshot)?;
                }
                FeedEvent::Error(e) => {
                    warn!(error = %e, "Stopping simulation");
                    return Err(e);
                }
            }
        }

        feed_task.await?;
        if let Some(out) = self.fills_out.as_mut() {
            out.flush()?;
        }

        let summary = self.summary();
        info!(
            orderbooks = summary.orderbooks,
            matching_calls = summary.matching_calls,
            fills = summary.fills,
            funds = summary.final_assets.funds,
            inventory = summary.final_assets.inventory,
            "Simulation finished"
        );
        Ok(summary)
    }
}

fn zip_orders(rates: &[f64], quantities: &[f64]) -> Vec<Order> {
    rates.iter().zip(quantities).map(|(&r, &q)| Order::new(r, q)).collect()
}
