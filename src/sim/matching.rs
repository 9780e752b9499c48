use serde::Serialize;
use tracing::{debug, instrument, trace};

use crate::engine::types::Side;
use crate::sim::types::Trade;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchResult {
    NoTrades,
    Blocked,
    MinNotionalFailure,
    Unmatchable,
    Matched,
}

/// Quote-currency funds and base-currency inventory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Assets {
    pub funds: f64,
    pub inventory: f64,
}

// One simulated execution of our quote against a historical trade
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fill {
    pub seq: u64,
    pub side: Side,
    pub rate: f64,
    /// Base-currency amount; positive on buys, negative on sells.
    pub quote: f64,
    /// Quote-currency amount; negative on buys, positive on sells.
    pub base: f64,
    pub fee: f64,
    /// Order size still available when the fill happened.
    pub quantity: f64,
    pub ceiling: Option<f64>,
    pub trade_id: Option<String>,
    /// Position of this fill within the side's match.
    pub match_index: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SideCounters {
    /// Individual fills against historical trades.
    pub fills: u64,
    /// `match_quotes` calls that filled at least once; the rest count other outcomes.
    pub matched: u64,
    pub blocked: u64,
    pub no_trades: u64,
    pub min_notional_failures: u64,
    pub unmatchable: u64,
}

impl SideCounters {
    fn record(&mut self, result: MatchResult, fills: usize) {
        self.fills += fills as u64;
        match result {
            MatchResult::NoTrades => self.no_trades += 1,
            MatchResult::Blocked => self.blocked += 1,
            MatchResult::MinNotionalFailure => self.min_notional_failures += 1,
            MatchResult::Unmatchable => self.unmatchable += 1,
            MatchResult::Matched => self.matched += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    pub buy: MatchResult,
    pub sell: MatchResult,
    pub fills: Vec<Fill>,
}

/// Plays our quotes against the trades that printed while they were resting.
#[derive(Debug, Clone)]
pub struct MatchingEngine {
    pub quantity_limit: f64,
    pub inventory_limit: f64,
    pub actual_fee_rate: f64,
    pub min_notional: f64,
    pub assets: Assets,
    pub buy_counters: SideCounters,
    pub sell_counters: SideCounters,
    next_seq: u64,
}

impl MatchingEngine {
    pub fn new(quantity_limit: f64, inventory_limit: f64, actual_fee_rate: f64, min_notional: f64, assets: Assets) -> Self {
        Self {
            quantity_limit,
            inventory_limit,
            actual_fee_rate,
            min_notional,
            assets,
            buy_counters: SideCounters::default(),
            sell_counters: SideCounters::default(),
            next_seq: 0,
        }
    }

    /// Match both quotes. Each side sizes itself from the assets as they were
    /// before this call; `sell_trades` must be rate-ascending and `buy_trades`
    /// rate-descending.
    #[instrument(level = "debug", skip(self, buy_trades, sell_trades), fields(buy_trades = buy_trades.len(), sell_trades = sell_trades.len()))]
    pub fn match_quotes(&mut self, buy_rate: f64, sell_rate: f64, buy_trades: &[Trade], sell_trades: &[Trade]) -> MatchOutcome {
        debug_assert!(buy_rate > 0.0 && sell_rate > 0.0);

        let start = self.assets;
        let mut fills = Vec::new();

        let buy = self.buy(start, buy_rate, sell_rate, sell_trades, &mut fills);
        let buy_fills = fills.len();
        self.buy_counters.record(buy, buy_fills);
        let sell = self.sell(start, sell_rate, buy_trades, &mut fills);
        self.sell_counters.record(sell, fills.len() - buy_fills);

        if buy == MatchResult::Matched || sell == MatchResult::Matched {
            debug!(inventory = self.assets.inventory, funds = self.assets.funds, buy_rate, sell_rate, "Quotes matched");
        }
        MatchOutcome { buy, sell, fills }
    }

    fn buy(&mut self, start: Assets, buy_rate: f64, sell_rate: f64, sell_trades: &[Trade], fills: &mut Vec<Fill>) -> MatchResult {
        if sell_trades.is_empty() {
            return MatchResult::NoTrades;
        }

        let ceiling = self.inventory_limit - start.inventory * sell_rate;
        if ceiling <= 0.0 || start.funds <= 0.0 {
            trace!(ceiling, funds = start.funds, "Buy blocked");
            return MatchResult::Blocked;
        }
        let mut quantity = self.quantity_limit.min(start.funds).min(ceiling);

        let mut matched = 0u32;
        for trade in sell_trades.iter().filter(|t| t.r <= buy_rate) {
            if quantity <= 0.0 {
                return Self::stopped(matched, MatchResult::Unmatchable);
            }

            let base = quantity.min(trade.q * buy_rate);
            let quote = base / buy_rate;
            let fee = quote * self.actual_fee_rate;
            if quote * buy_rate < self.min_notional {
                return Self::stopped(matched, MatchResult::MinNotionalFailure);
            }

            trace!(rate = buy_rate, quote, fee, "BUY fill");
            fills.push(Fill {
                seq: self.bump_seq(),
                side: Side::Buy,
                rate: buy_rate,
                quote,
                base: -base,
                fee,
                quantity,
                ceiling: Some(ceiling),
                trade_id: trade.id.clone(),
                match_index: matched,
            });
            quantity -= base;
            self.assets.funds -= base;
            self.assets.inventory += quote - fee;
            matched += 1;
        }

        Self::stopped(matched, MatchResult::Unmatchable)
    }

    fn sell(&mut self, start: Assets, sell_rate: f64, buy_trades: &[Trade], fills: &mut Vec<Fill>) -> MatchResult {
        if buy_trades.is_empty() {
            return MatchResult::NoTrades;
        }

        let mut quantity = self.quantity_limit.min(start.inventory * sell_rate);
        if quantity <= 0.0 {
            trace!(inventory = start.inventory, "Sell blocked");
            return MatchResult::Blocked;
        }

        let mut matched = 0u32;
        for trade in buy_trades.iter().filter(|t| t.r >= sell_rate) {
            if quantity <= 0.0 {
                return Self::stopped(matched, MatchResult::Unmatchable);
            }

            let base = quantity.min(trade.q * sell_rate);
            let quote = base / sell_rate;
            let fee = base * self.actual_fee_rate;
            if quote * sell_rate < self.min_notional {
                return Self::stopped(matched, MatchResult::MinNotionalFailure);
            }

            trace!(rate = sell_rate, quote, fee, "SELL fill");
            fills.push(Fill {
                seq: self.bump_seq(),
                side: Side::Sell,
                rate: sell_rate,
                quote: -quote,
                base,
                fee,
                quantity,
                ceiling: None,
                trade_id: trade.id.clone(),
                match_index: matched,
            });
            quantity -= base;
            self.assets.funds += base - fee;
            self.assets.inventory -= quote;
            matched += 1;
        }

        Self::stopped(matched, MatchResult::Unmatchable)
    }

    fn stopped(matched: u32, otherwise: MatchResult) -> MatchResult {
        if matched > 0 {
            metrics::counter!("quotex_sim_matches_total").increment(matched as u64);
            MatchResult::Matched
        } else {
            otherwise
        }
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}
