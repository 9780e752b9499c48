use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

// One resting order: (rate, quantity)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub rate: f64,
    pub quantity: f64,
}

impl Order {
    /// Placeholder incumbent: no own order is resting.
    pub const NULL: Order = Order { rate: 0.0, quantity: 0.0 };

    pub fn new(rate: f64, quantity: f64) -> Self {
        Self { rate, quantity }
    }

    pub fn notional(&self) -> f64 {
        self.rate * self.quantity
    }
}

// Buy side is best (highest) first, sell side best (lowest) first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    pub buy: Vec<Order>,
    pub sell: Vec<Order>,
}

/// Engine result. Only `buy_rate` and `sell_rate` cross the adapter boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NextOrders {
    pub buy_rate: f64,
    pub sell_rate: f64,
    pub expected_profit: f64,
}

impl NextOrders {
    /// Nothing worth quoting; callers cancel whatever is resting.
    pub const NO_QUOTE: NextOrders = NextOrders { buy_rate: -1.0, sell_rate: -1.0, expected_profit: 0.0 };

    pub fn rates(&self) -> (f64, f64) {
        (self.buy_rate, self.sell_rate)
    }

    pub fn is_quote(&self) -> bool {
        self.buy_rate > 0.0 && self.sell_rate > 0.0
    }
}

/// Every argument the engine receives for one quoting decision.
#[derive(Debug, Clone, Copy)]
pub struct QuoteRequest<'a> {
    pub fee: f64,
    pub quantity_limit: f64,
    pub tick: f64,
    pub update_threshold: f64,
    pub place_threshold: f64,
    pub tuning1: &'a [f64],
    pub tuning2: &'a [f64],
    pub book: &'a OrderBook,
    pub incumbent_buy: Order,
    pub incumbent_sell: Order,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("tick must be finite and at least 1e-15, got {tick}")]
    InvalidTick { tick: f64 },
    #[error("fee must be in [0, 1), got {fee}")]
    InvalidFee { fee: f64 },
    #[error("quantity limit must be positive, got {quantity_limit}")]
    InvalidQuantityLimit { quantity_limit: f64 },
    #[error("tuning vectors differ in length: {tuning1} vs {tuning2}")]
    TuningShapeMismatch { tuning1: usize, tuning2: usize },
    #[error("tuning vectors are empty")]
    EmptyTuning,
}
