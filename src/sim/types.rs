use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adapter::AdapterError;

// A historical print: rate and base quantity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    pub r: f64,
    pub q: f64,
}

/// One recorded book plus the trades that printed until the next one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookSnapshot {
    #[serde(alias = "_id")]
    pub id: String,
    /// Milliseconds since the epoch.
    #[serde(default)]
    pub ts: Option<u64>,
    pub buy_rates: Vec<f64>,
    pub buy_quantities: Vec<f64>,
    pub sell_rates: Vec<f64>,
    pub sell_quantities: Vec<f64>,
    #[serde(default)]
    pub buy_trades: Vec<Trade>,
    #[serde(default)]
    pub sell_trades: Vec<Trade>,
}

impl BookSnapshot {
    /// Buy trades best (highest) first, sell trades best (lowest) first.
    pub fn sort_trades(&mut self) {
        self.buy_trades.sort_by(|a, b| b.r.total_cmp(&a.r));
        self.sell_trades.sort_by(|a, b| a.r.total_cmp(&b.r));
    }
}

pub enum FeedEvent {
    Snapshot(BookSnapshot),
    /// Unreadable record; the runner fails the run with it.
    Error(SimError),
}

#[derive(Debug, Error)]
pub enum SimError {
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad record on line {line}: {source}")]
    Decode { line: usize, source: serde_json::Error },
    #[error("failed to encode fill: {0}")]
    Encode(serde_json::Error),
    #[error("snapshot {id}: {source}")]
    Quote { id: String, source: AdapterError },
    #[error("feed task failed: {0}")]
    FeedTask(#[from] tokio::task::JoinError),
    #[error("latency histogram: {0}")]
    Histogram(#[from] hdrhistogram::CreationError),
}

pub type SimResult<T> = Result<T, SimError>;
