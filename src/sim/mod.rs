//! Offline replay of recorded books: quote each snapshot, then play the
//! quotes against the trades that printed before the next one.

pub mod feed;
pub mod matching;
pub mod runner;
pub mod types;

pub use feed::{FeedSource, JsonLinesFeed, VecFeed};
pub use matching::{Assets, Fill, MatchOutcome, MatchResult, MatchingEngine, SideCounters};
pub use runner::{Runner, SimSummary};
pub use types::{BookSnapshot, FeedEvent, SimError, SimResult, Trade};
