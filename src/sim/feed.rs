// Feed sources: push recorded snapshots into the runner
use std::path::PathBuf;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::sim::types::{BookSnapshot, FeedEvent, SimError};

#[async_trait::async_trait]
pub trait FeedSource {
    // Send events into the runner until the source is exhausted or the receiver goes away.
    async fn spawn(&self, tx: mpsc::Sender<FeedEvent>);
}

/// One JSON `BookSnapshot` per line; blank lines are skipped.
pub struct JsonLinesFeed {
    pub path: PathBuf,
}

impl JsonLinesFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn stream(&self, tx: &mpsc::Sender<FeedEvent>) -> Result<usize, SimError> {
        let file = File::open(&self.path).await?;
        let mut lines = BufReader::new(file).lines();
        let mut line_no = 0;
        let mut sent = 0;

        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            let event = match parse_snapshot(&line, line_no) {
                Ok(snapshot) => FeedEvent::Snapshot(snapshot),
                Err(e) => FeedEvent::Error(e),
            };
            let is_error = matches!(event, FeedEvent::Error(_));
            if tx.send(event).await.is_err() {
                debug!("Runner hung up, stopping feed");
                break;
            }
            if is_error {
                break;
            }
            sent += 1;
        }
        Ok(sent)
    }
}

pub fn parse_snapshot(line: &str, line_no: usize) -> Result<BookSnapshot, SimError> {
    let mut snapshot: BookSnapshot =
        serde_json::from_str(line).map_err(|source| SimError::Decode { line: line_no, source })?;
    snapshot.sort_trades();
    Ok(snapshot)
}

#[async_trait::async_trait]
impl FeedSource for JsonLinesFeed {
    #[instrument(skip_all, fields(path = %self.path.display()))]
    async fn spawn(&self, tx: mpsc::Sender<FeedEvent>) {
        match self.stream(&tx).await {
            Ok(sent) => info!(snapshots = sent, "Feed exhausted"),
            Err(e) => {
                warn!(error = %e, "Feed failed");
                let _ = tx.send(FeedEvent::Error(e)).await;
            }
        }
    }
}

/// Snapshots held in memory, replayed in order.
pub struct VecFeed {
    pub snapshots: Vec<BookSnapshot>,
}

#[async_trait::async_trait]
impl FeedSource for VecFeed {
    async fn spawn(&self, tx: mpsc::Sender<FeedEvent>) {
        for snapshot in &self.snapshots {
            let mut snapshot = snapshot.clone();
            snapshot.sort_trades();
            if tx.send(FeedEvent::Snapshot(snapshot)).await.is_err() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_snapshot_sorts_trades() {
        let line = r#"{"_id":"ob1","ts":1000,
            "buy_rates":[0.011],"buy_quantities":[0.05],
            "sell_rates":[0.012],"sell_quantities":[0.05],
            "buy_trades":[{"r":0.010,"q":1.0},{"_id":"t2","r":0.012,"q":2.0}],
            "sell_trades":[{"r":0.013,"q":1.0},{"r":0.011,"q":2.0}]}"#;
        let snap = parse_snapshot(line, 1).unwrap();
        assert_eq!(snap.id, "ob1");
        assert_eq!(snap.ts, Some(1000));
        assert_eq!(snap.buy_trades[0].r, 0.012);
        assert_eq!(snap.buy_trades[0].id.as_deref(), Some("t2"));
        assert_eq!(snap.sell_trades[0].r, 0.011);
    }

    #[test]
    fn test_parse_snapshot_reports_line() {
        let err = parse_snapshot("{not json", 7).unwrap_err();
        assert!(matches!(err, SimError::Decode { line: 7, .. }));
    }

    #[tokio::test]
    async fn test_missing_file_reports_error() {
        let feed = JsonLinesFeed::new("/definitely/not/here.jsonl");
        let (tx, mut rx) = mpsc::channel(4);
        feed.spawn(tx).await;
        match rx.recv().await {
            Some(FeedEvent::Error(SimError::Io(_))) => {}
            _ => panic!("expected an I/O error event"),
        }
    }
}
