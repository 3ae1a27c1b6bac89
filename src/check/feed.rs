//! Combo list ingestion
//!
//! The feed reads one `identifier:secret` pair per line and pumps them into a
//! bounded queue shared by all workers. It is single-pass: once the file is
//! exhausted the queue closes and workers observe end-of-input.
//!
//! Malformed lines (not exactly two non-empty `:`-separated fields) are
//! skipped and counted, never aborted on; the skip total comes back in
//! [`FeedStats`]. Blank lines are ignored silently. This is the only place
//! that decides what happens to a bad combo line.

use crate::Result;
use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, warn};

/// Delimiter between the identifier and the secret in a combo line
pub const COMBO_DELIMITER: char = ':';

/// One credential pair parsed from a combo line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combo {
    pub identifier: String,
    pub secret: String,
}

impl Combo {
    pub fn new(identifier: String, secret: String) -> Self {
        Self { identifier, secret }
    }

    /// Parse one combo line.
    ///
    /// Requires exactly one delimiter and two non-empty fields; anything else
    /// is malformed and yields `None`.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        let mut fields = line.split(COMBO_DELIMITER);
        let identifier = fields.next()?;
        let secret = fields.next()?;
        if fields.next().is_some() || identifier.is_empty() || secret.is_empty() {
            return None;
        }
        Some(Self::new(identifier.to_string(), secret.to_string()))
    }
}

impl std::fmt::Display for Combo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.identifier, COMBO_DELIMITER, self.secret)
    }
}

/// Counters returned when the feed finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    /// Combos handed to the workers
    pub produced: u64,
    /// Malformed lines skipped
    pub skipped: u64,
}

/// Receive end of the combo queue, shared by every worker.
///
/// The queue is single-producer/multi-consumer: the feed task is the one
/// producer and each worker takes the next combo here, so a combo is handed
/// to at most one worker.
#[derive(Clone)]
pub struct ComboQueue {
    inner: Arc<Mutex<Receiver<Combo>>>,
}

impl ComboQueue {
    /// Take the next combo, waiting until one arrives or the feed closes
    pub async fn next(&self) -> Option<Combo> {
        self.inner.lock().await.recv().await
    }
}

/// Streams parsed combos from a line-oriented file into a bounded queue
pub struct ComboFeed;

impl ComboFeed {
    /// Open the combo file and start the producer task.
    ///
    /// Opening happens before the task is spawned so an unreadable file fails
    /// the run up front. The returned handle resolves to the feed counters
    /// once the file is exhausted.
    pub async fn open<P: AsRef<Path>>(
        path: P,
        depth: usize,
    ) -> Result<(ComboQueue, JoinHandle<Result<FeedStats>>)> {
        let path = path.as_ref();
        let file = File::open(path)
            .await
            .with_context(|| format!("cannot open combo list {}", path.display()))?;

        let (tx, rx) = mpsc::channel(depth);
        let handle = tokio::spawn(Self::pump(file, tx, path.display().to_string()));
        let queue = ComboQueue {
            inner: Arc::new(Mutex::new(rx)),
        };
        Ok((queue, handle))
    }

    async fn pump(file: File, tx: Sender<Combo>, source: String) -> Result<FeedStats> {
        let mut lines = BufReader::new(file).lines();
        let mut stats = FeedStats::default();

        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(err) => {
                    error!(%source, error = %err, "combo list read failed");
                    return Err(err).with_context(|| format!("reading combo list {source}"));
                }
            };

            if line.trim().is_empty() {
                continue;
            }
            let Some(combo) = Combo::parse_line(&line) else {
                warn!(%source, %line, "skipping malformed combo line");
                stats.skipped += 1;
                continue;
            };

            // Blocks when the queue is full; send only fails once every
            // worker is gone, at which point there is nobody left to feed.
            if tx.send(combo).await.is_err() {
                break;
            }
            stats.produced += 1;
        }

        Ok(stats)
    }
}
