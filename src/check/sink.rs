//! Result sinks
//!
//! Each outcome category gets one sink: a bounded channel drained by its own
//! task into a buffered file writer. The bounded channel is the backpressure
//! point — a momentarily slow sink absorbs bursts without letting results
//! pile up unbounded, and workers block rather than drop anything. The drain
//! task finishes once every send end is dropped, flushing before it returns.

use crate::check::classify::AttemptResult;
use crate::Result;
use anyhow::Context;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;

/// Sink for one outcome category
pub struct ResultSink;

impl ResultSink {
    /// Create the output file and start the drain task.
    ///
    /// File creation happens before anything is spawned so an unwritable
    /// destination fails the run up front. The handle resolves to the number
    /// of lines written once the channel closes and the file is flushed.
    pub async fn open<P: AsRef<Path>>(
        path: P,
        depth: usize,
    ) -> Result<(Sender<AttemptResult>, JoinHandle<Result<u64>>)> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("cannot create output directory {}", parent.display()))?;
            }
        }
        let file = File::create(&path)
            .await
            .with_context(|| format!("cannot create output file {}", path.display()))?;

        let (tx, rx) = mpsc::channel(depth);
        let handle = tokio::spawn(Self::drain(file, rx, path));
        Ok((tx, handle))
    }

    async fn drain(file: File, mut rx: Receiver<AttemptResult>, path: PathBuf) -> Result<u64> {
        let mut writer = BufWriter::new(file);
        let mut written = 0u64;

        while let Some(result) = rx.recv().await {
            writer
                .write_all(result.line().as_bytes())
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            writer
                .write_all(b"\n")
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            written += 1;
        }

        writer
            .flush()
            .await
            .with_context(|| format!("flushing {}", path.display()))?;
        Ok(written)
    }
}
