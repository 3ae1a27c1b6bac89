//! Run configuration: JSON config file plus CLI overrides

use crate::Result;
use anyhow::{ensure, Context};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default number of concurrent workers
const DEFAULT_THREADS: usize = 10;

/// Default per-attempt request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Configuration for one checking run.
///
/// Every field has a default except the target URL, which must come from the
/// config file or the command line. [`RunConfig::validate`] is called once at
/// startup, before any file is opened or worker spawned.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Number of concurrent workers
    pub threads: usize,
    /// Authentication endpoint the attempts are sent to
    pub target_url: String,
    /// Per-attempt request timeout in seconds
    pub timeout_secs: u64,
    /// Combo list file, one `identifier:secret` pair per line
    pub combos: PathBuf,
    /// Proxy list file, one endpoint per line
    pub proxies: PathBuf,
    /// Output file for accepted pairs
    pub accepted: PathBuf,
    /// Output file for challenge-required pairs
    pub challenge: PathBuf,
    /// Output file for rejected pairs
    pub rejected: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            threads: DEFAULT_THREADS,
            target_url: String::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            combos: PathBuf::from("./input/combos.txt"),
            proxies: PathBuf::from("./input/proxies.txt"),
            accepted: PathBuf::from("./output/accepted.txt"),
            challenge: PathBuf::from("./output/challenge.txt"),
            rejected: PathBuf::from("./output/rejected.txt"),
        }
    }
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("malformed config file {}", path.display()))?;
        Ok(config)
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_target_url(mut self, url: String) -> Self {
        self.target_url = url;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Per-attempt request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check the configuration before the run starts
    pub fn validate(&self) -> Result<()> {
        ensure!(self.threads >= 1, "threads must be at least 1");
        ensure!(self.timeout_secs >= 1, "timeout must be at least 1 second");
        ensure!(
            !self.target_url.is_empty(),
            "no target URL configured (set target_url in the config file or pass --target)"
        );
        reqwest::Url::parse(&self.target_url)
            .with_context(|| format!("invalid target URL {}", self.target_url))?;
        Ok(())
    }
}
