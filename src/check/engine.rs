//! Worker pool and run orchestration
//!
//! The engine wires the feed, the workers and the three sinks together and
//! owns the shutdown order: the sink channels close exactly when the last
//! worker has returned, and the run is over once every sink has flushed.
//! No component other than the engine knows about the others.

use crate::check::classify::{AttemptResult, Authenticator, Outcome};
use crate::check::feed::{ComboFeed, ComboQueue, FeedStats};
use crate::check::proxy::ProxySet;
use crate::check::sink::ResultSink;
use crate::{Result, RunConfig};
use anyhow::{anyhow, ensure, Context};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinSet;
use tracing::{debug, info};

/// Queue depth between the feed and the workers
const FEED_QUEUE_DEPTH: usize = 10;

/// Queue depth between the workers and each sink
const SINK_QUEUE_DEPTH: usize = 10;

/// Output destinations for the three outcome categories
#[derive(Debug, Clone)]
pub struct SinkPaths {
    pub accepted: PathBuf,
    pub challenge: PathBuf,
    pub rejected: PathBuf,
}

impl From<&RunConfig> for SinkPaths {
    fn from(config: &RunConfig) -> Self {
        Self {
            accepted: config.accepted.clone(),
            challenge: config.challenge.clone(),
            rejected: config.rejected.clone(),
        }
    }
}

/// End-of-run counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Combos handed to the workers
    pub combos: u64,
    /// Malformed combo lines skipped by the feed
    pub skipped_lines: u64,
    /// Attempts performed (one per combo per proxy)
    pub attempts: u64,
    /// Lines written to the accepted output
    pub accepted: u64,
    /// Lines written to the challenge output
    pub challenged: u64,
    /// Lines written to the rejected output
    pub rejected: u64,
}

/// Send ends of the three sink channels.
///
/// Workers hold a clone of this and of the combo queue, nothing else that is
/// shared and mutable.
#[derive(Clone)]
struct OutcomeRoutes {
    accepted: Sender<AttemptResult>,
    challenge: Sender<AttemptResult>,
    rejected: Sender<AttemptResult>,
}

impl OutcomeRoutes {
    /// Route a result to the sink matching its outcome, blocking while that
    /// sink's buffer is full.
    async fn dispatch(&self, result: AttemptResult) -> Result<()> {
        let lane = match result.outcome {
            Outcome::Accepted => &self.accepted,
            Outcome::ChallengeRequired => &self.challenge,
            Outcome::Rejected => &self.rejected,
        };
        lane.send(result)
            .await
            .map_err(|_| anyhow!("result sink closed before workers finished"))
    }
}

/// The concurrent checking engine: a fixed pool of workers between one combo
/// feed and three result sinks.
pub struct Engine<A> {
    workers: usize,
    proxies: Arc<ProxySet>,
    authenticator: Arc<A>,
}

impl<A: Authenticator + 'static> Engine<A> {
    pub fn new(workers: usize, proxies: ProxySet, authenticator: A) -> Self {
        Self {
            workers,
            proxies: Arc::new(proxies),
            authenticator: Arc::new(authenticator),
        }
    }

    /// Run the full batch and block until every sink has flushed.
    ///
    /// Startup order: sinks first, then the feed, then the workers, so that
    /// an unusable file fails the run before any attempt is made.
    pub async fn run(&self, combos: &Path, outputs: &SinkPaths) -> Result<RunReport> {
        ensure!(self.workers >= 1, "engine needs at least one worker");
        ensure!(!self.proxies.is_empty(), "engine needs a non-empty proxy set");

        let (accepted_tx, accepted_sink) =
            ResultSink::open(&outputs.accepted, SINK_QUEUE_DEPTH).await?;
        let (challenge_tx, challenge_sink) =
            ResultSink::open(&outputs.challenge, SINK_QUEUE_DEPTH).await?;
        let (rejected_tx, rejected_sink) =
            ResultSink::open(&outputs.rejected, SINK_QUEUE_DEPTH).await?;
        let routes = OutcomeRoutes {
            accepted: accepted_tx,
            challenge: challenge_tx,
            rejected: rejected_tx,
        };

        let (queue, feed) = ComboFeed::open(combos, FEED_QUEUE_DEPTH).await?;

        let mut workers = JoinSet::new();
        for worker in 0..self.workers {
            workers.spawn(worker_loop(
                worker,
                queue.clone(),
                Arc::clone(&self.proxies),
                Arc::clone(&self.authenticator),
                routes.clone(),
            ));
        }
        // The engine keeps no send end of its own, so the sink channels
        // close exactly when the last worker returns.
        drop(routes);
        drop(queue);

        let mut attempts = 0u64;
        let mut failure: Option<anyhow::Error> = None;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Ok(worker_attempts)) => attempts += worker_attempts,
                Ok(Err(err)) => {
                    failure.get_or_insert(err);
                }
                Err(err) => {
                    failure.get_or_insert(anyhow!(err).context("worker task panicked"));
                }
            }
        }

        let accepted = accepted_sink.await.context("accepted sink task died")??;
        let challenged = challenge_sink.await.context("challenge sink task died")??;
        let rejected = rejected_sink.await.context("rejected sink task died")??;

        if let Some(err) = failure {
            return Err(err);
        }

        let FeedStats { produced, skipped } = feed.await.context("combo feed task died")??;

        info!(
            combos = produced,
            attempts, accepted, challenged, rejected, "run complete"
        );
        Ok(RunReport {
            combos: produced,
            skipped_lines: skipped,
            attempts,
            accepted,
            challenged,
            rejected,
        })
    }
}

/// One worker: take the next combo, rotate through the full proxy set in
/// order, classify, route. Stops when the feed is exhausted.
async fn worker_loop<A: Authenticator>(
    worker: usize,
    queue: ComboQueue,
    proxies: Arc<ProxySet>,
    authenticator: Arc<A>,
    routes: OutcomeRoutes,
) -> Result<u64> {
    let mut attempts = 0u64;
    while let Some(combo) = queue.next().await {
        for proxy in proxies.iter() {
            let outcome = authenticator.attempt(&combo, proxy).await;
            debug!(
                worker,
                combo = %combo.identifier,
                proxy = %proxy,
                outcome = outcome.label(),
                "attempt classified"
            );
            routes
                .dispatch(AttemptResult::new(combo.clone(), proxy.clone(), outcome))
                .await?;
            attempts += 1;
        }
    }
    Ok(attempts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::feed::Combo;
    use crate::check::proxy::{ProxyEndpoint, ProxyScheme};
    use std::collections::HashSet;

    /// Verdict depends only on the identifier, so every proxy sees the same
    /// classification for a given combo.
    struct ScriptedAuthenticator;

    impl Authenticator for ScriptedAuthenticator {
        async fn attempt(&self, combo: &Combo, _proxy: &ProxyEndpoint) -> Outcome {
            match combo.identifier.as_str() {
                "alice" => Outcome::Accepted,
                "bob" => Outcome::ChallengeRequired,
                _ => Outcome::Rejected,
            }
        }
    }

    fn proxy_set(count: usize) -> ProxySet {
        ProxySet::from_endpoints(
            (0..count)
                .map(|i| ProxyEndpoint::new(ProxyScheme::Http, format!("10.0.0.{}", i + 1), 8080))
                .collect(),
        )
        .unwrap()
    }

    async fn run_with<A: Authenticator + 'static>(
        authenticator: A,
        workers: usize,
        combo_lines: &[&str],
        proxies: usize,
    ) -> (RunReport, [Vec<String>; 3]) {
        let dir = tempfile::tempdir().unwrap();
        let combos = dir.path().join("combos.txt");
        std::fs::write(&combos, combo_lines.join("\n")).unwrap();
        let outputs = SinkPaths {
            accepted: dir.path().join("accepted.txt"),
            challenge: dir.path().join("challenge.txt"),
            rejected: dir.path().join("rejected.txt"),
        };

        let engine = Engine::new(workers, proxy_set(proxies), authenticator);
        let report = engine.run(&combos, &outputs).await.unwrap();

        let read = |path: &Path| {
            std::fs::read_to_string(path)
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect::<Vec<_>>()
        };
        let lines = [
            read(&outputs.accepted),
            read(&outputs.challenge),
            read(&outputs.rejected),
        ];
        (report, lines)
    }

    #[tokio::test]
    async fn test_partitions_results_by_outcome() {
        let (report, [accepted, challenge, rejected]) =
            run_with(ScriptedAuthenticator, 2, &["alice:pw1", "bob:pw2"], 2).await;

        let expect = |combo: &str| {
            HashSet::from([
                format!("{combo} - http://10.0.0.1:8080"),
                format!("{combo} - http://10.0.0.2:8080"),
            ])
        };
        assert_eq!(
            accepted.iter().cloned().collect::<HashSet<_>>(),
            expect("alice:pw1")
        );
        assert_eq!(
            challenge.iter().cloned().collect::<HashSet<_>>(),
            expect("bob:pw2")
        );
        assert!(rejected.is_empty());

        assert_eq!(
            report,
            RunReport {
                combos: 2,
                skipped_lines: 0,
                attempts: 4,
                accepted: 2,
                challenged: 2,
                rejected: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_every_combination_attempted_exactly_once() {
        let combos: Vec<String> = (1..=6).map(|i| format!("user{i}:pw{i}")).collect();
        let combo_lines: Vec<&str> = combos.iter().map(String::as_str).collect();

        // One worker, a few, exactly as many as combos, and more than combos.
        for workers in [1, 4, 6, 16] {
            let (report, [accepted, challenge, rejected]) =
                run_with(ScriptedAuthenticator, workers, &combo_lines, 3).await;

            assert!(accepted.is_empty());
            assert!(challenge.is_empty());
            assert_eq!(report.attempts, 18, "workers={workers}");
            assert_eq!(rejected.len(), 18, "workers={workers}");

            let expected: HashSet<String> = combos
                .iter()
                .flat_map(|combo| {
                    (1..=3).map(move |p| format!("{combo} - http://10.0.0.{p}:8080"))
                })
                .collect();
            let actual: HashSet<String> = rejected.iter().cloned().collect();
            assert_eq!(actual, expected, "workers={workers}");
        }
    }

    #[tokio::test]
    async fn test_malformed_combo_lines_skipped_and_counted() {
        let (report, [accepted, _, rejected]) = run_with(
            ScriptedAuthenticator,
            2,
            &["alice:pw1", "garbage", "a:b:c", ":nosuchuser", "bob:pw2"],
            1,
        )
        .await;

        assert_eq!(report.combos, 2);
        assert_eq!(report.skipped_lines, 3);
        assert_eq!(report.attempts, 2);
        assert_eq!(accepted.len(), 1);
        assert!(rejected.is_empty());
    }

    #[tokio::test]
    async fn test_zero_workers_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let combos = dir.path().join("combos.txt");
        std::fs::write(&combos, "alice:pw1\n").unwrap();
        let outputs = SinkPaths {
            accepted: dir.path().join("a.txt"),
            challenge: dir.path().join("c.txt"),
            rejected: dir.path().join("r.txt"),
        };

        let engine = Engine::new(0, proxy_set(1), ScriptedAuthenticator);
        assert!(engine.run(&combos, &outputs).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_combo_list_fails_before_any_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let outputs = SinkPaths {
            accepted: dir.path().join("a.txt"),
            challenge: dir.path().join("c.txt"),
            rejected: dir.path().join("r.txt"),
        };

        let engine = Engine::new(2, proxy_set(1), ScriptedAuthenticator);
        let err = engine
            .run(&dir.path().join("missing.txt"), &outputs)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing.txt"));
    }

    /// Rejects everything routed through the first proxy, accepts the rest.
    struct FirstProxyDown;

    impl Authenticator for FirstProxyDown {
        async fn attempt(&self, _combo: &Combo, proxy: &ProxyEndpoint) -> Outcome {
            if proxy.url().starts_with("http://10.0.0.1:") {
                Outcome::Rejected
            } else {
                Outcome::Accepted
            }
        }
    }

    #[tokio::test]
    async fn test_dead_proxy_only_affects_its_own_attempts() {
        let (report, [accepted, challenge, rejected]) =
            run_with(FirstProxyDown, 2, &["alice:pw1", "bob:pw2"], 3).await;

        assert_eq!(report.attempts, 6);
        assert_eq!(accepted.len(), 4);
        assert_eq!(rejected.len(), 2);
        assert!(challenge.is_empty());
        assert!(rejected.iter().all(|line| line.ends_with("http://10.0.0.1:8080")));
    }

    #[tokio::test]
    async fn test_empty_combo_list_terminates_cleanly() {
        let (report, [accepted, challenge, rejected]) = run_with(ScriptedAuthenticator, 4, &[], 2).await;
        assert_eq!(report, RunReport::default());
        assert!(accepted.is_empty() && challenge.is_empty() && rejected.is_empty());
    }
}
