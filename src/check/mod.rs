//! Combo checking module
//!
//! This module provides functionality for:
//! - Streaming combo lists (`identifier:secret` pairs) from file
//! - Loading proxy lists in various formats (HOST:PORT, scheme://..., etc.)
//! - Classifying authentication attempts routed through each proxy
//! - Draining categorized results to the accepted/challenge/rejected files

pub mod classify;
pub mod engine;
pub mod feed;
pub mod proxy;
pub mod sink;

pub use classify::{AttemptResult, Authenticator, HttpAuthenticator, Outcome};
pub use engine::{Engine, RunReport, SinkPaths};
pub use feed::{Combo, ComboFeed, ComboQueue, FeedStats};
pub use proxy::{ProxyEndpoint, ProxyScheme, ProxySet};
pub use sink::ResultSink;
