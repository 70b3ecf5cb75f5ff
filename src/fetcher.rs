//! Rate-limited HTTP fetching.
//!
//! [`RateLimitedFetcher`] wraps a single GET behind a quota check and a
//! wait-and-retry loop. Throttling, whether from the local quota or a remote
//! 429, is absorbed inside [`RateLimitedFetcher::get_or_wait`]; callers only
//! ever see a real response or a transport/parse failure.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::rate_limit::QuotaTracker;

/// Cooldown applied when the remote service itself returns 429.
pub const REMOTE_COOLDOWN: Duration = Duration::from_secs(60 * 5);

/// Granularity of the wait loop; remaining time is re-checked and reported
/// after each increment.
const WAIT_INCREMENT: Duration = Duration::from_secs(60);

/// A fatal failure of a single `get_or_wait` call.
///
/// Throttling never appears here; it is retried internally. These errors are
/// the caller's to handle and are never retried by the fetcher.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level failure issuing the request or reading the response.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response carried a body that was not valid JSON.
    #[error("invalid response body (HTTP {status}): {source}")]
    Body {
        status: u16,
        source: serde_json::Error,
    },
}

/// Outcome of a fetch attempt.
///
/// Results returned from [`RateLimitedFetcher::get_or_wait`] always have
/// `throttled == false`; throttled results only exist inside the retry loop.
/// A non-success status with a parsed body is a valid result here - whether
/// it is an application error is the caller's decision.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// HTTP status code of the response.
    pub status: u16,
    /// Parsed JSON payload, absent when the response had no content.
    pub body: Option<Value>,
    /// True when the request was not actually answered by the remote service
    /// because of throttling (local quota or remote 429).
    pub throttled: bool,
    /// Deadline until which no progress is expected; only meaningful when
    /// `throttled` is true.
    pub retry_after: Option<Instant>,
}

impl FetchResult {
    fn completed(status: u16, body: Option<Value>) -> Self {
        Self {
            status,
            body,
            throttled: false,
            retry_after: None,
        }
    }

    fn throttled(retry_after: Instant) -> Self {
        Self {
            status: StatusCode::TOO_MANY_REQUESTS.as_u16(),
            body: None,
            throttled: true,
            retry_after: Some(retry_after),
        }
    }
}

/// Sink for fetch progress and wait-state notifications.
///
/// Passed in at construction instead of the fetcher reaching for ambient
/// process-wide state; tests substitute a recording implementation.
pub trait FetchObserver: Send + Sync {
    /// A `get_or_wait` call is starting for the given target.
    fn on_request(&self, target: &str);
    /// The fetcher is throttled and will sleep; called once per wait
    /// increment with the remaining time.
    fn on_wait(&self, remaining: Duration);
}

/// Default observer that reports through the tracing stack.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl FetchObserver for TracingObserver {
    fn on_request(&self, target: &str) {
        info!("getting: {}", target);
    }

    fn on_wait(&self, remaining: Duration) {
        info!("rate limit reached - waiting for {}", format_wait(remaining));
    }
}

fn format_wait(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    format!("{} minute(s) and {} second(s)", secs / 60, secs % 60)
}

fn request_target(url: &str, query: &[(String, String)]) -> String {
    if query.is_empty() {
        return url.to_string();
    }
    let pairs: Vec<String> = query.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!("{}?{}", url, pairs.join("&"))
}

/// Issues GET requests one at a time against an hourly quota.
///
/// Owns its [`QuotaTracker`] exclusively; `get_or_wait` takes `&mut self`,
/// so a fetcher serves exactly one sequential caller. Concurrent callers
/// must each own an independent fetcher.
pub struct RateLimitedFetcher {
    client: Client,
    quota: QuotaTracker,
    observer: Box<dyn FetchObserver>,
}

impl RateLimitedFetcher {
    /// Create a fetcher with the given per-hour ceiling, logging through tracing.
    pub fn new(client: Client, requests_per_hour: u32) -> Self {
        Self::with_observer(client, requests_per_hour, Box::new(TracingObserver))
    }

    /// Create a fetcher with an explicit observer sink.
    pub fn with_observer(
        client: Client,
        requests_per_hour: u32,
        observer: Box<dyn FetchObserver>,
    ) -> Self {
        Self {
            client,
            quota: QuotaTracker::new(requests_per_hour),
            observer,
        }
    }

    /// Fetch the URL, waiting out any throttling until a real response arrives.
    ///
    /// Blocks (awaits) through local quota exhaustion and remote 429s,
    /// retrying after the relevant deadline; the returned result is never
    /// throttled. Transport failures and malformed bodies are returned
    /// immediately without entering the wait loop.
    pub async fn get_or_wait(
        &mut self,
        url: &str,
        query: &[(String, String)],
        headers: HeaderMap,
    ) -> Result<FetchResult, FetchError> {
        self.observer.on_request(&request_target(url, query));
        loop {
            let attempt = self.send_once(url, query, headers.clone()).await?;
            if attempt.throttled {
                let deadline = attempt.retry_after.unwrap_or_else(Instant::now);
                self.wait_until(deadline).await;
                continue;
            }
            return Ok(attempt);
        }
    }

    /// One attempt: quota check, then at most one request on the wire.
    async fn send_once(
        &mut self,
        url: &str,
        query: &[(String, String)],
        headers: HeaderMap,
    ) -> Result<FetchResult, FetchError> {
        if !self.quota.try_reserve_slot() {
            let reset = self.quota.reset_at().unwrap_or_else(Instant::now);
            debug!("local quota exhausted, deferring request");
            return Ok(FetchResult::throttled(reset));
        }

        let response = self
            .client
            .get(url)
            .query(query)
            .headers(headers)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let until = self.quota.force_cooldown(REMOTE_COOLDOWN);
            debug!(
                "server signaled throttling, cooling down for {:?}",
                REMOTE_COOLDOWN
            );
            return Ok(FetchResult::throttled(until));
        }

        let text = response.text().await?;
        let body = if text.is_empty() {
            None
        } else {
            Some(
                serde_json::from_str(&text).map_err(|source| FetchError::Body {
                    status: status.as_u16(),
                    source,
                })?,
            )
        };

        Ok(FetchResult::completed(status.as_u16(), body))
    }

    /// Sleep in fixed increments until the deadline passes, reporting the
    /// remaining wait each time.
    ///
    /// Kept as its own primitive so cancellation (or a non-blocking variant)
    /// can be added without touching the `get_or_wait` contract.
    async fn wait_until(&self, deadline: Instant) {
        loop {
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            let remaining = deadline - now;
            self.observer.on_wait(remaining);
            tokio::time::sleep(remaining.min(WAIT_INCREMENT)).await;
        }
    }
}
