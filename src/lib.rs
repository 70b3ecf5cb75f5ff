//! TweetVault - rate-limited full-archive search acquisition.
//!
//! Paginates a search API that enforces an hourly request quota, writing
//! each result page to disk as JSON. The interesting surface is the
//! rate-limited fetch core: [`rate_limit::QuotaTracker`] answers "may I send
//! a request right now?", and [`fetcher::RateLimitedFetcher`] absorbs both
//! local quota exhaustion and server-signaled throttling behind a single
//! `get_or_wait` call, so callers only ever see real responses.

pub mod auth;
pub mod cli;
pub mod config;
pub mod fetcher;
pub mod rate_limit;
pub mod search;
