//! Paginated search driver.
//!
//! Walks the search endpoint page by page, following the `meta.next_token`
//! continuation marker and writing each page to the output directory as
//! `data_file_<page>.json`.

use std::path::PathBuf;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::fetcher::{FetchError, RateLimitedFetcher};

/// A pagination run that could not complete.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The service answered with a non-200 status; throttling never reaches
    /// here, so this is an application-level rejection.
    #[error("error getting result set: {status}: {body}")]
    BadStatus { status: u16, body: String },

    #[error("failed to create output directory '{path}': {source}")]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write page {page} to '{path}': {source}")]
    Write {
        page: u64,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("bearer token is not a valid header value")]
    InvalidToken,
}

/// Drives one full pagination sweep through the search endpoint.
pub struct SearchJob {
    fetcher: RateLimitedFetcher,
    search_url: String,
    params: Vec<(String, String)>,
    headers: HeaderMap,
    output_dir: PathBuf,
}

impl SearchJob {
    /// Build a job from a ready fetcher and bearer token.
    pub fn new(
        fetcher: RateLimitedFetcher,
        search_url: String,
        params: Vec<(String, String)>,
        bearer_token: &str,
        output_dir: PathBuf,
    ) -> Result<Self, SearchError> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Bearer {}", bearer_token))
            .map_err(|_| SearchError::InvalidToken)?;
        headers.insert(AUTHORIZATION, value);

        Ok(Self {
            fetcher,
            search_url,
            params,
            headers,
            output_dir,
        })
    }

    /// Fetch and persist pages until the service stops returning a
    /// continuation token. Returns the number of pages written.
    pub async fn run(&mut self) -> Result<u64, SearchError> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|source| SearchError::OutputDir {
                path: self.output_dir.clone(),
                source,
            })?;

        let mut page: u64 = 1;
        let mut next_token: Option<String> = None;
        loop {
            info!("Getting page number {}", page);
            let body = self.fetch_page(next_token.as_deref()).await?;
            info!("Got page number {} response, writing...", page);

            self.write_page(page, &body).await?;
            info!("Data file written for page {}", page);

            match continuation_token(&body) {
                Some(token) => {
                    next_token = Some(token);
                    page += 1;
                }
                None => return Ok(page),
            }
        }
    }

    /// One page: the configured parameters plus the continuation token.
    async fn fetch_page(&mut self, next_token: Option<&str>) -> Result<Value, SearchError> {
        let mut params = self.params.clone();
        if let Some(token) = next_token {
            params.push(("next_token".to_string(), token.to_string()));
        }

        let result = self
            .fetcher
            .get_or_wait(&self.search_url, &params, self.headers.clone())
            .await?;

        if result.status != 200 {
            let body = result.body.map(|b| b.to_string()).unwrap_or_default();
            return Err(SearchError::BadStatus {
                status: result.status,
                body,
            });
        }

        Ok(result.body.unwrap_or(Value::Null))
    }

    async fn write_page(&self, page: u64, body: &Value) -> Result<(), SearchError> {
        let path = self.output_dir.join(format!("data_file_{}.json", page));
        let rendered = body.to_string();
        tokio::fs::write(&path, rendered)
            .await
            .map_err(|source| SearchError::Write {
                page,
                path: path.clone(),
                source,
            })
    }
}

/// Extract `meta.next_token` from a page body, if present.
fn continuation_token(body: &Value) -> Option<String> {
    body.get("meta")?
        .get("next_token")?
        .as_str()
        .map(str::to_string)
}
