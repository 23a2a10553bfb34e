//! The paged data source consumed by the feed aggregator.
//!
//! A [`FetchPort`] knows how to turn a filter key and a page request into a
//! list of items. It is the only boundary the aggregator has with the outside
//! world; the HTTP implementations live in [`crate::api`], tests use
//! in-memory ports.

use crate::model::FeedItem;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use thiserror::Error;

/// Default number of items requested per page.
pub const DEFAULT_PAGE_LIMIT: u32 = 10;

/// Errors a fetch port can report for a single page request.
///
/// These cover the full lifecycle of a request: transport problems, HTTP
/// errors, backend-reported failures and undecodable payloads.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body was not the expected JSON shape
    #[error("Decode error: {0}")]
    Decode(String),
    /// Backend answered with `success: false`
    #[error("API error: {0}")]
    Api(String),
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Source is not reachable for a non-transport reason (bad base URL, offline stub)
    #[error("Source unavailable: {0}")]
    Unavailable(String),
}

impl FetchError {
    /// Returns true if this error is transient and the request may be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::Network(_) | FetchError::RateLimited(_) => true,
            FetchError::HttpStatus(status) => *status >= 500 || *status == 429,
            FetchError::Decode(_)
            | FetchError::Api(_)
            | FetchError::ResponseTooLarge
            | FetchError::Unavailable(_) => false,
        }
    }
}

/// Parameters of one page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: u32,
    /// Upper bound on items returned.
    pub limit: u32,
    /// Hint that upstream caches must be bypassed.
    pub force_refresh: bool,
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page,
            limit,
            force_refresh: false,
        }
    }

    pub fn forced(mut self) -> Self {
        self.force_refresh = true;
        self
    }
}

/// A paged remote data source.
///
/// `Key` identifies the logical sub-feed (tab, topic, search query) and
/// carries whatever context the source needs to build its request.
pub trait FetchPort: Send + Sync + 'static {
    type Key: Clone + Eq + Hash + Debug + Send + Sync + 'static;
    type Item: FeedItem;

    fn fetch_page(
        &self,
        key: &Self::Key,
        request: PageRequest,
    ) -> impl Future<Output = Result<Vec<Self::Item>, FetchError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(FetchError::Timeout.is_retryable());
        assert!(FetchError::HttpStatus(503).is_retryable());
        assert!(FetchError::HttpStatus(429).is_retryable());
        assert!(!FetchError::HttpStatus(404).is_retryable());
        assert!(!FetchError::Api("bad ticker".into()).is_retryable());
        assert!(!FetchError::Decode("eof".into()).is_retryable());
    }

    #[test]
    fn test_page_request_forced() {
        let req = PageRequest::new(1, DEFAULT_PAGE_LIMIT);
        assert!(!req.force_refresh);
        let forced = req.forced();
        assert!(forced.force_refresh);
        assert_eq!(forced.page, 1);
        assert_eq!(forced.limit, 10);
    }
}
