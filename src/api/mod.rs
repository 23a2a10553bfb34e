//! HTTP implementations of [`FetchPort`](crate::port::FetchPort) for the
//! news backend.
//!
//! All ports share one [`ApiClient`], which owns the connection pool,
//! retry policy and response cache. Every paged route takes `page`, `limit`
//! and `refresh` query parameters; `refresh=true` also tells the backend's
//! own caching layer to recompute.

mod client;
mod highlights;
mod news;
mod tickers;
mod videos;

pub use client::ApiClient;
pub use highlights::HighlightsFeed;
pub use news::{NewsChannel, NewsFeed};
pub use tickers::{TickerFeed, TickerList};
pub use videos::{VideoChannel, VideoFeed};

use crate::port::PageRequest;
use crate::util::BaseUrlError;
use thiserror::Error;

/// Errors constructing an [`ApiClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    BaseUrl(#[from] BaseUrlError),
    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

pub(crate) fn page_query(request: PageRequest) -> Vec<(&'static str, String)> {
    vec![
        ("page", request.page.to_string()),
        ("limit", request.limit.to_string()),
        ("refresh", request.force_refresh.to_string()),
    ]
}
