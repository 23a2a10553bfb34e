use super::{page_query, ApiClient};
use crate::model::MentionTicker;
use crate::port::{FetchError, FetchPort, PageRequest};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TickerList {
    /// Every tracked ticker.
    All,
    /// Tickers ordered by mention count over the last day.
    TopMentions,
}

impl TickerList {
    fn path(self) -> &'static str {
        match self {
            TickerList::All => "/tickers",
            TickerList::TopMentions => "/tickers/mentions",
        }
    }
}

impl fmt::Display for TickerList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TickerList::All => f.write_str("all tickers"),
            TickerList::TopMentions => f.write_str("top mentions"),
        }
    }
}

/// Paged ticker mention statistics.
#[derive(Debug, Clone)]
pub struct TickerFeed {
    client: Arc<ApiClient>,
}

impl TickerFeed {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }
}

impl FetchPort for TickerFeed {
    type Key = TickerList;
    type Item = MentionTicker;

    async fn fetch_page(
        &self,
        key: &TickerList,
        request: PageRequest,
    ) -> Result<Vec<MentionTicker>, FetchError> {
        let tickers: Option<Vec<MentionTicker>> = self
            .client
            .get_data(key.path(), &page_query(request), request.force_refresh)
            .await?;
        Ok(tickers.unwrap_or_default())
    }
}
