use super::{page_query, ApiClient};
use crate::model::NewsArticle;
use crate::port::{FetchError, FetchPort, PageRequest};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Which news list a [`NewsFeed`] key pages through.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NewsChannel {
    /// Latest general crypto news.
    General,
    /// News ranked by engagement.
    Ranked,
    /// Articles the backend tagged with a topic.
    Topic(String),
    /// Free-text search.
    Search { query: String },
    /// News mentioning one ticker, optionally on a single day (`YYYY-MM-DD`).
    Ticker { ticker: String, date: Option<String> },
}

impl NewsChannel {
    fn route(&self) -> (&'static str, Vec<(&'static str, String)>) {
        match self {
            NewsChannel::General => ("/news/general", Vec::new()),
            NewsChannel::Ranked => ("/news/ranked", Vec::new()),
            NewsChannel::Topic(topic) => ("/news/search", vec![("topic", topic.clone())]),
            NewsChannel::Search { query } => ("/news/search", vec![("query", query.clone())]),
            NewsChannel::Ticker { ticker, date } => {
                let mut params = vec![("ticker", ticker.clone())];
                if let Some(date) = date {
                    params.push(("date", date.clone()));
                }
                ("/news/ticker", params)
            }
        }
    }
}

impl FromStr for NewsChannel {
    type Err = String;

    /// Parses `general`, `ranked`, `topic:<t>`, `search:<q>` or
    /// `ticker:<SYM>[@<date>]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "general" => return Ok(NewsChannel::General),
            "ranked" | "top" => return Ok(NewsChannel::Ranked),
            _ => {}
        }

        let Some((kind, value)) = s.split_once(':') else {
            return Err(format!("unknown channel '{s}'"));
        };
        let value = value.trim();
        if value.is_empty() {
            return Err(format!("channel '{kind}' needs a value"));
        }

        match kind.to_ascii_lowercase().as_str() {
            "topic" => Ok(NewsChannel::Topic(value.to_string())),
            "search" => Ok(NewsChannel::Search {
                query: value.to_string(),
            }),
            "ticker" => {
                let (ticker, date) = match value.split_once('@') {
                    Some((t, d)) => (t, Some(d.trim().to_string())),
                    None => (value, None),
                };
                Ok(NewsChannel::Ticker {
                    ticker: ticker.trim().to_ascii_uppercase(),
                    date,
                })
            }
            _ => Err(format!(
                "unknown channel '{s}' (expected general, ranked, topic:<t>, search:<q> or ticker:<sym>)"
            )),
        }
    }
}

impl fmt::Display for NewsChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NewsChannel::General => f.write_str("general"),
            NewsChannel::Ranked => f.write_str("ranked"),
            NewsChannel::Topic(topic) => write!(f, "topic:{topic}"),
            NewsChannel::Search { query } => write!(f, "search:{query}"),
            NewsChannel::Ticker { ticker, date: None } => write!(f, "ticker:{ticker}"),
            NewsChannel::Ticker {
                ticker,
                date: Some(date),
            } => write!(f, "ticker:{ticker}@{date}"),
        }
    }
}

/// Paged news articles.
#[derive(Debug, Clone)]
pub struct NewsFeed {
    client: Arc<ApiClient>,
}

impl NewsFeed {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }
}

impl FetchPort for NewsFeed {
    type Key = NewsChannel;
    type Item = NewsArticle;

    async fn fetch_page(
        &self,
        key: &NewsChannel,
        request: PageRequest,
    ) -> Result<Vec<NewsArticle>, FetchError> {
        let (path, mut query) = key.route();
        query.extend(page_query(request));
        let articles: Option<Vec<NewsArticle>> = self
            .client
            .get_data(path, &query, request.force_refresh)
            .await?;
        Ok(articles.unwrap_or_default())
    }
}
