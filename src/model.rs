//! Domain records carried by the feeds.
//!
//! Every record that can appear in a paged feed implements [`FeedItem`],
//! which names the stable identity used for deduplication. Two records with
//! the same id are the same item even when their other fields differ (a
//! re-scored article, a ticker whose mention counts moved between pages).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::Debug;
use std::hash::Hash;

/// An identifiable record that can be merged into an aggregated feed.
pub trait FeedItem: Clone + Debug + Send + Sync + 'static {
    /// Stable identity type (article id, ticker symbol, video id).
    type Id: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    /// The stable key used for deduplication.
    fn id(&self) -> &Self::Id;
}

// ============================================================================
// Sentiment
// ============================================================================

/// Sentiment classification attached to news articles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }
}

/// The backend spells "positive" as "positve" in older payloads.
impl<'de> Deserialize<'de> for Sentiment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.to_ascii_lowercase().as_str() {
            "positive" | "positve" => Ok(Sentiment::Positive),
            "negative" => Ok(Sentiment::Negative),
            "neutral" => Ok(Sentiment::Neutral),
            other => Err(serde::de::Error::unknown_variant(
                other,
                &["positive", "negative", "neutral"],
            )),
        }
    }
}

// ============================================================================
// News
// ============================================================================

/// A news article as returned by the news endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub published: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sentiment: Option<Sentiment>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub tickers: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

impl NewsArticle {
    /// Minimal article with only identity and title set.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: None,
            source: None,
            published: None,
            sentiment: None,
            topics: Vec::new(),
            tickers: Vec::new(),
            summary: None,
        }
    }

    pub fn with_sentiment(mut self, sentiment: Sentiment) -> Self {
        self.sentiment = Some(sentiment);
        self
    }

    pub fn with_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics = topics.into_iter().map(Into::into).collect();
        self
    }

    /// Case-insensitive topic membership.
    pub fn has_topic(&self, topic: &str) -> bool {
        self.topics.iter().any(|t| t.eq_ignore_ascii_case(topic))
    }
}

impl FeedItem for NewsArticle {
    type Id = String;

    fn id(&self) -> &String {
        &self.id
    }
}

// ============================================================================
// Ticker mentions
// ============================================================================

/// Social mention statistics for one ticker symbol. The backend uses
/// camelCase keys (`sentimentScore`, `totalMentions`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MentionTicker {
    pub ticker: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sentiment_score: f64,
    #[serde(default)]
    pub total_mentions: u64,
    #[serde(default)]
    pub positive_mentions: u64,
    #[serde(default)]
    pub neutral_mentions: u64,
    #[serde(default)]
    pub negative_mentions: u64,
}

impl MentionTicker {
    pub fn new(ticker: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            name: name.into(),
            sentiment_score: 0.0,
            total_mentions: 0,
            positive_mentions: 0,
            neutral_mentions: 0,
            negative_mentions: 0,
        }
    }
}

impl FeedItem for MentionTicker {
    type Id = String;

    fn id(&self) -> &String {
        &self.ticker
    }
}

// ============================================================================
// Videos
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub published: Option<DateTime<Utc>>,
}

impl FeedItem for Video {
    type Id = String;

    fn id(&self) -> &String {
        &self.id
    }
}

// ============================================================================
// Sentiment timeline and highlights
// ============================================================================

/// One day of a ticker's sentiment timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentPoint {
    pub date: NaiveDate,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub positive: u64,
    #[serde(default)]
    pub neutral: u64,
    #[serde(default)]
    pub negative: u64,
}

/// Curated home-screen payload. Every section is optional in the backend
/// response; a missing section is simply not shown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlights {
    #[serde(default)]
    pub news: Option<Vec<NewsArticle>>,
    #[serde(default)]
    pub headlines: Option<Vec<NewsArticle>>,
    #[serde(default)]
    pub top_mention: Option<Vec<MentionTicker>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentiment_accepts_backend_misspelling() {
        let s: Sentiment = serde_json::from_str("\"positve\"").unwrap();
        assert_eq!(s, Sentiment::Positive);
        let s: Sentiment = serde_json::from_str("\"Negative\"").unwrap();
        assert_eq!(s, Sentiment::Negative);
    }

    #[test]
    fn test_sentiment_rejects_unknown() {
        let result: Result<Sentiment, _> = serde_json::from_str("\"bullish\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_news_article_minimal_payload() {
        let json = r#"{"id": "n1", "title": "BTC breaks out"}"#;
        let article: NewsArticle = serde_json::from_str(json).unwrap();
        assert_eq!(article.id(), "n1");
        assert!(article.sentiment.is_none());
        assert!(article.topics.is_empty());
    }

    #[test]
    fn test_news_article_full_payload() {
        let json = r#"{
            "id": "n2",
            "title": "Libra delayed",
            "url": "https://example.com/libra",
            "source": "CoinDesk",
            "published": "2024-05-15T10:00:00Z",
            "sentiment": "negative",
            "topics": ["Libra", "regulation"],
            "tickers": ["META"]
        }"#;
        let article: NewsArticle = serde_json::from_str(json).unwrap();
        assert_eq!(article.sentiment, Some(Sentiment::Negative));
        assert!(article.has_topic("libra"));
        assert!(!article.has_topic("defi"));
        assert!(article.published.is_some());
    }

    #[test]
    fn test_ticker_identity_is_symbol() {
        let mut a = MentionTicker::new("BTC", "Bitcoin");
        let b = MentionTicker::new("BTC", "Bitcoin");
        a.total_mentions = 42;
        assert_ne!(a, b);
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn test_ticker_camel_case_payload() {
        let json = r#"{"ticker": "SOL", "name": "Solana", "sentimentScore": -0.25, "totalMentions": 9}"#;
        let t: MentionTicker = serde_json::from_str(json).unwrap();
        assert_eq!(t.sentiment_score, -0.25);
        assert_eq!(t.total_mentions, 9);
        assert_eq!(t.negative_mentions, 0);
    }

    #[test]
    fn test_highlights_missing_sections() {
        let h: Highlights = serde_json::from_str("{}").unwrap();
        assert!(h.news.is_none());
        assert!(h.top_mention.is_none());
    }
}
