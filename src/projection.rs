//! Display projections over aggregated lists.
//!
//! Everything here is a pure function of a borrowed list and a selector
//! value. Nothing mutates or reorders the aggregated state itself; callers
//! get a new sequence of references.

use crate::model::{MentionTicker, NewsArticle, Sentiment, SentimentPoint};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Sentiment/topic subset of a news list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NewsFilter {
    All,
    Positive,
    Negative,
    Neutral,
    /// Articles tagged with this topic (case-insensitive).
    Topic(String),
}

impl NewsFilter {
    pub fn matches(&self, article: &NewsArticle) -> bool {
        match self {
            NewsFilter::All => true,
            NewsFilter::Positive => article.sentiment == Some(Sentiment::Positive),
            NewsFilter::Negative => article.sentiment == Some(Sentiment::Negative),
            NewsFilter::Neutral => article.sentiment == Some(Sentiment::Neutral),
            NewsFilter::Topic(topic) => article.has_topic(topic),
        }
    }

    pub fn label(&self) -> String {
        match self {
            NewsFilter::All => "All".to_string(),
            NewsFilter::Positive => "Positive".to_string(),
            NewsFilter::Negative => "Negative".to_string(),
            NewsFilter::Neutral => "Neutral".to_string(),
            NewsFilter::Topic(topic) => capitalize(topic),
        }
    }
}

impl FromStr for NewsFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(NewsFilter::All),
            "positive" => Ok(NewsFilter::Positive),
            "negative" => Ok(NewsFilter::Negative),
            "neutral" => Ok(NewsFilter::Neutral),
            other => match other.strip_prefix("topic:") {
                Some(topic) if !topic.trim().is_empty() => {
                    Ok(NewsFilter::Topic(topic.trim().to_string()))
                }
                _ => Err(format!(
                    "unknown filter '{s}' (expected all, positive, negative, neutral or topic:<name>)"
                )),
            },
        }
    }
}

impl fmt::Display for NewsFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Subset of `news` matching `filter`, in list order.
pub fn filter_news<'a>(news: &'a [NewsArticle], filter: &NewsFilter) -> Vec<&'a NewsArticle> {
    news.iter().filter(|article| filter.matches(article)).collect()
}

/// Ordering/selection of a ticker mention list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TickerSort {
    /// Every ticker, most mentioned first.
    #[default]
    TopMentions,
    /// Positively scored tickers, highest score first.
    PositiveMentions,
    /// Negatively scored tickers, lowest score first.
    NegativeMentions,
}

impl TickerSort {
    pub const ALL: [TickerSort; 3] = [
        TickerSort::TopMentions,
        TickerSort::PositiveMentions,
        TickerSort::NegativeMentions,
    ];

    pub fn label(self) -> &'static str {
        match self {
            TickerSort::TopMentions => "Top Mentions",
            TickerSort::PositiveMentions => "Positive Mentions",
            TickerSort::NegativeMentions => "Negative Mentions",
        }
    }

    fn includes(self, ticker: &MentionTicker) -> bool {
        match self {
            TickerSort::TopMentions => true,
            TickerSort::PositiveMentions => ticker.sentiment_score > 0.0,
            TickerSort::NegativeMentions => ticker.sentiment_score < 0.0,
        }
    }

    fn compare(self, a: &MentionTicker, b: &MentionTicker) -> Ordering {
        match self {
            TickerSort::TopMentions => b.total_mentions.cmp(&a.total_mentions),
            TickerSort::PositiveMentions => b.sentiment_score.total_cmp(&a.sentiment_score),
            TickerSort::NegativeMentions => a.sentiment_score.total_cmp(&b.sentiment_score),
        }
    }
}

impl FromStr for TickerSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "top" => Ok(TickerSort::TopMentions),
            "positive" => Ok(TickerSort::PositiveMentions),
            "negative" => Ok(TickerSort::NegativeMentions),
            _ => Err(format!(
                "unknown sort '{s}' (expected top, positive or negative)"
            )),
        }
    }
}

/// Filter and order `tickers` for `sort`. The sort is stable, so ties keep
/// list order.
pub fn rank_tickers(tickers: &[MentionTicker], sort: TickerSort) -> Vec<&MentionTicker> {
    let mut ranked: Vec<&MentionTicker> = tickers.iter().filter(|t| sort.includes(t)).collect();
    ranked.sort_by(|a, b| sort.compare(a, b));
    ranked
}

/// At most the first `n` items, for carousel-style sections.
pub fn first_n<T>(items: &[T], n: usize) -> &[T] {
    &items[..items.len().min(n)]
}

/// The `n` most recent timeline points, oldest first.
pub fn latest_timeline(points: &[SentimentPoint], n: usize) -> Vec<&SentimentPoint> {
    let mut sorted: Vec<&SentimentPoint> = points.iter().collect();
    sorted.sort_by_key(|p| p.date);
    let skip = sorted.len().saturating_sub(n);
    sorted.split_off(skip)
}

/// A row descriptor for list rendering: the article plus its position flags
/// (used for rounded first/last cards).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewsRow<'a> {
    pub article: &'a NewsArticle,
    pub is_first: bool,
    pub is_last: bool,
}

pub fn news_rows<'a>(articles: &[&'a NewsArticle]) -> Vec<NewsRow<'a>> {
    let last = articles.len().saturating_sub(1);
    articles
        .iter()
        .copied()
        .enumerate()
        .map(|(idx, article)| NewsRow {
            article,
            is_first: idx == 0,
            is_last: idx == last,
        })
        .collect()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
