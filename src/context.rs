//! Per-user session flags passed explicitly to whatever needs them.

use crate::api::NewsChannel;
use crate::feed::dedup_by_id;
use crate::model::MentionTicker;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    /// Signed-in user, if any.
    pub user_id: Option<String>,
    /// Pro subscription unlocks the extended ticker insights.
    pub pro: bool,
    /// Watched ticker symbols, upper case, in the order they were added.
    watching: Vec<String>,
}

impl SessionContext {
    pub fn new(user_id: Option<String>, pro: bool) -> Self {
        Self {
            user_id,
            pro,
            watching: Vec::new(),
        }
    }

    pub fn with_watching<I, S>(mut self, tickers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for ticker in tickers {
            let ticker = normalize(ticker.as_ref());
            if !ticker.is_empty() && !self.watching.contains(&ticker) {
                self.watching.push(ticker);
            }
        }
        self
    }

    pub fn watching(&self) -> &[String] {
        &self.watching
    }

    pub fn is_watching(&self, ticker: &str) -> bool {
        let ticker = normalize(ticker);
        self.watching.iter().any(|t| *t == ticker)
    }

    /// Add or remove `ticker`. Returns whether it is watched afterwards.
    pub fn toggle_watch(&mut self, ticker: &str) -> bool {
        let ticker = normalize(ticker);
        if ticker.is_empty() {
            return false;
        }
        if let Some(pos) = self.watching.iter().position(|t| *t == ticker) {
            self.watching.remove(pos);
            tracing::debug!(ticker = %ticker, "Removed from watchlist");
            false
        } else {
            tracing::debug!(ticker = %ticker, "Added to watchlist");
            self.watching.push(ticker);
            true
        }
    }

    /// The watchlist's ticker cards: watched tickers from `all`, each once,
    /// in the order the backend listed them.
    pub fn watchlist(&self, all: &[MentionTicker]) -> Vec<MentionTicker> {
        dedup_by_id(
            all.iter()
                .filter(|t| self.is_watching(&t.ticker))
                .cloned(),
        )
    }

    /// One news channel per watched ticker, for a merged watchlist feed.
    pub fn news_channels(&self) -> Vec<NewsChannel> {
        self.watching
            .iter()
            .map(|ticker| NewsChannel::Ticker {
                ticker: ticker.clone(),
                date: None,
            })
            .collect()
    }
}

fn normalize(ticker: &str) -> String {
    ticker.trim().to_ascii_uppercase()
}
