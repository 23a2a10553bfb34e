//! Multi-source screens that load several feeds at once.
//!
//! The home screen needs the first news page, the first video page and the
//! highlights bundle. They are fetched concurrently and joined once; a failed
//! source leaves its section empty and adds a message to
//! [`HomeSnapshot::failures`] instead of failing the whole screen.

use crate::config::Config;
use crate::feed::dedup_by_id;
use crate::model::{Highlights, MentionTicker, NewsArticle, Video};
use crate::port::{FetchError, FetchPort, PageRequest};
use futures::stream::{self, StreamExt};
use std::future::Future;

/// Maximum concurrent requests for [`load_merged`].
const MAX_CONCURRENT_FETCHES: usize = 6;

/// Non-paged source of the home screen's highlights bundle.
pub trait HighlightSource: Send + Sync {
    fn fetch_highlights(
        &self,
        force_refresh: bool,
    ) -> impl Future<Output = Result<Highlights, FetchError>> + Send;
}

/// Section sizes of the home screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HomeLayout {
    pub news_count: usize,
    pub video_count: usize,
    pub page_limit: u32,
}

impl Default for HomeLayout {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl HomeLayout {
    pub fn from_config(config: &Config) -> Self {
        Self {
            news_count: config.home_news_count,
            video_count: config.home_video_count,
            page_limit: config.page_limit,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HomeSnapshot {
    pub headlines: Vec<NewsArticle>,
    pub news: Vec<NewsArticle>,
    pub top_mentions: Vec<MentionTicker>,
    pub videos: Vec<Video>,
    /// One message per source that failed.
    pub failures: Vec<String>,
}

impl HomeSnapshot {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Load every home section concurrently.
pub async fn load_home<N, V, H>(
    news: &N,
    news_key: &N::Key,
    videos: &V,
    video_key: &V::Key,
    highlights: &H,
    layout: HomeLayout,
    force_refresh: bool,
) -> HomeSnapshot
where
    N: FetchPort<Item = NewsArticle>,
    V: FetchPort<Item = Video>,
    H: HighlightSource,
{
    let mut request = PageRequest::new(1, layout.page_limit);
    if force_refresh {
        request = request.forced();
    }

    let (news_result, video_result, highlight_result) = tokio::join!(
        news.fetch_page(news_key, request),
        videos.fetch_page(video_key, request),
        highlights.fetch_highlights(force_refresh),
    );

    let mut snapshot = HomeSnapshot::default();

    match news_result {
        Ok(items) => {
            snapshot.news = dedup_by_id(items);
            snapshot.news.truncate(layout.news_count);
        }
        Err(e) => {
            tracing::warn!(error = %e, "Home news section failed");
            snapshot.failures.push(format!("news: {e}"));
        }
    }

    match video_result {
        Ok(items) => {
            snapshot.videos = dedup_by_id(items);
            snapshot.videos.truncate(layout.video_count);
        }
        Err(e) => {
            tracing::warn!(error = %e, "Home video section failed");
            snapshot.failures.push(format!("videos: {e}"));
        }
    }

    match highlight_result {
        Ok(bundle) => {
            snapshot.headlines = dedup_by_id(bundle.headlines.unwrap_or_default());
            snapshot.top_mentions = dedup_by_id(bundle.top_mention.unwrap_or_default());
        }
        Err(e) => {
            tracing::warn!(error = %e, "Home highlights failed");
            snapshot.failures.push(format!("highlights: {e}"));
        }
    }

    tracing::info!(
        news = snapshot.news.len(),
        videos = snapshot.videos.len(),
        headlines = snapshot.headlines.len(),
        failures = snapshot.failures.len(),
        "Home loaded"
    );
    snapshot
}

/// Fetch one page for each key and merge the results, first seen wins.
///
/// Used for lists built from several sub-feeds, such as news for every
/// watched ticker. Results are merged in key order regardless of which
/// request finishes first. Failed keys are reported as `(key, error)`.
pub async fn load_merged<P>(
    port: &P,
    keys: Vec<P::Key>,
    request: PageRequest,
) -> (Vec<P::Item>, Vec<(P::Key, FetchError)>)
where
    P: FetchPort,
{
    let mut results: Vec<(usize, P::Key, Result<Vec<P::Item>, FetchError>)> =
        stream::iter(keys.into_iter().enumerate())
            .map(|(idx, key)| async move {
                let result = port.fetch_page(&key, request).await;
                (idx, key, result)
            })
            .buffer_unordered(MAX_CONCURRENT_FETCHES)
            .collect()
            .await;
    results.sort_by_key(|(idx, _, _)| *idx);

    let mut pages = Vec::new();
    let mut failures = Vec::new();
    for (_, key, result) in results {
        match result {
            Ok(items) => pages.push(items),
            Err(e) => {
                tracing::warn!(key = ?key, error = %e, "Sub-feed fetch failed");
                failures.push((key, e));
            }
        }
    }

    (dedup_by_id(pages.into_iter().flatten()), failures)
}
