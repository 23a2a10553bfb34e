use super::{page_query, ApiClient};
use crate::model::Video;
use crate::port::{FetchError, FetchPort, PageRequest};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VideoChannel {
    All,
    /// Videos about any of these entities (tickers, people, projects).
    Entity(Vec<String>),
}

impl VideoChannel {
    fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            VideoChannel::All => Vec::new(),
            VideoChannel::Entity(entities) if entities.is_empty() => Vec::new(),
            VideoChannel::Entity(entities) => vec![("entity", entities.join(","))],
        }
    }
}

/// Paged video list.
#[derive(Debug, Clone)]
pub struct VideoFeed {
    client: Arc<ApiClient>,
}

impl VideoFeed {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }
}

impl FetchPort for VideoFeed {
    type Key = VideoChannel;
    type Item = Video;

    async fn fetch_page(
        &self,
        key: &VideoChannel,
        request: PageRequest,
    ) -> Result<Vec<Video>, FetchError> {
        let mut query = key.params();
        query.extend(page_query(request));
        let videos: Option<Vec<Video>> = self
            .client
            .get_data("/videos", &query, request.force_refresh)
            .await?;
        Ok(videos.unwrap_or_default())
    }
}
