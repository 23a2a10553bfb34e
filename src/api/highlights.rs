use super::ApiClient;
use crate::home::HighlightSource;
use crate::model::Highlights;
use crate::port::FetchError;
use std::sync::Arc;

/// The home screen's highlights bundle (not paged).
#[derive(Debug, Clone)]
pub struct HighlightsFeed {
    client: Arc<ApiClient>,
}

impl HighlightsFeed {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }
}

impl HighlightSource for HighlightsFeed {
    async fn fetch_highlights(&self, force_refresh: bool) -> Result<Highlights, FetchError> {
        let query = [("refresh", force_refresh.to_string())];
        let highlights: Option<Highlights> = self
            .client
            .get_data("/highlights", &query, force_refresh)
            .await?;
        Ok(highlights.unwrap_or_default())
    }
}
