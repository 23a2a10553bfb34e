use crate::config::Config;
use crate::port::FetchError;
use crate::util::validate_base_url;
use futures::StreamExt;
use lru::LruCache;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use url::Url;

use super::ClientError;

const MAX_RESPONSE_SIZE: usize = 5 * 1024 * 1024; // 5MB
const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Response wrapper used by every backend endpoint.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    success: Option<bool>,
    err: Option<String>,
}

/// HTTP client for the news backend.
///
/// Shared by all ports (wrap it in an `Arc`). Handles authentication,
/// timeouts, retries with exponential backoff, a response size cap and an
/// in-memory response cache that `force_refresh` requests bypass.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<SecretString>,
    timeout: Duration,
    max_retries: u32,
    retry_base_delay: Duration,
    cache: Option<Mutex<LruCache<String, Arc<[u8]>>>>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl ApiClient {
    /// Client with default timeout, retries and cache for `base_url`.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let defaults = Config::default();
        Self::build(base_url, None, &defaults)
    }

    pub fn from_config(config: &Config) -> Result<Self, ClientError> {
        Self::build(
            &config.api_base_url,
            config.bearer_token().map(SecretString::from),
            config,
        )
    }

    fn build(
        base_url: &str,
        authorization: Option<SecretString>,
        config: &Config,
    ) -> Result<Self, ClientError> {
        let base_url = validate_base_url(base_url)?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("tickerfeed/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let cache = NonZeroUsize::new(config.cache_capacity).map(|cap| Mutex::new(LruCache::new(cap)));

        Ok(Self {
            http,
            base_url,
            api_key: authorization,
            timeout: Duration::from_secs(config.request_timeout_secs),
            max_retries: config.max_retries,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            cache,
        })
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// First backoff delay; later retries double it.
    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Url {
        let mut url = self.base_url.clone();
        let joined = format!("{}{}", self.base_url.path().trim_end_matches('/'), path);
        url.set_path(&joined);
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        url
    }

    /// GET `path` and decode the envelope's `data`.
    ///
    /// `Ok(None)` means the backend answered successfully without data.
    pub(crate) async fn get_data<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        force_refresh: bool,
    ) -> Result<Option<T>, FetchError> {
        let url = self.endpoint(path, query);
        // The refresh flag must not split the cache: a forced fetch overwrites
        // the entry plain requests read.
        let cacheable: Vec<(&str, String)> = query
            .iter()
            .filter(|(name, _)| *name != "refresh")
            .cloned()
            .collect();
        let cache_key = self.endpoint(path, &cacheable).to_string();

        if !force_refresh {
            if let Some(body) = self.cached(&cache_key) {
                tracing::debug!(url = %cache_key, "Response cache hit");
                return decode::<T>(&body);
            }
        }

        let body: Arc<[u8]> = self.fetch_with_retry(url).await?.into();
        let data = decode::<T>(&body)?;
        self.store(cache_key, body);
        Ok(data)
    }

    fn cached(&self, key: &str) -> Option<Arc<[u8]>> {
        let cache = self.cache.as_ref()?;
        let mut cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.get(key).cloned()
    }

    fn store(&self, key: String, body: Arc<[u8]>) {
        if let Some(cache) = &self.cache {
            cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .put(key, body);
        }
    }

    async fn fetch_with_retry(&self, url: Url) -> Result<Vec<u8>, FetchError> {
        let mut retry_count = 0;

        loop {
            match self.fetch_once(&url).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() && retry_count < self.max_retries => {
                    let delay = self.retry_base_delay * (1u32 << retry_count.min(16));
                    tracing::warn!(
                        url = %url,
                        error = %e,
                        retry = retry_count + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Transient API error, retrying after delay"
                    );
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                Err(FetchError::HttpStatus(429)) => {
                    return Err(FetchError::RateLimited(self.max_retries));
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let mut request = self.http.get(url.clone());
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", key.expose_secret());
        }

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(FetchError::Network)?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        read_limited_bytes(response, MAX_RESPONSE_SIZE).await
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<Option<T>, FetchError> {
    let envelope: Envelope<T> =
        serde_json::from_slice(body).map_err(|e| FetchError::Decode(e.to_string()))?;
    if envelope.success == Some(false) {
        return Err(FetchError::Api(
            envelope
                .err
                .unwrap_or_else(|| "request was not successful".to_string()),
        ));
    }
    Ok(envelope.data)
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewsArticle;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_client(uri: &str) -> ApiClient {
        ApiClient::new(uri)
            .unwrap()
            .with_retry_base_delay(Duration::from_millis(5))
    }

    #[test]
    fn test_endpoint_joins_path_and_query() {
        let client = ApiClient::new("https://api.example.com/v1/").unwrap();
        let url = client.endpoint("/news/general", &[("page", "2".into()), ("limit", "10".into())]);
        assert_eq!(url.as_str(), "https://api.example.com/v1/news/general?page=2&limit=10");
    }

    #[test]
    fn test_insecure_base_rejected() {
        assert!(matches!(
            ApiClient::new("http://api.example.com"),
            Err(ClientError::BaseUrl(_))
        ));
    }

    #[test]
    fn test_decode_envelope_variants() {
        let ok: Option<Vec<NewsArticle>> =
            decode(br#"{"data": [{"id": "1", "title": "t"}], "success": true}"#).unwrap();
        assert_eq!(ok.unwrap().len(), 1);

        let empty: Option<Vec<NewsArticle>> = decode(br#"{"data": null, "success": true}"#).unwrap();
        assert!(empty.is_none());

        let err = decode::<Vec<NewsArticle>>(br#"{"data": null, "success": false, "err": "quota"}"#)
            .unwrap_err();
        assert!(matches!(err, FetchError::Api(ref m) if m == "quota"));

        let garbage = decode::<Vec<NewsArticle>>(b"<html>").unwrap_err();
        assert!(matches!(garbage, FetchError::Decode(_)));
    }

    #[test]
    fn test_debug_masks_key() {
        let mut config = Config::parse("api_key = \"hunter2\"\n").unwrap();
        config.api_base_url = "https://api.example.com".into();
        let client = ApiClient::from_config(&config).unwrap();
        let debug = format!("{:?}", client);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn test_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/news/general"))
            .and(header("Authorization", "Bearer k-123"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"data": [], "success": true}"#))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = Config::parse("api_key = \"k-123\"\n").unwrap();
        config.api_base_url = server.uri();
        let client = ApiClient::from_config(&config).unwrap();

        let data: Option<Vec<NewsArticle>> = client.get_data("/news/general", &[], false).await.unwrap();
        assert_eq!(data.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_cache_hit_and_force_refresh_bypass() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/news/general"))
            .and(query_param("page", "1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"data": [{"id": "a", "title": "A"}], "success": true}"#),
            )
            .expect(2)
            .mount(&server)
            .await;

        let client = fast_client(&server.uri());
        let query = [("page", "1".to_string())];

        let first: Option<Vec<NewsArticle>> = client.get_data("/news/general", &query, false).await.unwrap();
        let cached: Option<Vec<NewsArticle>> = client.get_data("/news/general", &query, false).await.unwrap();
        let forced: Option<Vec<NewsArticle>> = client.get_data("/news/general", &query, true).await.unwrap();

        assert_eq!(first, cached);
        assert_eq!(forced.unwrap()[0].id, "a");
        // MockServer verifies exactly two requests reached it on drop
    }

    #[tokio::test]
    async fn test_server_error_retries_then_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3) // initial request + 2 retries
            .mount(&server)
            .await;

        let client = fast_client(&server.uri()).with_max_retries(2);
        let result: Result<Option<Vec<NewsArticle>>, _> = client.get_data("/news/general", &[], false).await;
        assert!(matches!(result, Err(FetchError::HttpStatus(500))));
    }

    #[tokio::test]
    async fn test_503_then_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"data": [{"id": "x", "title": "X"}], "success": true}"#),
            )
            .mount(&server)
            .await;

        let client = fast_client(&server.uri());
        let data: Option<Vec<NewsArticle>> = client.get_data("/news/general", &[], false).await.unwrap();
        assert_eq!(data.unwrap()[0].id, "x");
    }

    #[tokio::test]
    async fn test_rate_limited_after_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .expect(2)
            .mount(&server)
            .await;

        let client = fast_client(&server.uri()).with_max_retries(1);
        let result: Result<Option<Vec<NewsArticle>>, _> = client.get_data("/videos", &[], false).await;
        assert!(matches!(result, Err(FetchError::RateLimited(1))));
    }

    #[tokio::test]
    async fn test_not_found_fails_fast() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = fast_client(&server.uri());
        let result: Result<Option<Vec<NewsArticle>>, _> = client.get_data("/nope", &[], false).await;
        assert!(matches!(result, Err(FetchError::HttpStatus(404))));
    }

    #[tokio::test]
    async fn test_oversized_response_rejected() {
        let server = MockServer::start().await;
        let body = "x".repeat(MAX_RESPONSE_SIZE + 1);
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let client = fast_client(&server.uri());
        let result: Result<Option<Vec<NewsArticle>>, _> = client.get_data("/big", &[], false).await;
        assert!(matches!(result, Err(FetchError::ResponseTooLarge)));
    }
}
