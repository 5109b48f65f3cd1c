use std::{sync::Arc, time::Duration};

use reqwest::header::{CONTENT_TYPE, REFERER};
use tokio::sync::Mutex;

use crate::error::FetchError;

/// Shared HTTP session for every board request.
///
/// One connection pool is reused across all feeds. At most one request is in
/// flight: the mutex is held for the whole round trip, body read included.
/// Clones share the same pool and lock.
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<Inner>,
}

struct Inner {
    client: reqwest::Client,
    lock: Mutex<()>,
}

impl HttpClient {
    pub const USER_AGENT: &'static str = "Mozilla/5.0";
    pub const TIMEOUT: Duration = Duration::from_secs(15);

    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(Self::USER_AGENT)
            .timeout(Self::TIMEOUT)
            .cookie_store(true)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                lock: Mutex::new(()),
            }),
        }
    }

    /// GETs `url` and decodes the body as text using the response charset.
    pub async fn get_text(&self, url: &str, referer: Option<&str>) -> Result<String, FetchError> {
        let _guard = self.inner.lock.lock().await;
        let response = self.send(url, referer).await?;
        response
            .text()
            .await
            .map_err(|e| FetchError::request(url, e))
    }

    /// GETs `url` and returns the raw body together with its `Content-Type`.
    pub async fn get_bytes(
        &self,
        url: &str,
        referer: Option<&str>,
    ) -> Result<(Vec<u8>, Option<String>), FetchError> {
        let _guard = self.inner.lock.lock().await;
        let response = self.send(url, referer).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::request(url, e))?;
        Ok((bytes.to_vec(), content_type))
    }

    async fn send(&self, url: &str, referer: Option<&str>) -> Result<reqwest::Response, FetchError> {
        tracing::debug!(url, "GET");
        let mut request = self.inner.client.get(url);
        if let Some(referer) = referer {
            request = request.header(REFERER, referer);
        }
        let response = request
            .send()
            .await
            .map_err(|e| FetchError::request(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }
        Ok(response)
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient").finish_non_exhaustive()
    }
}
