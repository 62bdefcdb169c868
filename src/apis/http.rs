//! Request plumbing shared by the provider clients.

use crate::errors::{ProviderError, ProviderResult};
use crate::models::ProviderKind;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client as ReqwestClient, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub max_concurrent_requests: usize,
}

impl ClientOptions {
    pub fn for_provider(kind: ProviderKind) -> Self {
        Self {
            base_url: kind.default_base_url().to_string(),
            user_agent: format!("repochat/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(15),
            max_concurrent_requests: 4,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_max_concurrent_requests(mut self, limit: usize) -> Self {
        self.max_concurrent_requests = limit.max(1);
        self
    }
}

/// Authenticated HTTP access to one provider API.
///
/// Every request holds a permit from `limiter` until its body has been read, so
/// `max_concurrent_requests` bounds what a single client has in flight.
pub struct HttpTransport {
    client: ReqwestClient,
    base_url: Url,
    limiter: Arc<Semaphore>,
    provider: ProviderKind,
}

impl HttpTransport {
    pub fn new(
        provider: ProviderKind,
        options: &ClientOptions,
        authorization: String,
    ) -> ProviderResult<Self> {
        let mut auth_value = HeaderValue::from_str(&authorization)
            .map_err(|e| ProviderError::invalid_input(format!("Invalid credential: {}", e)))?;
        auth_value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth_value);
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&options.user_agent)
                .map_err(|e| ProviderError::invalid_input(format!("Invalid user agent: {}", e)))?,
        );

        let client = ReqwestClient::builder()
            .default_headers(headers)
            .timeout(options.timeout)
            .build()
            .map_err(|e| ProviderError::invalid_input(format!("Failed to build client: {}", e)))?;

        let base_url = Url::parse(options.base_url.trim_end_matches('/')).map_err(|e| {
            ProviderError::invalid_input(format!("Invalid base URL {}: {}", options.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ProviderError::invalid_input(format!(
                "Base URL cannot carry a path: {}",
                options.base_url
            )));
        }

        Ok(Self {
            client,
            base_url,
            limiter: Arc::new(Semaphore::new(options.max_concurrent_requests.max(1))),
            provider,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Endpoint URL built from path segments. Each segment is percent-encoded on its
    /// own, so a `/` inside a segment becomes `%2F`.
    pub fn url<I, S>(&self, segments: I) -> Url
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut url = self.base_url.clone();
        push_segments(&mut url, segments);
        url
    }

    /// GET `url` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, &str)],
    ) -> ProviderResult<T> {
        self.get_json_with_headers(url, query)
            .await
            .map(|(_, value)| value)
    }

    /// Like [`get_json`](Self::get_json), keeping the response headers for
    /// pagination links.
    pub async fn get_json_with_headers<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, &str)],
    ) -> ProviderResult<(HeaderMap, T)> {
        let request = self.client.get(url).query(query);
        let (headers, body) = self.execute(request).await?;
        let value = serde_json::from_slice(&body).map_err(|e| {
            ProviderError::malformed(format!("{} response did not parse: {}", self.provider, e))
        })?;
        Ok((headers, value))
    }

    /// GET `url` and return headers plus the undecoded body bytes.
    pub async fn get_raw(
        &self,
        url: Url,
        query: &[(&str, &str)],
        accept: Option<&'static str>,
    ) -> ProviderResult<(HeaderMap, Vec<u8>)> {
        let mut request = self.client.get(url).query(query);
        if let Some(accept) = accept {
            request = request.header(ACCEPT, accept);
        }
        self.execute(request).await
    }

    /// Authenticated request whose body is ignored; succeeds on any 2xx.
    pub async fn get_ok(&self, url: Url) -> ProviderResult<()> {
        self.execute(self.client.get(url)).await.map(|_| ())
    }

    async fn execute(&self, request: RequestBuilder) -> ProviderResult<(HeaderMap, Vec<u8>)> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| ProviderError::Cancelled)?;

        let request = request
            .build()
            .map_err(|e| ProviderError::invalid_input(format!("Invalid request: {}", e)))?;
        debug!(provider = %self.provider, url = %request.url(), "sending request");

        let response = self.client.execute(request).await.map_err(|e| {
            ProviderError::Unavailable(format!("Failed to reach {}: {}", self.provider, e))
        })?;

        let status = response.status();
        let headers = response.headers().clone();

        if !status.is_success() {
            let exhausted = headers
                .get("x-ratelimit-remaining")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.trim() == "0");
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            debug!(provider = %self.provider, %status, "request failed");
            return Err(ProviderError::from_status(status, exhausted, body));
        }

        let body = response.bytes().await.map_err(|e| {
            ProviderError::Unavailable(format!("Failed to read {} response: {}", self.provider, e))
        })?;

        Ok((headers, body.to_vec()))
    }
}

fn push_segments<I, S>(url: &mut Url, segments: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty();
        for segment in segments {
            path.push(segment.as_ref());
        }
    }
}

/// Browser link under `base`, with segments encoded the same way as API URLs.
pub fn web_link<I, S>(base: &str, segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    match Url::parse(base.trim_end_matches('/')) {
        Ok(mut url) if !url.cannot_be_a_base() => {
            push_segments(&mut url, segments);
            url.into()
        }
        _ => segments
            .into_iter()
            .fold(base.trim_end_matches('/').to_string(), |mut link, segment| {
                link.push('/');
                link.push_str(segment.as_ref());
                link
            }),
    }
}

/// Split a repository path into URL segments, dropping empty parts.
pub fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Collapse a listing failure into an empty result.
pub fn or_empty<T>(
    provider: ProviderKind,
    operation: &str,
    result: ProviderResult<Vec<T>>,
) -> Vec<T> {
    result.unwrap_or_else(|err| {
        warn!(
            %provider,
            operation,
            kind = err.kind(),
            error = %err,
            "returning empty result"
        );
        Vec::new()
    })
}
