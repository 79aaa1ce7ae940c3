use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use futures::TryStreamExt;
use reqwest::Client;
use scraper::{Html, Selector};
use thiserror::Error;
use url::Url;

use super::models::ApiConfig;
use crate::domain::AppError;

/// Anchor the resolution page uses for the direct link.
const DOWNLOAD_ANCHOR: &str = "a.download";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    RequestError(#[from] reqwest::Error),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("link not found")]
    NoDownloadUrl,

    #[error("invalid endpoint url: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
}

impl ApiError {
    /// Classify as a failure of the resolution step.
    pub fn into_resolution(self) -> AppError {
        match self {
            ApiError::NoDownloadUrl => AppError::LinkNotFound,
            other => AppError::Resolution(other.to_string()),
        }
    }

    /// Classify as a failure of the download step.
    pub fn into_transfer(self) -> AppError {
        AppError::Transfer(self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// Entry point to the resolution service. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ApiClient {
    config: Arc<ApiConfig>,
    endpoint: Url,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint)?;
        Ok(Self {
            config: Arc::new(config),
            endpoint,
        })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Open a fresh HTTP session with its own cookie store.
    ///
    /// One session is used for both the resolution and the download of an
    /// item, so cookies set by the service carry over to the file request.
    pub fn session(&self) -> Result<Session> {
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(self.config.user_agent.as_str())
            .build()?;

        Ok(Session {
            client,
            api: self.clone(),
        })
    }
}

pub struct Session {
    client: Client,
    api: ApiClient,
}

impl Session {
    pub fn config(&self) -> &ApiConfig {
        self.api.config()
    }

    /// Step 1: ask the resolution service for the direct download url
    pub async fn resolve(&self, source_url: &str) -> Result<Url> {
        let config = self.api.config();
        let response = self
            .client
            .post(self.api.endpoint().clone())
            .form(&[(config.form_field.as_str(), source_url)])
            .timeout(config.resolve_timeout)
            .send()
            .await?
            .error_for_status()?;

        let page_url = response.url().clone();
        let html = response.text().await?;

        extract_download_link(&html, &page_url)
    }

    /// Step 2: open the download with a byte stream
    /// Returns (total_size, stream)
    pub async fn download_file_stream(
        &self,
        download_url: &Url,
    ) -> Result<(Option<u64>, impl Stream<Item = Result<bytes::Bytes>>)> {
        let timeout = self.api.config().download_timeout;
        let request = self.client.get(download_url.clone()).send();

        let response = tokio::time::timeout(timeout, request)
            .await
            .map_err(|_| ApiError::Timeout(timeout))??
            .error_for_status()?;

        let total_size = response.content_length();
        let stream = response.bytes_stream().map_err(ApiError::RequestError);

        Ok((total_size, stream))
    }
}

/// Find the first download anchor and resolve its `href` against `base`.
fn extract_download_link(html: &str, base: &Url) -> Result<Url> {
    let selector =
        Selector::parse(DOWNLOAD_ANCHOR).map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
    let document = Html::parse_document(html);

    let href = document
        .select(&selector)
        .next()
        .and_then(|anchor| anchor.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .ok_or(ApiError::NoDownloadUrl)?;

    base.join(href)
        .map_err(|e| ApiError::InvalidResponse(format!("bad download href {href:?}: {e}")))
}
