// src/source.rs

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;

use crate::config::DownloaderConfig;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("catalog answered {0}")]
    Status(StatusCode),
    #[error("chapter response carried no data: {0}")]
    MissingData(String),
}

/// Where the page URLs of a chapter come from.
#[async_trait]
pub trait ChapterSource: Send + Sync {
    /// Page image URLs of `chapter_id`, in reading order.
    async fn fetch_chapter_images(&self, chapter_id: &str) -> Result<Vec<String>, SourceError>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChapterResponse {
    pub data: Option<ChapterData>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChapterData {
    pub images: Option<Vec<String>>,
    pub list_chapter: Option<String>,
    pub next_chapter_id: Option<String>,
    pub prev_chapter_id: Option<String>,
    pub title: Option<String>,
}

/// The comic catalog's chapter endpoint.
#[derive(Debug, Clone)]
pub struct HttpChapterSource {
    client: Client,
    base_url: String,
}

impl HttpChapterSource {
    pub fn new(config: &DownloaderConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self::with_client(client, config.api_base_url.clone()))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// `GET {base}/api/komik/chapter?chapter_url=<id>`.
    pub async fn get_chapter(&self, chapter_id: &str) -> Result<ChapterData, SourceError> {
        let url = format!("{}/api/komik/chapter", self.base_url.trim_end_matches('/'));
        let resp = self
            .client
            .get(url)
            .query(&[("chapter_url", chapter_id)])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(SourceError::Status(resp.status()));
        }

        let body: ChapterResponse = resp.json().await?;
        body.data
            .ok_or_else(|| SourceError::MissingData(body.message.unwrap_or_default()))
    }
}

#[async_trait]
impl ChapterSource for HttpChapterSource {
    async fn fetch_chapter_images(&self, chapter_id: &str) -> Result<Vec<String>, SourceError> {
        let chapter = self.get_chapter(chapter_id).await?;
        Ok(chapter.images.unwrap_or_default())
    }
}
