use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::StreamExt;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use thiserror::Error;

use crate::config::DownloaderConfig;

/// Custom errors for page download operations.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("server answered {0}")]
    Status(StatusCode),
    #[error("page exceeds {0} bytes")]
    TooLarge(u64),
    #[error("encoder task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Fetches one page and stores it at a fixed path.
///
/// Implementations never fail across this boundary: every problem is reported
/// as `false`.
#[async_trait]
pub trait PageWriter: Send + Sync {
    async fn save_page(&self, url: &str, dest: &Path) -> bool;
}

/// Path a page is written to before it is renamed onto `dest`.
/// e.g., for "/x/image_0.jpg", it returns "/x/image_0.jpg.part"
pub fn temporary_path(dest: &Path) -> PathBuf {
    let dest_str = dest.to_string_lossy();
    PathBuf::from(format!("{}.part", dest_str))
}

/// Decodes `bytes` (any format the `image` crate reads) and writes them to
/// `dest` as a JPEG of the given quality, creating parent directories.
///
/// Nothing is left at `dest` or its temporary path when this fails.
pub fn store_jpeg(bytes: &[u8], dest: &Path, quality: u8) -> Result<(), DownloadError> {
    let decoded = image::load_from_memory(bytes)?;

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let part = temporary_path(dest);
    let written = write_jpeg(&decoded, &part, quality)
        .and_then(|_| std::fs::rename(&part, dest).map_err(DownloadError::from));
    if written.is_err() {
        let _ = std::fs::remove_file(&part);
    }
    written
}

fn write_jpeg(decoded: &DynamicImage, path: &Path, quality: u8) -> Result<(), DownloadError> {
    // JPEG has no alpha channel.
    let rgb = decoded.to_rgb8();
    let mut writer = BufWriter::new(File::create(path)?);
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut writer, quality);
        encoder.encode_image(&rgb)?;
    }
    writer.flush()?;
    Ok(())
}

/// Downloads page images over HTTP and re-encodes them as JPEG.
#[derive(Debug, Clone)]
pub struct ImageDownloader {
    client: Client,
    jpeg_quality: u8,
    max_image_bytes: u64,
}

impl ImageDownloader {
    pub fn new(config: &DownloaderConfig) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self::with_client(
            client,
            config.jpeg_quality,
            config.max_image_bytes,
        ))
    }

    pub fn with_client(client: Client, jpeg_quality: u8, max_image_bytes: u64) -> Self {
        Self {
            client,
            jpeg_quality,
            max_image_bytes,
        }
    }

    /// Fetch `url` and store it at `dest`. Returns `false` on any failure.
    pub async fn download_image(&self, url: &str, dest: &Path) -> bool {
        match self.try_download(url, dest).await {
            Ok(()) => {
                debug!("saved page {} -> {}", url, dest.display());
                true
            }
            Err(e) => {
                warn!("page {} skipped: {}", url, e);
                false
            }
        }
    }

    async fn try_download(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        let bytes = self.fetch(url).await?;
        let dest = dest.to_path_buf();
        let quality = self.jpeg_quality;
        // Decoding and encoding are CPU-bound.
        tokio::task::spawn_blocking(move || store_jpeg(&bytes, &dest, quality)).await??;
        Ok(())
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(DownloadError::Status(resp.status()));
        }
        if resp
            .content_length()
            .is_some_and(|len| len > self.max_image_bytes)
        {
            return Err(DownloadError::TooLarge(self.max_image_bytes));
        }

        let mut body = Vec::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let bytes = chunk?;
            if (body.len() + bytes.len()) as u64 > self.max_image_bytes {
                return Err(DownloadError::TooLarge(self.max_image_bytes));
            }
            body.extend_from_slice(&bytes);
        }
        Ok(body)
    }
}

#[async_trait]
impl PageWriter for ImageDownloader {
    async fn save_page(&self, url: &str, dest: &Path) -> bool {
        self.download_image(url, dest).await
    }
}
