// src/manager.rs

use crate::config::DownloaderConfig;
use crate::downloader::{DownloadError, ImageDownloader, PageWriter};
use crate::layout::{page_file_name, StorageLayout};
use crate::models::{BatchSummary, ChapterRequest, DownloadRecord, DownloadStatus};
use crate::notify::{LogNotifier, Notifier};
use crate::progress::StatusHub;
use crate::source::{ChapterSource, HttpChapterSource, SourceError};
use crate::store::{RecordStore, StoreError};
use futures_util::FutureExt;
use log::{debug, info, warn};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("record store error: {0}")]
    Store(#[from] StoreError),
    #[error("chapter source error: {0}")]
    Source(#[from] SourceError),
    #[error("page downloader error: {0}")]
    Download(#[from] DownloadError),
}

/// Progress of the whole batch when chapter `index` (0-based) of `total` starts.
pub fn chapter_progress(index: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    (index * 100 / total).min(100) as u8
}

/// Progress when page `image_index` of `total_images` in chapter `index` starts:
/// `floor((index / total + image_index / total_images / total) * 100)`.
pub fn page_progress(index: usize, total: usize, image_index: usize, total_images: usize) -> u8 {
    if total == 0 || total_images == 0 {
        return chapter_progress(index, total);
    }
    let done = (index as u64 * total_images as u64 + image_index as u64) * 100;
    (done / (total as u64 * total_images as u64)).min(100) as u8
}

#[derive(Debug, Default, Clone, Copy)]
struct ChapterOutcome {
    pages_saved: usize,
    interrupted: bool,
}

/// Publishes the end of a batch when dropped, whether the batch ran to
/// completion, was cancelled, or unwound.
struct CompletionGuard {
    status: StatusHub,
    notifier: Arc<dyn Notifier>,
    summary: BatchSummary,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if let Err(e) = self.notifier.notify_complete(self.summary.succeeded) {
            debug!("completion notification dropped: {}", e);
        }
        info!(
            "Batch finished: {} of {} chapters downloaded{}",
            self.summary.succeeded,
            self.summary.total,
            if self.summary.cancelled { " (cancelled)" } else { "" }
        );
        self.status.finish(self.summary.message());
    }
}

/// Downloads batches of chapters for offline reading, one batch at a time.
pub struct DownloadManager {
    source: Arc<dyn ChapterSource>,
    writer: Arc<dyn PageWriter>,
    store: RecordStore,
    notifier: Arc<dyn Notifier>,
    layout: StorageLayout,
    status: StatusHub,
    chapter_delay: Duration,
    // Token of the running batch.
    cancellation: Mutex<CancellationToken>,
}

impl DownloadManager {
    pub fn new(
        source: Arc<dyn ChapterSource>,
        writer: Arc<dyn PageWriter>,
        store: RecordStore,
        layout: StorageLayout,
        status: StatusHub,
    ) -> Self {
        Self {
            source,
            writer,
            store,
            notifier: Arc::new(LogNotifier),
            layout,
            status,
            chapter_delay: Duration::from_millis(100),
            cancellation: Mutex::new(CancellationToken::new()),
        }
    }

    /// HTTP chapter source and page downloader built from `config`.
    pub fn from_config(
        config: &DownloaderConfig,
        store: RecordStore,
        status: StatusHub,
    ) -> Result<Self, ManagerError> {
        let source = Arc::new(HttpChapterSource::new(config)?);
        let writer = Arc::new(ImageDownloader::new(config)?);
        let layout = StorageLayout::new(config.storage_root.clone());
        Ok(Self::new(source, writer, store, layout, status).with_chapter_delay(config.chapter_delay()))
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_chapter_delay(mut self, delay: Duration) -> Self {
        self.chapter_delay = delay;
        self
    }

    pub fn status(&self) -> &StatusHub {
        &self.status
    }

    pub fn subscribe(&self) -> watch::Receiver<DownloadStatus> {
        self.status.subscribe()
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Starts downloading `chapters` in the background.
    ///
    /// Returns `None` without touching anything when a batch is already
    /// running. Must be called from within a tokio runtime.
    pub fn start_download(
        self: &Arc<Self>,
        user_id: &str,
        comic_id: &str,
        comic_title: &str,
        chapters: Vec<ChapterRequest>,
    ) -> Option<JoinHandle<BatchSummary>> {
        let token = {
            let mut slot = self.cancellation.lock().unwrap_or_else(|e| e.into_inner());
            if !self.status.try_begin(chapters.len()) {
                debug!("Download of '{}' ignored: a batch is already running", comic_title);
                return None;
            }
            *slot = CancellationToken::new();
            slot.clone()
        };

        let manager = Arc::clone(self);
        let user_id = user_id.to_string();
        let comic_id = comic_id.to_string();
        let comic_title = comic_title.to_string();
        Some(tokio::spawn(async move {
            manager
                .run_batch(&user_id, &comic_id, &comic_title, &chapters, token)
                .await
        }))
    }

    /// Asks the running batch to stop after the page in flight. Returns
    /// `false` when nothing is running.
    pub fn cancel(&self) -> bool {
        let slot = self.cancellation.lock().unwrap_or_else(|e| e.into_inner());
        if !self.status.is_running() {
            return false;
        }
        slot.cancel();
        info!("Cancellation requested for the running batch");
        true
    }

    /// Removes a download record, and its page files when `delete_files` is set.
    pub async fn delete_download(
        &self,
        record: &DownloadRecord,
        delete_files: bool,
    ) -> Result<bool, ManagerError> {
        let removed = self.store.delete(record).await?;
        info!("Removed download of '{}' ({})", record.chapter_title, record.comic_title);

        if delete_files {
            match tokio::fs::remove_dir_all(&record.local_path).await {
                Ok(()) => debug!("Cleaned up files at {}", record.local_path.display()),
                Err(e) => warn!(
                    "Could not remove files at {}: {}",
                    record.local_path.display(),
                    e
                ),
            }
        }
        Ok(removed)
    }

    async fn run_batch(
        &self,
        user_id: &str,
        comic_id: &str,
        comic_title: &str,
        chapters: &[ChapterRequest],
        token: CancellationToken,
    ) -> BatchSummary {
        let total = chapters.len();
        let mut guard = CompletionGuard {
            status: self.status.clone(),
            notifier: Arc::clone(&self.notifier),
            summary: BatchSummary {
                total,
                succeeded: 0,
                cancelled: false,
            },
        };
        info!("Batch started: {} chapters of '{}'", total, comic_title);

        for (index, chapter) in chapters.iter().enumerate() {
            if token.is_cancelled() {
                guard.summary.cancelled = true;
                break;
            }

            let name = chapter.display_title();
            self.status.update(|s| {
                s.current_chapter_index = index + 1;
                s.current_chapter_name = name.to_string();
                s.progress = chapter_progress(index, total);
                s.message = format!("Downloading {}...", name);
            });
            if let Err(e) = self.notifier.notify_progress(total, index + 1, name) {
                debug!("progress notification dropped: {}", e);
            }

            let attempt = AssertUnwindSafe(self.download_chapter(
                user_id,
                comic_id,
                comic_title,
                chapter,
                index,
                total,
                &token,
            ))
            .catch_unwind()
            .await;
            match attempt {
                Ok(Ok(outcome)) => {
                    if outcome.pages_saved > 0 {
                        guard.summary.succeeded += 1;
                    }
                    if outcome.interrupted {
                        guard.summary.cancelled = true;
                        break;
                    }
                }
                Ok(Err(e)) => warn!("Chapter '{}' failed: {}", name, e),
                Err(_) => warn!("Chapter '{}' aborted by a panic", name),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.chapter_delay) => {}
                _ = token.cancelled() => {}
            }
        }

        guard.summary
    }

    /// Downloads every page of one chapter and records it when at least one
    /// page was saved.
    #[allow(clippy::too_many_arguments)]
    async fn download_chapter(
        &self,
        user_id: &str,
        comic_id: &str,
        comic_title: &str,
        chapter: &ChapterRequest,
        index: usize,
        total: usize,
        token: &CancellationToken,
    ) -> Result<ChapterOutcome, ManagerError> {
        let name = chapter.display_title();
        let urls = match self.source.fetch_chapter_images(&chapter.id).await {
            Ok(urls) if !urls.is_empty() => urls,
            Ok(_) => {
                warn!("Chapter '{}' has no pages, skipping", name);
                return Ok(ChapterOutcome::default());
            }
            Err(e) => {
                warn!("Chapter '{}' page list unavailable: {}", name, e);
                return Ok(ChapterOutcome::default());
            }
        };

        let dir = self.layout.chapter_directory(comic_title, name);
        let total_images = urls.len();
        let mut outcome = ChapterOutcome::default();

        for (image_index, url) in urls.iter().enumerate() {
            if token.is_cancelled() {
                outcome.interrupted = true;
                break;
            }
            self.status
                .update(|s| s.progress = page_progress(index, total, image_index, total_images));

            let dest = dir.join(page_file_name(image_index));
            if self.writer.save_page(url, &dest).await {
                outcome.pages_saved += 1;
            }
        }

        if outcome.pages_saved == 0 {
            warn!("Chapter '{}': none of {} pages saved", name, total_images);
            return Ok(outcome);
        }

        let record = DownloadRecord::completed(user_id, comic_id, comic_title, chapter, dir);
        self.store.insert(&record).await?;
        info!(
            "Chapter '{}' saved: {}/{} pages in {}",
            name,
            outcome.pages_saved,
            total_images,
            record.local_path.display()
        );
        Ok(outcome)
    }
}
