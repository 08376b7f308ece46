// src/progress.rs

use std::sync::Arc;
use tokio::sync::watch;

use crate::models::DownloadStatus;

/// The one shared holder of the batch downloader's state.
///
/// Clones share the same state. Observers get the latest value only: a late
/// subscriber starts from the current snapshot, never from history.
#[derive(Debug, Clone)]
pub struct StatusHub {
    sender: Arc<watch::Sender<DownloadStatus>>,
}

impl StatusHub {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(DownloadStatus::default());
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<DownloadStatus> {
        self.sender.subscribe()
    }

    pub fn snapshot(&self) -> DownloadStatus {
        self.sender.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.sender.borrow().is_downloading
    }

    /// Marks a batch of `total` chapters as running, unless one already is.
    ///
    /// The check and the set happen under the channel's lock, so two callers
    /// racing here can never both get `true`.
    pub fn try_begin(&self, total: usize) -> bool {
        self.sender.send_if_modified(|status| {
            if status.is_downloading {
                return false;
            }
            *status = DownloadStatus {
                is_downloading: true,
                total_chapters: total,
                message: "Starting download...".to_string(),
                ..DownloadStatus::default()
            };
            true
        })
    }

    pub fn update(&self, modify: impl FnOnce(&mut DownloadStatus)) {
        self.sender.send_modify(modify);
    }

    /// Back to idle, keeping only the summary message.
    pub fn finish(&self, message: String) {
        self.sender.send_replace(DownloadStatus {
            message,
            ..DownloadStatus::default()
        });
    }
}

impl Default for StatusHub {
    fn default() -> Self {
        Self::new()
    }
}
