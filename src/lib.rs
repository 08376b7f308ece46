pub mod config;
pub mod downloader;
pub mod layout;
pub mod manager;
pub mod models;
pub mod navigation;
pub mod notify;
pub mod progress;
pub mod source;
pub mod store;

/// Convenient type alias exposing common structs.
pub mod prelude {
    pub use crate::config::DownloaderConfig;
    pub use crate::downloader::{ImageDownloader, PageWriter};
    pub use crate::layout::{list_chapter_images, StorageLayout};
    pub use crate::manager::DownloadManager;
    pub use crate::models::{
        BatchSummary, ChapterRequest, ComicFolder, DownloadRecord, DownloadStatus, RecordStatus,
    };
    pub use crate::navigation::{ChapterNeighbors, OfflineNavigator};
    pub use crate::notify::{LogNotifier, Notifier, NoopNotifier};
    pub use crate::progress::StatusHub;
    pub use crate::source::{ChapterSource, HttpChapterSource};
    pub use crate::store::RecordStore;
}
