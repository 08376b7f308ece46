// src/navigation.rs

//! Previous/next chapter resolution while reading offline.
//!
//! Nothing stores a chapter's position in its comic, so reading order is
//! rebuilt from the digits in each chapter title every time it is needed.
//! Titles without digits (or with a fractional part such as "10.5") order
//! poorly; that limitation is kept as-is.

use std::path::{Path, PathBuf};

use crate::layout::list_chapter_images;
use crate::models::DownloadRecord;
use crate::store::{RecordStore, StoreError};

/// Every ASCII digit of `title`, concatenated and read as one number.
/// `0` when there are no digits or the number exceeds `i32::MAX`.
///
/// Digits from other scripts (full-width `１２`, Arabic-Indic, ...) are
/// ignored, so such titles key to `0`.
pub fn chapter_order_key(title: &str) -> i32 {
    let digits: String = title.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

/// Stable ascending sort by [`chapter_order_key`].
pub fn sort_by_reading_order(records: &mut [DownloadRecord]) {
    records.sort_by_key(|r| chapter_order_key(&r.chapter_title));
}

/// Chapters adjacent to the one being read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterNeighbors {
    pub previous: Option<DownloadRecord>,
    pub next: Option<DownloadRecord>,
}

impl ChapterNeighbors {
    pub fn has_any(&self) -> bool {
        self.previous.is_some() || self.next.is_some()
    }
}

/// Finds the chapters before and after the one stored at `current_path`.
///
/// Both sides are `None` when no record points at `current_path`.
pub fn resolve_neighbors(mut records: Vec<DownloadRecord>, current_path: &Path) -> ChapterNeighbors {
    sort_by_reading_order(&mut records);
    let Some(index) = records.iter().position(|r| r.local_path == current_path) else {
        return ChapterNeighbors::default();
    };

    let previous = index.checked_sub(1).map(|i| records[i].clone());
    let next = records.get(index + 1).cloned();
    ChapterNeighbors { previous, next }
}

/// Reads downloaded chapters back from the record store.
#[derive(Clone)]
pub struct OfflineNavigator {
    store: RecordStore,
}

impl OfflineNavigator {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    /// A user's downloaded chapters of one comic, in reading order.
    pub async fn chapters(
        &self,
        user_id: &str,
        comic_slug: &str,
    ) -> Result<Vec<DownloadRecord>, StoreError> {
        let mut records = self.store.query_by_user_and_comic(user_id, comic_slug).await?;
        sort_by_reading_order(&mut records);
        Ok(records)
    }

    /// Re-reads the store on every call, so added or removed downloads are
    /// always reflected.
    pub async fn neighbors(
        &self,
        user_id: &str,
        comic_slug: &str,
        current_path: &Path,
    ) -> Result<ChapterNeighbors, StoreError> {
        let records = self.store.query_by_user_and_comic(user_id, comic_slug).await?;
        Ok(resolve_neighbors(records, current_path))
    }

    /// Page files of a downloaded chapter, in reading order.
    pub async fn pages(&self, record: &DownloadRecord) -> Vec<PathBuf> {
        let dir = record.local_path.clone();
        tokio::task::spawn_blocking(move || list_chapter_images(&dir))
            .await
            .unwrap_or_default()
    }
}
