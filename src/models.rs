// src/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Title used when the remote catalog has no display title for a chapter.
pub const FALLBACK_CHAPTER_TITLE: &str = "Chapter";

/// One chapter the caller wants downloaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChapterRequest {
    /// Remote identifier handed to the chapter source.
    pub id: String,
    pub title: Option<String>,
}

impl ChapterRequest {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: Some(title.into()),
        }
    }

    /// The display title, or [`FALLBACK_CHAPTER_TITLE`] when the catalog gave none.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(FALLBACK_CHAPTER_TITLE)
    }
}

/// The stored state of a chapter download.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Downloading,
    Completed,
    Failed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Downloading => "downloading",
            RecordStatus::Completed => "completed",
            RecordStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown record status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for RecordStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "downloading" => Ok(RecordStatus::Downloading),
            "completed" => Ok(RecordStatus::Completed),
            "failed" => Ok(RecordStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Persisted proof that a chapter was downloaded for a user.
///
/// `(chapter_id, user_id)` identifies a record; storing a second record with the
/// same pair replaces the first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DownloadRecord {
    /// Row id assigned by the store. `0` until the record has been inserted.
    pub id: i64,
    pub comic_slug: String,
    pub comic_title: String,
    pub chapter_id: String,
    pub chapter_title: String,
    pub user_id: String,
    /// Directory holding the chapter's `image_<N>.jpg` pages.
    pub local_path: PathBuf,
    pub downloaded_at: DateTime<Utc>,
    pub status: RecordStatus,
}

impl DownloadRecord {
    /// A freshly completed chapter, timestamped now.
    pub fn completed(
        user_id: &str,
        comic_slug: &str,
        comic_title: &str,
        chapter: &ChapterRequest,
        local_path: PathBuf,
    ) -> Self {
        Self {
            id: 0,
            comic_slug: comic_slug.to_string(),
            comic_title: comic_title.to_string(),
            chapter_id: chapter.id.clone(),
            chapter_title: chapter.display_title().to_string(),
            user_id: user_id.to_string(),
            local_path,
            downloaded_at: Utc::now(),
            status: RecordStatus::Completed,
        }
    }
}

/// A user's downloads of one comic, as shown in the downloads overview.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComicFolder {
    pub comic_slug: String,
    pub comic_title: String,
    pub chapter_count: usize,
}

/// Snapshot of the batch downloader, published after every chapter and page.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DownloadStatus {
    pub is_downloading: bool,
    pub total_chapters: usize,
    /// 1-based; `0` before the first chapter starts.
    pub current_chapter_index: usize,
    pub current_chapter_name: String,
    /// Overall progress, 0 to 100.
    pub progress: u8,
    pub message: String,
}

/// Outcome of one batch, returned by the worker task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub cancelled: bool,
}

impl BatchSummary {
    /// The user-facing line reported when a batch ends.
    pub fn message(&self) -> String {
        if self.cancelled {
            format!(
                "Cancelled. {} of {} chapters downloaded.",
                self.succeeded, self.total
            )
        } else {
            format!(
                "Done! {} of {} chapters downloaded.",
                self.succeeded, self.total
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_its_column_text() {
        for status in [
            RecordStatus::Downloading,
            RecordStatus::Completed,
            RecordStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<RecordStatus>(), Ok(status));
        }
        assert!("paused".parse::<RecordStatus>().is_err());
    }

    #[test]
    fn missing_chapter_title_falls_back() {
        let chapter = ChapterRequest {
            id: "c-1".into(),
            title: None,
        };
        assert_eq!(chapter.display_title(), FALLBACK_CHAPTER_TITLE);
    }

    #[test]
    fn summary_message_reports_success_count() {
        let summary = BatchSummary {
            total: 3,
            succeeded: 2,
            cancelled: false,
        };
        assert_eq!(summary.message(), "Done! 2 of 3 chapters downloaded.");
    }
}
