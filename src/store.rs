// src/store.rs

use crate::models::{ComicFolder, DownloadRecord, RecordStatus};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio_rusqlite::Connection;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),
    #[error("database query failed: {0}")]
    Query(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

const SELECT_RECORD: &str = "SELECT id, comic_slug, comic_title, chapter_id, chapter_title, \
     user_id, local_path, downloaded_at, status FROM downloads";

/// Persists one row per downloaded chapter in SQLite.
///
/// Clones share the underlying connection.
#[derive(Clone)]
pub struct RecordStore {
    conn: Connection,
}

impl RecordStore {
    /// Opens (or creates) the database file and its schema.
    pub async fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let conn = Connection::open(db_path).await?;
        Self::with_connection(conn).await
    }

    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().await?;
        Self::with_connection(conn).await
    }

    async fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        let store = Self { conn };
        store.setup_database().await?;
        Ok(store)
    }

    /// Creates the `downloads` table if it doesn't already exist.
    async fn setup_database(&self) -> Result<(), StoreError> {
        self.conn
            .call(|conn| {
                conn.execute_batch(
                    "CREATE TABLE IF NOT EXISTS downloads (
                        id              INTEGER PRIMARY KEY AUTOINCREMENT,
                        comic_slug      TEXT NOT NULL,
                        comic_title     TEXT NOT NULL,
                        chapter_id      TEXT NOT NULL,
                        chapter_title   TEXT NOT NULL,
                        user_id         TEXT NOT NULL,
                        local_path      TEXT NOT NULL,
                        downloaded_at   INTEGER NOT NULL,
                        status          TEXT NOT NULL,
                        UNIQUE (chapter_id, user_id)
                    );
                    CREATE INDEX IF NOT EXISTS downloads_user_comic
                        ON downloads (user_id, comic_slug);",
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Inserts a record, replacing any earlier one for the same chapter and
    /// user. Returns the new row id.
    pub async fn insert(&self, record: &DownloadRecord) -> Result<i64, StoreError> {
        let record = record.clone();
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO downloads
                        (comic_slug, comic_title, chapter_id, chapter_title, user_id,
                         local_path, downloaded_at, status)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        record.comic_slug,
                        record.comic_title,
                        record.chapter_id,
                        record.chapter_title,
                        record.user_id,
                        record.local_path.to_string_lossy().into_owned(),
                        record.downloaded_at.timestamp_millis(),
                        record.status.as_str(),
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    /// All of a user's downloads of one comic, ordered by chapter title.
    pub async fn query_by_user_and_comic(
        &self,
        user_id: &str,
        comic_slug: &str,
    ) -> Result<Vec<DownloadRecord>, StoreError> {
        let user_id = user_id.to_string();
        let comic_slug = comic_slug.to_string();
        let records = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "{SELECT_RECORD} WHERE user_id = ?1 AND comic_slug = ?2 ORDER BY chapter_title ASC"
                ))?;
                let records = stmt
                    .query_map(params![user_id, comic_slug], record_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(records)
            })
            .await?;
        Ok(records)
    }

    /// All of a user's downloads, newest first.
    pub async fn list_by_user(&self, user_id: &str) -> Result<Vec<DownloadRecord>, StoreError> {
        let user_id = user_id.to_string();
        let records = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "{SELECT_RECORD} WHERE user_id = ?1 ORDER BY downloaded_at DESC, id DESC"
                ))?;
                let records = stmt
                    .query_map(params![user_id], record_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(records)
            })
            .await?;
        Ok(records)
    }

    pub async fn find_by_chapter_and_user(
        &self,
        chapter_id: &str,
        user_id: &str,
    ) -> Result<Option<DownloadRecord>, StoreError> {
        let chapter_id = chapter_id.to_string();
        let user_id = user_id.to_string();
        let record = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "{SELECT_RECORD} WHERE chapter_id = ?1 AND user_id = ?2 LIMIT 1"
                ))?;
                let mut rows = stmt.query_map(params![chapter_id, user_id], record_from_row)?;
                let record = rows.next().transpose()?;
                Ok(record)
            })
            .await?;
        Ok(record)
    }

    /// Deletes the record identified by its chapter and user. Returns whether a
    /// row was removed.
    pub async fn delete(&self, record: &DownloadRecord) -> Result<bool, StoreError> {
        let chapter_id = record.chapter_id.clone();
        let user_id = record.user_id.clone();
        let removed = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    "DELETE FROM downloads WHERE chapter_id = ?1 AND user_id = ?2",
                    params![chapter_id, user_id],
                )?;
                Ok(n > 0)
            })
            .await?;
        Ok(removed)
    }

    pub async fn delete_by_id(&self, id: i64) -> Result<bool, StoreError> {
        let removed = self
            .conn
            .call(move |conn| {
                let n = conn.execute("DELETE FROM downloads WHERE id = ?1", params![id])?;
                Ok(n > 0)
            })
            .await?;
        Ok(removed)
    }

    pub async fn update_status(&self, id: i64, status: RecordStatus) -> Result<bool, StoreError> {
        let updated = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    "UPDATE downloads SET status = ?1 WHERE id = ?2",
                    params![status.as_str(), id],
                )?;
                Ok(n > 0)
            })
            .await?;
        Ok(updated)
    }

    /// A user's downloads grouped per comic, sorted by comic title.
    pub async fn list_comic_folders(&self, user_id: &str) -> Result<Vec<ComicFolder>, StoreError> {
        let records = self.list_by_user(user_id).await?;
        Ok(group_into_folders(&records))
    }
}

/// Groups records by comic slug. Each folder takes its title from the first
/// record seen for that slug.
pub fn group_into_folders(records: &[DownloadRecord]) -> Vec<ComicFolder> {
    let mut folders: Vec<ComicFolder> = Vec::new();
    for record in records {
        match folders.iter_mut().find(|f| f.comic_slug == record.comic_slug) {
            Some(folder) => folder.chapter_count += 1,
            None => folders.push(ComicFolder {
                comic_slug: record.comic_slug.clone(),
                comic_title: record.comic_title.clone(),
                chapter_count: 1,
            }),
        }
    }
    folders.sort_by(|a, b| a.comic_title.cmp(&b.comic_title));
    folders
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<DownloadRecord> {
    let local_path: String = row.get(6)?;
    let millis: i64 = row.get(7)?;
    let downloaded_at = DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(7, millis))?;
    let status: String = row.get(8)?;
    let status = status.parse::<RecordStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(DownloadRecord {
        id: row.get(0)?,
        comic_slug: row.get(1)?,
        comic_title: row.get(2)?,
        chapter_id: row.get(3)?,
        chapter_title: row.get(4)?,
        user_id: row.get(5)?,
        local_path: PathBuf::from(local_path),
        downloaded_at,
        status,
    })
}

#[cfg(test)]
impl RecordStore {
    /// Drops the `downloads` table so every later statement fails.
    pub(crate) async fn drop_schema(&self) -> Result<(), StoreError> {
        self.conn
            .call(|conn| {
                conn.execute_batch("DROP TABLE downloads;")?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}
