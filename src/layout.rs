// src/layout.rs

//! Where downloaded chapters live on disk.
//!
//! ```text
//! <root>/Downloads/<comic title>/<chapter title>/image_0.jpg
//!                                               /image_1.jpg
//! ```
//!
//! Both title segments are sanitized so that only `[A-Za-z0-9.-]` survive;
//! everything else becomes `_`. A segment that would come out empty, `.` or
//! `..` is turned into underscores so it cannot escape its parent. Page order
//! is carried by the number in the file name, never by directory iteration
//! order.

use regex::Regex;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const DOWNLOADS_DIR: &str = "Downloads";
const PAGE_PREFIX: &str = "image_";
const PAGE_EXTENSIONS: [&str; 2] = ["jpg", "png"];

fn unsafe_chars() -> &'static Regex {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    UNSAFE.get_or_init(|| Regex::new(r"[^a-zA-Z0-9.\-]").expect("static pattern"))
}

/// Replaces every character outside `[A-Za-z0-9.-]` with `_`.
///
/// A segment that would come out empty, `.` or `..` has its dots replaced too,
/// so it always names a real child directory.
pub fn sanitize_segment(name: &str) -> String {
    let safe = unsafe_chars().replace_all(name, "_").into_owned();
    if safe.is_empty() {
        return "_".to_string();
    }
    if safe.chars().all(|c| c == '.') {
        return "_".repeat(safe.len());
    }
    safe
}

/// File name of the page at `index` (0-based, source order).
pub fn page_file_name(index: usize) -> String {
    format!("{PAGE_PREFIX}{index}.jpg")
}

/// Maps comic and chapter titles onto the download tree under one root.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.root.join(DOWNLOADS_DIR)
    }

    /// `<root>/Downloads/<safe comic>/<safe chapter>`. Does not touch the disk.
    pub fn chapter_directory(&self, comic_title: &str, chapter_title: &str) -> PathBuf {
        self.downloads_dir()
            .join(sanitize_segment(comic_title))
            .join(sanitize_segment(chapter_title))
    }
}

/// Numeric position of a page file: the stem with `image_` removed, parsed as
/// an integer. Anything unparsable sorts as `0`.
fn page_number(path: &Path) -> i32 {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(|stem| stem.replace(PAGE_PREFIX, ""))
        .and_then(|digits| digits.parse::<i32>().ok())
        .unwrap_or(0)
}

fn is_page_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| PAGE_EXTENSIONS.contains(&ext))
}

/// Page images of a downloaded chapter, in reading order.
///
/// Returns an empty list when `dir` is missing, is not a directory, or cannot
/// be read.
pub fn list_chapter_images(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut pages: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| is_page_file(path))
        .collect();

    pages.sort_by(|a, b| match page_number(a).cmp(&page_number(b)) {
        Ordering::Equal => a.file_name().cmp(&b.file_name()),
        other => other,
    });
    pages
}
