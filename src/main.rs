// src/main.rs

use anyhow::{bail, Context, Result};
use log::info;
use offline_chapters::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;

const USAGE: &str =
    "usage: offline_chapters <config.json> <user-id> <comic-slug> <comic-title> <chapter-id>=<chapter-title>...";

fn parse_chapter(arg: &str) -> Result<ChapterRequest> {
    match arg.split_once('=') {
        Some((id, title)) if !id.is_empty() => Ok(ChapterRequest {
            id: id.to_string(),
            title: (!title.is_empty()).then(|| title.to_string()),
        }),
        _ => bail!("invalid chapter argument '{}'\n{}", arg, USAGE),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 5 {
        bail!(USAGE);
    }
    let config = DownloaderConfig::load(&PathBuf::from(&args[0]))?;
    let (user_id, comic_slug, comic_title) = (&args[1], &args[2], &args[3]);
    let chapters = args[4..]
        .iter()
        .map(|arg| parse_chapter(arg))
        .collect::<Result<Vec<_>>>()?;

    let store = RecordStore::open(&config.database_path)
        .await
        .with_context(|| format!("opening {}", config.database_path.display()))?;
    let status = StatusHub::new();
    let manager = Arc::new(DownloadManager::from_config(&config, store.clone(), status.clone())?);

    let mut updates = status.subscribe();
    let reporter = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let s = updates.borrow_and_update().clone();
            info!(
                "[{:>3}%] {}/{} {}",
                s.progress, s.current_chapter_index, s.total_chapters, s.message
            );
            if !s.is_downloading {
                break;
            }
        }
    });

    let Some(batch) = manager.start_download(user_id, comic_slug, comic_title, chapters) else {
        bail!("a download batch is already running");
    };
    let summary = batch.await?;
    let _ = reporter.await;
    println!("{}", summary.message());

    let navigator = OfflineNavigator::new(store);
    for record in navigator.chapters(user_id, comic_slug).await? {
        let pages = navigator.pages(&record).await;
        let neighbors = navigator
            .neighbors(user_id, comic_slug, &record.local_path)
            .await?;
        println!(
            "{:<24} {:>3} pages  prev: {:<16} next: {}",
            record.chapter_title,
            pages.len(),
            neighbors.previous.as_ref().map_or("-", |r| r.chapter_title.as_str()),
            neighbors.next.as_ref().map_or("-", |r| r.chapter_title.as_str()),
        );
    }

    Ok(())
}
