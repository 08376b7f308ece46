mod common;

use common::{png_bytes, serve, serve_with};
use offline_chapters::downloader::{temporary_path, ImageDownloader};
use offline_chapters::layout::list_chapter_images;
use offline_chapters::prelude::*;
use reqwest::Client;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

fn chapter_body(addr: SocketAddr, pages: &[&str]) -> Vec<u8> {
    let images: Vec<String> = pages
        .iter()
        .map(|p| format!("http://{addr}/img/{p}"))
        .collect();
    serde_json::json!({
        "data": { "images": images, "title": "whatever" },
        "message": "ok"
    })
    .to_string()
    .into_bytes()
}

#[tokio::test]
async fn chapter_source_reads_image_list() {
    let addr = serve(HashMap::from([(
        "/api/komik/chapter?chapter_url=solo-1".to_string(),
        (
            200,
            "application/json",
            br#"{"data":{"images":["https://cdn/a.jpg","https://cdn/b.jpg"]},"message":"ok"}"#
                .to_vec(),
        ),
    )]))
    .await;
    let source = HttpChapterSource::with_client(Client::new(), format!("http://{addr}/"));

    let images = source.fetch_chapter_images("solo-1").await.unwrap();
    assert_eq!(images, ["https://cdn/a.jpg", "https://cdn/b.jpg"]);
}

#[tokio::test]
async fn chapter_source_surfaces_failures() {
    let addr = serve(HashMap::from([
        (
            "/api/komik/chapter?chapter_url=empty".to_string(),
            (200, "application/json", br#"{"message":"not found"}"#.to_vec()),
        ),
        (
            "/api/komik/chapter?chapter_url=broken".to_string(),
            (200, "application/json", b"{ nope".to_vec()),
        ),
    ]))
    .await;
    let source = HttpChapterSource::with_client(Client::new(), format!("http://{addr}"));

    assert!(source.fetch_chapter_images("gone").await.is_err());
    assert!(source.fetch_chapter_images("empty").await.is_err());
    assert!(source.fetch_chapter_images("broken").await.is_err());
}

#[tokio::test]
async fn image_downloader_stores_jpeg() {
    let addr = serve(HashMap::from([
        ("/img/ok.png".to_string(), (200, "image/png", png_bytes(5, 7))),
        ("/img/html".to_string(), (200, "text/html", b"<html></html>".to_vec())),
        ("/img/huge.png".to_string(), (200, "image/png", png_bytes(64, 64))),
    ]))
    .await;
    let tmp = tempfile::tempdir().unwrap();
    let downloader = ImageDownloader::with_client(Client::new(), 90, 1024 * 1024);

    let dest = tmp.path().join("Downloads/Comic/Chapter_1/image_0.jpg");
    assert!(downloader.download_image(&format!("http://{addr}/img/ok.png"), &dest).await);
    let written = std::fs::read(&dest).unwrap();
    assert_eq!(image::guess_format(&written).unwrap(), image::ImageFormat::Jpeg);
    let decoded = image::load_from_memory(&written).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (5, 7));

    let missing = tmp.path().join("image_1.jpg");
    assert!(!downloader.download_image(&format!("http://{addr}/img/404.png"), &missing).await);
    assert!(!missing.exists());

    let html = tmp.path().join("image_2.jpg");
    assert!(!downloader.download_image(&format!("http://{addr}/img/html"), &html).await);
    assert!(!html.exists());
    assert!(!temporary_path(&html).exists());

    let tiny_limit = ImageDownloader::with_client(Client::new(), 90, 16);
    let huge = tmp.path().join("image_3.jpg");
    assert!(!tiny_limit.download_image(&format!("http://{addr}/img/huge.png"), &huge).await);
    assert!(!huge.exists());
}

#[tokio::test]
async fn batch_over_http_keeps_partial_chapters() {
    let addr = serve_with(|addr| {
        HashMap::from([
            (
                "/api/komik/chapter?chapter_url=ch-1".to_string(),
                (200, "application/json", chapter_body(addr, &["1a.png", "1b.png", "1c.png"])),
            ),
            (
                "/api/komik/chapter?chapter_url=ch-2".to_string(),
                (200, "application/json", chapter_body(addr, &["2a.png", "missing.png", "2c.png"])),
            ),
            (
                "/api/komik/chapter?chapter_url=ch-3".to_string(),
                (200, "application/json", chapter_body(addr, &["missing.png"])),
            ),
            ("/img/1a.png".to_string(), (200, "image/png", png_bytes(4, 4))),
            ("/img/1b.png".to_string(), (200, "image/png", png_bytes(4, 4))),
            ("/img/1c.png".to_string(), (200, "image/png", png_bytes(4, 4))),
            ("/img/2a.png".to_string(), (200, "image/png", png_bytes(4, 4))),
            ("/img/2c.png".to_string(), (200, "image/png", png_bytes(4, 4))),
        ])
    })
    .await;

    let tmp = tempfile::tempdir().unwrap();
    let config = DownloaderConfig {
        storage_root: tmp.path().to_path_buf(),
        database_path: tmp.path().join("downloads.db"),
        api_base_url: format!("http://{addr}"),
        chapter_delay_ms: 0,
        ..DownloaderConfig::default()
    };
    let store = RecordStore::open(&config.database_path).await.unwrap();
    let hub = StatusHub::new();
    let manager = Arc::new(
        DownloadManager::from_config(&config, store.clone(), hub.clone())
            .unwrap()
            .with_notifier(Arc::new(NoopNotifier))
            .with_chapter_delay(Duration::ZERO),
    );

    let chapters = vec![
        ChapterRequest::new("ch-1", "Chapter 1"),
        ChapterRequest::new("ch-2", "Chapter 2"),
        ChapterRequest::new("ch-3", "Chapter 3"),
    ];
    let summary = manager
        .start_download("u1", "tower", "Tower of God", chapters)
        .unwrap()
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 2);
    let records = store.query_by_user_and_comic("u1", "tower").await.unwrap();
    assert_eq!(records.len(), 2);

    let second = list_chapter_images(&records[1].local_path);
    let names: Vec<_> = second
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, ["image_0.jpg", "image_2.jpg"]);
    assert!(records[0]
        .local_path
        .ends_with("Downloads/Tower_of_God/Chapter_1"));
    assert!(hub.snapshot().message.contains("2 of 3"));
}
