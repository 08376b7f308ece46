#![allow(dead_code)]

use async_trait::async_trait;
use offline_chapters::downloader::PageWriter;
use offline_chapters::models::DownloadStatus;
use offline_chapters::notify::{Notifier, NotifyError};
use offline_chapters::progress::StatusHub;
use offline_chapters::source::{ChapterSource, SourceError};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

/// Chapter source answering from a fixed table. Unknown chapters fail.
#[derive(Default)]
pub struct FakeSource {
    pages: HashMap<String, Vec<String>>,
    gate: Option<Arc<Semaphore>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chapter(mut self, id: &str, page_count: usize) -> Self {
        let urls = (0..page_count)
            .map(|i| format!("https://cdn.test/{id}/{i}.png"))
            .collect();
        self.pages.insert(id.to_string(), urls);
        self
    }

    /// Every fetch waits for a permit on `gate`.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }
}

#[async_trait]
impl ChapterSource for FakeSource {
    async fn fetch_chapter_images(&self, chapter_id: &str) -> Result<Vec<String>, SourceError> {
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        self.pages
            .get(chapter_id)
            .cloned()
            .ok_or_else(|| SourceError::MissingData(format!("no chapter {chapter_id}")))
    }
}

/// Writes a small placeholder file per page; URLs containing any of the
/// `failing` fragments are reported as failures and URLs containing any of the
/// `panicking` fragments panic. Records the progress value visible at each
/// page write.
#[derive(Default)]
pub struct FakeWriter {
    failing: HashSet<String>,
    panicking: HashSet<String>,
    hub: Option<StatusHub>,
    pub seen_progress: Mutex<Vec<u8>>,
    pub attempts: Mutex<Vec<String>>,
}

impl FakeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, fragment: &str) -> Self {
        self.failing.insert(fragment.to_string());
        self
    }

    pub fn panicking(mut self, fragment: &str) -> Self {
        self.panicking.insert(fragment.to_string());
        self
    }

    pub fn observing(mut self, hub: StatusHub) -> Self {
        self.hub = Some(hub);
        self
    }
}

#[async_trait]
impl PageWriter for FakeWriter {
    async fn save_page(&self, url: &str, dest: &Path) -> bool {
        self.attempts.lock().unwrap().push(url.to_string());
        if let Some(hub) = &self.hub {
            self.seen_progress.lock().unwrap().push(hub.snapshot().progress);
        }
        if self.panicking.iter().any(|f| url.contains(f.as_str())) {
            panic!("writer blew up on {url}");
        }
        if self.failing.iter().any(|f| url.contains(f.as_str())) {
            return false;
        }
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        std::fs::write(dest, url.as_bytes()).is_ok()
    }
}

/// Keeps every notification it receives.
#[derive(Default)]
pub struct RecordingNotifier {
    pub progress: Mutex<Vec<(usize, usize, String)>>,
    pub completed: Mutex<Vec<usize>>,
}

impl Notifier for RecordingNotifier {
    fn notify_progress(&self, total: usize, current: usize, label: &str) -> Result<(), NotifyError> {
        self.progress
            .lock()
            .unwrap()
            .push((total, current, label.to_string()));
        Ok(())
    }

    fn notify_complete(&self, success_count: usize) -> Result<(), NotifyError> {
        self.completed.lock().unwrap().push(success_count);
        Ok(())
    }
}

/// Refuses every notification, like a device without the permission.
pub struct DeniedNotifier;

impl Notifier for DeniedNotifier {
    fn notify_progress(&self, _: usize, _: usize, _: &str) -> Result<(), NotifyError> {
        Err(NotifyError::PermissionDenied)
    }

    fn notify_complete(&self, _: usize) -> Result<(), NotifyError> {
        Err(NotifyError::PermissionDenied)
    }
}

pub async fn wait_for_chapter(hub: &StatusHub, index: usize) -> DownloadStatus {
    let mut rx = hub.subscribe();
    let status = rx
        .wait_for(|s| s.current_chapter_index == index)
        .await
        .expect("status channel closed")
        .clone();
    status
}

pub type Routes = HashMap<String, (u16, &'static str, Vec<u8>)>;

/// Serves fixed `(status, content type, body)` responses by request path
/// (query included) over plain HTTP/1.1. Unknown paths get a 404.
pub async fn serve(routes: Routes) -> SocketAddr {
    serve_with(|_| routes).await
}

/// Like [`serve`], with routes built from the bound address so bodies can
/// link back to the server.
pub async fn serve_with(build: impl FnOnce(SocketAddr) -> Routes) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let routes = Arc::new(build(addr));

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let routes = Arc::clone(&routes);
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let mut read = 0;
                loop {
                    let n = socket.read(&mut buf[read..]).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    read += n;
                    if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") || read == buf.len() {
                        break;
                    }
                }

                let request = String::from_utf8_lossy(&buf[..read]);
                let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                let (status, content_type, body) = routes
                    .get(&path)
                    .cloned()
                    .unwrap_or((404, "text/plain", b"not found".to_vec()));

                let head = format!(
                    "HTTP/1.1 {status} X\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&body).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([30, 120, 200]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}
