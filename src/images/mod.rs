//! Image transform pipeline: download, crop, resize, store.
//!
//! Work enters through three priority queues (1 highest) drained by a
//! single dispatcher into semaphore-bounded download tasks, so one item's
//! photo batch cannot starve another's and a burst of background jobs
//! cannot crowd out a foreground request. Every slot degrades
//! independently: a URL that exhausts its retries resolves to `None`
//! without touching its siblings.

mod transform;

pub use transform::{encode_webp, transform, CropProfile, MAX_HEIGHT, MAX_WIDTH};

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use reqwest::StatusCode;
use tokio::sync::{oneshot, Notify, Semaphore};
use uuid::Uuid;

use crate::config::Settings;
use crate::lanes::LanePool;
use crate::models::{ProcessedAsset, RawCrawlResult};

/// Number of priority levels (1 = highest).
pub const PRIORITY_LEVELS: usize = 3;

/// A successfully stored image.
#[derive(Debug, Clone)]
pub struct StoredImage {
    /// Public path, e.g. `/images/products/<name>.webp`.
    pub path: String,
    pub width: u32,
    pub height: u32,
}

struct ImageTask {
    url: String,
    folder: String,
    crop: CropProfile,
    priority: usize,
    attempt: u32,
    tx: oneshot::Sender<Option<StoredImage>>,
}

#[derive(Debug, thiserror::Error)]
enum FetchError {
    #[error("no lanes available")]
    NoLanes,
    #[error("upstream returned 404")]
    NotFound,
    #[error("upstream returned {0}")]
    Status(u16),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Decode(#[from] image::ImageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Shared download/transform/store pipeline.
#[derive(Clone)]
pub struct ImagePipeline {
    inner: Arc<PipelineInner>,
}

struct PipelineInner {
    pool: Arc<LanePool>,
    images_dir: PathBuf,
    queues: Mutex<Vec<VecDeque<ImageTask>>>,
    notify: Notify,
    semaphore: Arc<Semaphore>,
    max_retries: u32,
    closed: AtomicBool,
}

impl ImagePipeline {
    /// Create the pipeline and spawn its dispatcher.
    pub fn new(pool: Arc<LanePool>, settings: &Settings) -> Self {
        let inner = Arc::new(PipelineInner {
            pool,
            images_dir: settings.images_dir.clone(),
            queues: Mutex::new((0..PRIORITY_LEVELS).map(|_| VecDeque::new()).collect()),
            notify: Notify::new(),
            semaphore: Arc::new(Semaphore::new(settings.concurrent_downloads.max(1))),
            max_retries: settings.image_max_retries.max(1),
            closed: AtomicBool::new(false),
        });

        let dispatcher = inner.clone();
        tokio::spawn(async move {
            dispatcher.run().await;
        });

        Self { inner }
    }

    /// Queue one URL and receive its slot when processing finishes.
    pub fn enqueue(
        &self,
        url: &str,
        folder: &str,
        priority: u8,
        crop: CropProfile,
    ) -> oneshot::Receiver<Option<StoredImage>> {
        let (tx, rx) = oneshot::channel();
        let slot = (priority.clamp(1, PRIORITY_LEVELS as u8) as usize) - 1;
        self.inner.push(ImageTask {
            url: url.to_string(),
            folder: folder.to_string(),
            crop,
            priority: slot,
            attempt: 0,
            tx,
        });
        rx
    }

    /// Process all of one crawl result's photos, order preserved: the
    /// primary image slot first, then the additional images.
    pub async fn process_item_images(
        &self,
        raw: &RawCrawlResult,
        folder: &str,
        priority: u8,
        crop: CropProfile,
    ) -> Vec<ProcessedAsset> {
        let mut urls = Vec::new();
        if let Some(url) = &raw.image {
            urls.push(url.clone());
        }
        urls.extend(raw.additional_images.iter().cloned());

        let receivers: Vec<_> = urls
            .iter()
            .map(|url| self.enqueue(url, folder, priority, crop))
            .collect();
        let outcomes = futures::future::join_all(receivers).await;

        urls.into_iter()
            .zip(outcomes)
            .map(|(url, outcome)| {
                let stored = outcome.unwrap_or(None);
                ProcessedAsset {
                    crop_applied: crop != CropProfile::None && stored.is_some(),
                    stored_path: stored.as_ref().map(|s| s.path.clone()),
                    width: stored.as_ref().map(|s| s.width),
                    height: stored.as_ref().map(|s| s.height),
                    original_url: url,
                }
            })
            .collect()
    }

    /// Stop the dispatcher and drop all queued work. Idempotent.
    ///
    /// Queued and late-enqueued tasks have their senders dropped, which
    /// callers already see as a failed slot.
    pub fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::Release);
        for queue in self.inner.queues.lock().unwrap().iter_mut() {
            queue.clear();
        }
        self.inner.notify.notify_one();
    }
}

impl PipelineInner {
    fn push(&self, task: ImageTask) {
        let mut queues = self.queues.lock().unwrap();
        // Checked under the queue lock so shutdown's drain cannot miss a
        // concurrent push; a dropped task resolves its receiver.
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        queues[task.priority].push_back(task);
        drop(queues);
        self.notify.notify_one();
    }

    fn pop_next(&self) -> Option<ImageTask> {
        let mut queues = self.queues.lock().unwrap();
        queues.iter_mut().find_map(|q| q.pop_front())
    }

    async fn run(self: Arc<Self>) {
        loop {
            if self.closed.load(Ordering::Acquire) {
                break;
            }
            match self.pop_next() {
                Some(task) => {
                    let permit = self
                        .semaphore
                        .clone()
                        .acquire_owned()
                        .await
                        .expect("pipeline semaphore closed");
                    let inner = self.clone();
                    tokio::spawn(async move {
                        inner.process(task).await;
                        drop(permit);
                    });
                }
                None => self.notify.notified().await,
            }
        }
    }

    async fn process(&self, mut task: ImageTask) {
        match self.fetch_and_store(&task).await {
            Ok(stored) => {
                let _ = task.tx.send(Some(stored));
            }
            Err(FetchError::NotFound) => {
                // A 404 gets exactly one extra attempt; the image may not
                // be published on the source CDN yet.
                if task.attempt == 0 {
                    task.attempt = 1;
                    self.push(task);
                } else {
                    tracing::warn!(url = %task.url, "image gone upstream, slot degrades to null");
                    let _ = task.tx.send(None);
                }
            }
            Err(err) => {
                tracing::warn!(url = %task.url, attempt = task.attempt, error = %err, "image fetch failed");
                if task.attempt + 1 < self.max_retries {
                    task.attempt += 1;
                    self.push(task);
                } else {
                    let _ = task.tx.send(None);
                }
            }
        }
    }

    async fn fetch_and_store(&self, task: &ImageTask) -> Result<StoredImage, FetchError> {
        // Each attempt takes the next lane, so a flaky proxy only costs
        // one retry.
        let lane = self.pool.checkout().ok_or(FetchError::NoLanes)?;
        let response = lane.client.get(&task.url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound);
        }
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }
        let bytes = response.bytes().await?;

        // Decode/transform/encode are CPU-bound; keep them off the
        // request path.
        let crop = task.crop;
        let (encoded, width, height) =
            tokio::task::spawn_blocking(move || -> Result<_, image::ImageError> {
                let img = transform(image::load_from_memory(&bytes)?, crop);
                let data = encode_webp(&img)?;
                Ok((data, img.width(), img.height()))
            })
            .await
            .map_err(|err| FetchError::Io(std::io::Error::other(err)))??;

        let dir = self.images_dir.join(&task.folder);
        tokio::fs::create_dir_all(&dir).await?;

        let suffix = task
            .crop
            .suffix()
            .map(|tag| format!("_{tag}"))
            .unwrap_or_default();
        let file_name = format!(
            "{}_{}{}.webp",
            Utc::now().format("%Y-%m-%dT%H-%M-%S"),
            Uuid::new_v4(),
            suffix
        );
        tokio::fs::write(dir.join(&file_name), encoded).await?;

        Ok(StoredImage {
            path: format!("/images/{}/{}", task.folder, file_name),
            width,
            height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::header;
    use axum::routing::get;
    use axum::Router;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::DynamicImage::ImageRgba8(image::RgbaImage::new(width, height));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    /// Local fixture server: serves a PNG for any name except `missing`.
    async fn spawn_image_server() -> String {
        let app = Router::new().route(
            "/img/:name",
            get(|Path(name): Path<String>| async move {
                if name == "missing" {
                    Err(axum::http::StatusCode::NOT_FOUND)
                } else {
                    Ok(([(header::CONTENT_TYPE, "image/png")], png_bytes(800, 700)))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn test_pipeline(images_dir: std::path::PathBuf) -> ImagePipeline {
        let settings = Settings {
            images_dir,
            concurrent_downloads: 4,
            image_max_retries: 2,
            ..Settings::default()
        };
        let pool = Arc::new(LanePool::new(&settings).unwrap());
        ImagePipeline::new(pool, &settings)
    }

    #[tokio::test]
    async fn batch_keeps_order_and_degrades_single_slot() {
        let base = spawn_image_server().await;
        let dir = tempfile::tempdir().unwrap();
        let pipeline = test_pipeline(dir.path().to_path_buf());

        let raw = RawCrawlResult {
            image: Some(format!("{base}/img/main.png")),
            additional_images: vec![
                format!("{base}/img/a.png"),
                format!("{base}/img/missing"),
                format!("{base}/img/b.png"),
                format!("{base}/img/c.png"),
            ],
            ..Default::default()
        };

        let assets = pipeline
            .process_item_images(&raw, "products", 1, CropProfile::None)
            .await;

        assert_eq!(assets.len(), 5);
        assert!(assets[0].stored_path.is_some());
        assert!(assets[1].stored_path.is_some());
        assert!(assets[2].stored_path.is_none(), "404 slot degrades to null");
        assert!(assets[3].stored_path.is_some());
        assert!(assets[4].stored_path.is_some());
        assert!(assets[2].original_url.ends_with("/missing"));

        // Stored images were shrunk into the size box and live on disk.
        assert_eq!(assets[0].width, Some(600));
        let stored = assets[0].stored_path.as_ref().unwrap();
        let on_disk = dir
            .path()
            .join("products")
            .join(stored.rsplit('/').next().unwrap());
        assert!(on_disk.exists());
    }

    #[tokio::test]
    async fn brand_crop_reflected_in_asset_and_name() {
        let base = spawn_image_server().await;
        let dir = tempfile::tempdir().unwrap();
        let pipeline = test_pipeline(dir.path().to_path_buf());

        let raw = RawCrawlResult {
            image: Some(format!("{base}/img/main.png")),
            ..Default::default()
        };
        let assets = pipeline
            .process_item_images(&raw, "products", 1, CropProfile::Brand)
            .await;

        assert_eq!(assets.len(), 1);
        assert!(assets[0].crop_applied);
        assert!(assets[0].stored_path.as_ref().unwrap().contains("_brand.webp"));
    }

    #[tokio::test]
    async fn shutdown_fails_new_slots_instead_of_queueing() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = test_pipeline(dir.path().to_path_buf());

        pipeline.shutdown();
        pipeline.shutdown();

        let rx = pipeline.enqueue(
            "http://127.0.0.1:1/late.png",
            "products",
            1,
            CropProfile::None,
        );
        assert!(rx.await.is_err(), "slot resolves instead of hanging");
    }

    #[tokio::test]
    async fn unreachable_host_resolves_null_after_retries() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = test_pipeline(dir.path().to_path_buf());

        // Port 1 on loopback refuses the connection immediately.
        let rx = pipeline.enqueue(
            "http://127.0.0.1:1/none.png",
            "products",
            3,
            CropProfile::None,
        );
        assert!(rx.await.unwrap().is_none());
    }
}
