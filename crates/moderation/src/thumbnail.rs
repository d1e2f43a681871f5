//! Asynchronous thumbnail generation.
//!
//! Intake stores the full image and points `thumbnail_url` at it. The
//! [`ThumbnailWorker`] picks up `Submitted` events, produces a JPEG no larger
//! than 400x400 and re-points the record. Failures leave the placeholder.

use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use image::GenericImageView;
use image::codecs::jpeg::JpegEncoder;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use farmgate_core::{Dimensions, PhotoEvent, PhotoSubmission};

use crate::error::ModerationError;
use crate::service::PhotoService;

/// A generated thumbnail plus the size of the image it was made from.
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub data: Bytes,
    pub source: Dimensions,
}

/// Produces thumbnails from encoded image bytes.
///
/// Called from a blocking thread, so implementations may do CPU-heavy work.
pub trait Thumbnailer: Send + Sync {
    fn generate(&self, image: &[u8]) -> Result<Thumbnail, ModerationError>;
}

/// [`Thumbnailer`] backed by the `image` crate.
#[derive(Debug, Clone)]
pub struct ImageThumbnailer {
    pub max_width: u32,
    pub max_height: u32,
    /// JPEG quality, 1-100.
    pub quality: u8,
}

impl Default for ImageThumbnailer {
    fn default() -> Self {
        Self {
            max_width: 400,
            max_height: 400,
            quality: 80,
        }
    }
}

impl Thumbnailer for ImageThumbnailer {
    fn generate(&self, image: &[u8]) -> Result<Thumbnail, ModerationError> {
        let img = image::load_from_memory(image)
            .map_err(|e| ModerationError::Image(format!("decode failed: {e}")))?;
        let (width, height) = img.dimensions();

        let scaled = if width <= self.max_width && height <= self.max_height {
            img
        } else {
            img.thumbnail(self.max_width, self.max_height)
        };

        let mut out = Cursor::new(Vec::new());
        scaled
            .to_rgb8()
            .write_with_encoder(JpegEncoder::new_with_quality(&mut out, self.quality))
            .map_err(|e| ModerationError::Image(format!("encode failed: {e}")))?;

        Ok(Thumbnail {
            data: Bytes::from(out.into_inner()),
            source: Dimensions { width, height },
        })
    }
}

/// Consumes `Submitted` events and attaches thumbnails.
pub struct ThumbnailWorker {
    service: Arc<PhotoService>,
    thumbnailer: Arc<dyn Thumbnailer>,
}

impl ThumbnailWorker {
    pub fn new(service: Arc<PhotoService>, thumbnailer: Arc<dyn Thumbnailer>) -> Self {
        Self {
            service,
            thumbnailer,
        }
    }

    /// Generate and attach a thumbnail for one photo.
    pub async fn process(&self, photo: &PhotoSubmission) -> Result<PhotoSubmission, ModerationError> {
        let original = self.service.admin_image(&photo.id).await?;
        let thumbnailer = Arc::clone(&self.thumbnailer);
        let thumbnail = tokio::task::spawn_blocking(move || thumbnailer.generate(&original.data))
            .await
            .map_err(|e| ModerationError::Image(format!("thumbnail task failed: {e}")))??;

        let size = thumbnail.data.len();
        let updated = self
            .service
            .attach_thumbnail(&photo.id, thumbnail.data, thumbnail.source)
            .await?;
        debug!(photo_id = %photo.id, size, "thumbnail attached");
        Ok(updated)
    }

    /// Run until shutdown is signalled or the event bus closes.
    pub async fn run(
        self,
        mut events: broadcast::Receiver<PhotoEvent>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        info!("thumbnail worker starting");
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("thumbnail worker received shutdown signal");
                    break;
                }
                received = events.recv() => match received {
                    Ok(PhotoEvent::Submitted { photo }) => self.handle(&photo).await,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "thumbnail worker lagged behind the event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
        info!("thumbnail worker stopped");
    }

    async fn handle(&self, photo: &PhotoSubmission) {
        match self.process(photo).await {
            Ok(_) => self.service.metrics().increment_thumbnails_generated(),
            Err(e) => {
                self.service.metrics().increment_thumbnails_failed();
                warn!(photo_id = %photo.id, error = %e, "thumbnail generation failed, keeping full image");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::tests::{png_bytes, valid_submission};
    use farmgate_blob::MemoryBlobStore;
    use farmgate_core::PhotoStatus;
    use farmgate_state_memory::MemoryStateStore;

    fn service() -> Arc<PhotoService> {
        Arc::new(
            PhotoService::builder()
                .state(Arc::new(MemoryStateStore::new()))
                .blobs(Arc::new(MemoryBlobStore::new()))
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn large_images_are_scaled_to_fit() {
        let thumb = ImageThumbnailer::default()
            .generate(&png_bytes(1200, 600))
            .unwrap();
        assert_eq!(
            thumb.source,
            Dimensions {
                width: 1200,
                height: 600
            }
        );
        let decoded = image::load_from_memory(&thumb.data).unwrap();
        assert_eq!(decoded.dimensions(), (400, 200));
        assert_eq!(
            image::guess_format(&thumb.data).unwrap(),
            image::ImageFormat::Jpeg
        );
    }

    #[test]
    fn small_images_are_not_enlarged() {
        let thumb = ImageThumbnailer::default()
            .generate(&png_bytes(120, 80))
            .unwrap();
        let decoded = image::load_from_memory(&thumb.data).unwrap();
        assert_eq!(decoded.dimensions(), (120, 80));
    }

    #[test]
    fn garbage_is_an_image_error() {
        let err = ImageThumbnailer::default()
            .generate(b"not an image")
            .unwrap_err();
        assert!(matches!(err, ModerationError::Image(_)));
    }

    #[tokio::test]
    async fn worker_repoints_thumbnail_url() {
        let service = service();
        let mut input = valid_submission();
        input.photo_data = crate::validation::tests::data_url("image/png", &png_bytes(800, 800));
        let photo = service.submit(input).await.unwrap();
        assert_eq!(photo.thumbnail_url, photo.photo_url);

        let worker = ThumbnailWorker::new(Arc::clone(&service), Arc::new(ImageThumbnailer::default()));
        let updated = worker.process(&photo).await.unwrap();
        assert_eq!(updated.thumbnail_url, format!("/v1/photos/{}/thumbnail", photo.id));
        assert_eq!(updated.status, PhotoStatus::Pending);

        service
            .moderate(&photo.id, &farmgate_core::ModerationDecision::Approve, None)
            .await
            .unwrap();
        let thumb = service.public_thumbnail(&photo.id).await.unwrap();
        assert_eq!(thumb.content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let service = service();
        let worker = ThumbnailWorker::new(Arc::clone(&service), Arc::new(ImageThumbnailer::default()));
        let (tx, rx) = mpsc::channel(1);
        let handle = tokio::spawn(worker.run(service.subscribe(), rx));
        tx.send(()).await.unwrap();
        handle.await.unwrap();
    }
}
