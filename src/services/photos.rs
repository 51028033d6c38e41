//! Vehicle photo storage
//!
//! The ticketing core only keeps the references returned here. Failures are
//! reported once as `Upstream` errors; the arrival is not retried.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage, GenericImageView, ImageResult};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::record::ImageRefs,
};

/// Public URL prefix the uploads directory is served under
pub const UPLOADS_URL_PREFIX: &str = "/uploads";

/// Longest side of the stored original; smaller photos are not enlarged
pub const ORIGINAL_MAX_SIDE: u32 = 1280;
/// Longest side of the thumbnail
pub const THUMB_MAX_SIDE: u32 = 360;
const ORIGINAL_QUALITY: u8 = 75;
const THUMB_QUALITY: u8 = 70;

/// An uploaded photo as received from the client
#[derive(Debug, Clone)]
pub struct Photo {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Photo {
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

/// JPEG files derived from one upload
#[derive(Debug)]
pub struct Renditions {
    pub original: Vec<u8>,
    pub thumb: Vec<u8>,
}

/// Decode an upload into a bounded JPEG original and its thumbnail
pub fn render_jpegs(bytes: &[u8]) -> ImageResult<Renditions> {
    let decoded = image::load_from_memory(bytes)?;
    let (width, height) = decoded.dimensions();
    let original = if width > ORIGINAL_MAX_SIDE || height > ORIGINAL_MAX_SIDE {
        decoded.resize(ORIGINAL_MAX_SIDE, ORIGINAL_MAX_SIDE, FilterType::Lanczos3)
    } else {
        decoded
    };
    let thumb = original.resize(THUMB_MAX_SIDE, THUMB_MAX_SIDE, FilterType::Triangle);

    Ok(Renditions {
        original: encode_jpeg(&original, ORIGINAL_QUALITY)?,
        thumb: encode_jpeg(&thumb, THUMB_QUALITY)?,
    })
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> ImageResult<Vec<u8>> {
    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    let mut buffer = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, quality))?;
    Ok(buffer)
}

/// Stores an arrival photo and its thumbnail
#[async_trait]
pub trait PhotoStore: Send + Sync {
    async fn store(&self, record_id: Uuid, photo: &Photo) -> AppResult<ImageRefs>;

    /// Remove files written for an arrival that was rejected afterwards
    async fn discard(&self, refs: &ImageRefs) -> AppResult<()>;
}

/// Writes `{id}.jpg` and `{id}-thumb.jpg` under the uploads directory
#[derive(Debug, Clone)]
pub struct DiskPhotoStore {
    dir: PathBuf,
}

impl DiskPhotoStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for_url(&self, url: &str) -> Option<PathBuf> {
        let name = url.strip_prefix(UPLOADS_URL_PREFIX)?.trim_start_matches('/');
        if name.is_empty() || name.contains('/') || name.contains("..") {
            return None;
        }
        Some(self.dir.join(name))
    }
}

#[async_trait]
impl PhotoStore for DiskPhotoStore {
    async fn store(&self, record_id: Uuid, photo: &Photo) -> AppResult<ImageRefs> {
        let original_name = format!("{}.jpg", record_id);
        let thumb_name = format!("{}-thumb.jpg", record_id);

        // Decoding and resampling are CPU bound
        let bytes = photo.bytes.clone();
        let renditions = tokio::task::spawn_blocking(move || render_jpegs(&bytes))
            .await
            .map_err(|e| AppError::Upstream(format!("Image task failed: {}", e)))?
            .map_err(|e| AppError::Upstream(format!("Cannot process image: {}", e)))?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::Upstream(format!("Cannot create uploads directory: {}", e)))?;

        for (name, bytes) in [(&original_name, &renditions.original), (&thumb_name, &renditions.thumb)] {
            tokio::fs::write(self.dir.join(name), bytes)
                .await
                .map_err(|e| AppError::Upstream(format!("Failed to write {}: {}", name, e)))?;
        }

        Ok(ImageRefs {
            original_url: Some(format!("{}/{}", UPLOADS_URL_PREFIX, original_name)),
            thumb_url: Some(format!("{}/{}", UPLOADS_URL_PREFIX, thumb_name)),
        })
    }

    async fn discard(&self, refs: &ImageRefs) -> AppResult<()> {
        for url in [&refs.original_url, &refs.thumb_url].into_iter().flatten() {
            if let Some(path) = self.path_for_url(url) {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        return Err(AppError::Upstream(format!(
                            "Failed to remove {}: {}",
                            path.display(),
                            e
                        )))
                    }
                }
            }
        }
        Ok(())
    }
}

/// Check that the uploads directory accepts writes
pub async fn uploads_writable(dir: &Path) -> bool {
    let marker = dir.join(".healthcheck");
    let result = async {
        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(&marker, chrono::Utc::now().timestamp_millis().to_string()).await?;
        tokio::fs::remove_file(&marker).await
    }
    .await;

    if let Err(e) = &result {
        tracing::error!(error = %e, dir = %dir.display(), "Uploads directory is not writable");
    }
    result.is_ok()
}
