//! Cropping and resizing of rendered images

use crate::{Dimensions, PreviewError};
use async_trait::async_trait;
use image::imageops::FilterType;
use image::ImageFormat;
use std::path::{Path, PathBuf};

/// Where a crop box sits before its origin offset is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Top-left corner
    NorthWest,
    /// Top edge, centred horizontally
    North,
    Center,
}

/// Crop box for [`ImageProcessor::crop`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropSpec {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
    pub anchor: Anchor,
}

impl CropSpec {
    /// Region `(x, y, width, height)` of an image of the given size, clamped
    /// to its bounds.
    pub fn region(&self, image_width: u32, image_height: u32) -> (u32, u32, u32, u32) {
        let width = self.width.min(image_width);
        let height = self.height.min(image_height);

        let (base_x, base_y) = match self.anchor {
            Anchor::NorthWest => (0, 0),
            Anchor::North => ((image_width - width) / 2, 0),
            Anchor::Center => ((image_width - width) / 2, (image_height - height) / 2),
        };

        let x = base_x.saturating_add(self.x).min(image_width - width);
        let y = base_y.saturating_add(self.y).min(image_height - height);
        (x, y, width, height)
    }
}

#[async_trait]
pub trait ImageProcessor: Send + Sync {
    async fn crop(&self, src: &Path, dst: &Path, crop: CropSpec) -> Result<(), PreviewError>;

    /// Resize `src` to exactly `size`; `src` and `dst` may be the same file.
    async fn resize(&self, src: &Path, dst: &Path, size: Dimensions) -> Result<(), PreviewError>;
}

/// PNG crop/resize backed by the `image` crate
///
/// Decoding and encoding run on the blocking pool.
#[derive(Debug, Clone)]
pub struct RasterProcessor {
    filter: FilterType,
}

impl RasterProcessor {
    pub fn new() -> Self {
        Self {
            filter: FilterType::Lanczos3,
        }
    }

    pub fn with_filter(filter: FilterType) -> Self {
        Self { filter }
    }
}

impl Default for RasterProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageProcessor for RasterProcessor {
    async fn crop(&self, src: &Path, dst: &Path, crop: CropSpec) -> Result<(), PreviewError> {
        let (src, dst) = (src.to_path_buf(), dst.to_path_buf());

        run_blocking(move || {
            let img = image::open(&src)?;
            if img.width() == 0 || img.height() == 0 {
                return Err(PreviewError::Io(format!("{} is empty", src.display())));
            }

            let (x, y, width, height) = crop.region(img.width(), img.height());
            img.crop_imm(x, y, width, height)
                .save_with_format(&dst, ImageFormat::Png)?;
            Ok(())
        })
        .await
    }

    async fn resize(&self, src: &Path, dst: &Path, size: Dimensions) -> Result<(), PreviewError> {
        let (src, dst): (PathBuf, PathBuf) = (src.to_path_buf(), dst.to_path_buf());
        let filter = self.filter;

        run_blocking(move || {
            image::open(&src)?
                .resize_exact(size.width, size.height, filter)
                .save_with_format(&dst, ImageFormat::Png)?;
            Ok(())
        })
        .await
    }
}

async fn run_blocking<F>(f: F) -> Result<(), PreviewError>
where
    F: FnOnce() -> Result<(), PreviewError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PreviewError::Io(format!("image task aborted: {e}")))?
}
