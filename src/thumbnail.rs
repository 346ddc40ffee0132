//! Parallel thumbnail derivation from the full-size render

use crate::{
    format_bytes, Anchor, CropSpec, Dimensions, ImageProcessor, PreviewError, Viewport,
};
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One thumbnail to produce: its size name, target dimensions and output file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeSpec {
    pub name: String,
    pub dimensions: Dimensions,
    pub path: PathBuf,
}

/// Crops, resizes and verifies thumbnails of one full render
///
/// Every size reads the shared full-size file and writes only its own
/// destination, so sizes run independently of each other.
#[derive(Clone)]
pub struct ThumbnailPipeline {
    processor: Arc<dyn ImageProcessor>,
    full_path: PathBuf,
    viewport: Viewport,
}

impl ThumbnailPipeline {
    pub fn new(processor: Arc<dyn ImageProcessor>, full_path: PathBuf, viewport: Viewport) -> Self {
        Self {
            processor,
            full_path,
            viewport,
        }
    }

    /// Produce one thumbnail and return `(size name, path)` once it is on disk.
    pub async fn process_size(&self, size: &SizeSpec) -> Result<(String, PathBuf), PreviewError> {
        debug!("Generating thumbnail {}", size.path.display());

        let crop = CropSpec {
            width: self.viewport.width,
            height: self.viewport.height,
            x: 0,
            y: 0,
            anchor: Anchor::North,
        };
        self.processor.crop(&self.full_path, &size.path, crop).await?;
        self.processor
            .resize(&size.path, &size.path, size.dimensions)
            .await?;

        let written = verify_written(&size.path).await?;
        debug!(
            "Saved thumbnail {} ({})",
            size.path.display(),
            format_bytes(written)
        );

        Ok((size.name.clone(), size.path.clone()))
    }

    /// Run every size concurrently and wait for all of them
    ///
    /// Returns the first failure in `sizes` order, but only after every task
    /// has finished.
    pub async fn process_all(
        &self,
        sizes: Vec<SizeSpec>,
    ) -> Result<Vec<(String, PathBuf)>, PreviewError> {
        let tasks: Vec<_> = sizes
            .into_iter()
            .map(|size| {
                let pipeline = self.clone();
                tokio::spawn(async move { pipeline.process_size(&size).await })
            })
            .collect();

        let total = tasks.len();
        let mut completed = Vec::with_capacity(total);
        let mut first_error = None;

        for joined in join_all(tasks).await {
            let outcome = joined
                .map_err(|e| PreviewError::Io(format!("thumbnail task aborted: {e}")))
                .and_then(|result| result);

            match outcome {
                Ok(entry) => completed.push(entry),
                Err(e) => {
                    warn!("Thumbnail generation failed: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        info!("Thumbnails complete: {}/{} succeeded", completed.len(), total);

        match first_error {
            Some(e) => Err(e),
            None => Ok(completed),
        }
    }
}

async fn verify_written(path: &Path) -> Result<usize, PreviewError> {
    let data = tokio::fs::read(path)
        .await
        .map_err(|e| PreviewError::Io(format!("cannot read {}: {e}", path.display())))?;

    if data.is_empty() {
        return Err(PreviewError::Io(format!("{} is empty", path.display())));
    }

    Ok(data.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Writes a fixed payload instead of decoding images.
    #[derive(Default)]
    struct StubProcessor {
        resize_payload: Vec<u8>,
        crops: Mutex<Vec<CropSpec>>,
    }

    #[async_trait]
    impl ImageProcessor for StubProcessor {
        async fn crop(&self, _src: &Path, dst: &Path, crop: CropSpec) -> Result<(), PreviewError> {
            self.crops.lock().unwrap().push(crop);
            tokio::fs::write(dst, b"cropped").await?;
            Ok(())
        }

        async fn resize(&self, _src: &Path, dst: &Path, _size: Dimensions) -> Result<(), PreviewError> {
            tokio::fs::write(dst, &self.resize_payload).await?;
            Ok(())
        }
    }

    fn size(dir: &Path, name: &str) -> SizeSpec {
        SizeSpec {
            name: name.to_string(),
            dimensions: Dimensions::new(10, 10),
            path: dir.join(format!("{name}.png")),
        }
    }

    #[tokio::test]
    async fn test_crop_uses_viewport_and_north_anchor() {
        let temp_dir = tempfile::tempdir().unwrap();
        let processor = Arc::new(StubProcessor {
            resize_payload: b"resized".to_vec(),
            ..Default::default()
        });
        let pipeline = ThumbnailPipeline::new(
            processor.clone(),
            temp_dir.path().join("full.png"),
            Viewport::new(800, 600),
        );

        let (name, path) = pipeline.process_size(&size(temp_dir.path(), "thumb")).await.unwrap();
        assert_eq!(name, "thumb");
        assert_eq!(path, temp_dir.path().join("thumb.png"));

        let crops = processor.crops.lock().unwrap();
        assert_eq!(
            crops[0],
            CropSpec {
                width: 800,
                height: 600,
                x: 0,
                y: 0,
                anchor: Anchor::North
            }
        );
    }

    #[tokio::test]
    async fn test_empty_output_is_io_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let pipeline = ThumbnailPipeline::new(
            Arc::new(StubProcessor::default()),
            temp_dir.path().join("full.png"),
            Viewport::default(),
        );

        let err = pipeline
            .process_size(&size(temp_dir.path(), "small"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[tokio::test]
    async fn test_process_all_collects_every_size() {
        let temp_dir = tempfile::tempdir().unwrap();
        let pipeline = ThumbnailPipeline::new(
            Arc::new(StubProcessor {
                resize_payload: b"resized".to_vec(),
                ..Default::default()
            }),
            temp_dir.path().join("full.png"),
            Viewport::default(),
        );

        let sizes = ["a", "b", "c"].map(|n| size(temp_dir.path(), n)).to_vec();
        let mut done = pipeline.process_all(sizes).await.unwrap();
        done.sort();
        let names: Vec<_> = done.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn test_process_all_empty() {
        let pipeline = ThumbnailPipeline::new(
            Arc::new(StubProcessor::default()),
            PathBuf::from("/nonexistent/full.png"),
            Viewport::default(),
        );
        let done = tokio_test::block_on(pipeline.process_all(Vec::new())).unwrap();
        assert!(done.is_empty());
    }
}
