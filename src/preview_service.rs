//! Preview service orchestrating the render pipeline
//!
//! A request moves through fixed stages, each gated on the previous one:
//! job directory, renderer port, full-page render, then one concurrent
//! thumbnail task per output size. Any failure ends the request; there are
//! no partial results and no retries.

use crate::{
    format_duration, ChromeLauncher, Config, ImageProcessor, JobPaths, LocalPortAllocator,
    OutputSizes, PageStatus, PortAllocator, PreparedRequest, PreviewError, PreviewRequest,
    RasterProcessor, Renderer, RendererLauncher, ResultMap, SizeSpec, ThumbnailPipeline,
    Viewport,
};
use dashmap::DashMap;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, info_span, Instrument};

/// Renders pages into a full-size PNG plus named thumbnails
///
/// Requests for different jobs run fully in parallel. Two requests for the
/// same job path are serialized so they never write the same files at once.
///
/// # Examples
///
/// ```rust,no_run
/// use page_preview::{Config, PreviewRequest, PreviewService, Viewport};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let service = PreviewService::new(Config::default())?;
///
///     let request = PreviewRequest::new("https://example.com", "job1", "/tmp/previews")
///         .with_viewport(Viewport::new(800, 600));
///     let paths = service.generate(request).await?;
///     println!("Full render at {}", paths["full"].display());
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct PreviewService {
    config: Config,
    launcher: Arc<dyn RendererLauncher>,
    processor: Arc<dyn ImageProcessor>,
    ports: Arc<dyn PortAllocator>,
    job_locks: Arc<DashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl PreviewService {
    /// Service backed by headless Chromium and the `image` crate.
    pub fn new(config: Config) -> Result<Self, PreviewError> {
        config.validate()?;

        Ok(Self::with_backends(
            config.clone(),
            Arc::new(ChromeLauncher::new(config)),
            Arc::new(RasterProcessor::new()),
            Arc::new(LocalPortAllocator),
        ))
    }

    pub fn with_backends(
        config: Config,
        launcher: Arc<dyn RendererLauncher>,
        processor: Arc<dyn ImageProcessor>,
        ports: Arc<dyn PortAllocator>,
    ) -> Self {
        Self {
            config,
            launcher,
            processor,
            ports,
            job_locks: Arc::new(DashMap::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Callback form of [`PreviewService::generate`]
    ///
    /// `callback` is invoked exactly once, with either the result map or the
    /// error that ended the request.
    pub async fn generate_preview<F>(
        &self,
        url: &str,
        name: &str,
        parent_directory: impl Into<PathBuf>,
        viewport: Option<Viewport>,
        output_sizes: Option<OutputSizes>,
        callback: F,
    ) where
        F: FnOnce(Result<ResultMap, PreviewError>),
    {
        let request = PreviewRequest {
            viewport,
            output_sizes,
            ..PreviewRequest::new(url, name, parent_directory)
        };

        callback(self.generate(request).await);
    }

    /// Generate a preview from a loosely typed JSON request.
    pub async fn generate_from_value(&self, value: &Value) -> Result<ResultMap, PreviewError> {
        self.generate(PreviewRequest::from_value(value)?).await
    }

    pub async fn generate(&self, request: PreviewRequest) -> Result<ResultMap, PreviewError> {
        let prepared = request.prepare(&self.config)?;

        let span = info_span!(
            "preview",
            id = %prepared.id,
            job = %prepared.job_path.display()
        );
        self.run_serialized(prepared).instrument(span).await
    }

    async fn run_serialized(&self, prepared: PreparedRequest) -> Result<ResultMap, PreviewError> {
        let start_time = Instant::now();

        let lock = self.job_lock(&prepared.job_path);
        let result = {
            let _guard = lock.lock().await;
            self.run_stages(&prepared).await
        };
        drop(lock);
        self.job_locks
            .remove_if(&prepared.job_path, |_, lock| Arc::strong_count(lock) == 1);

        match &result {
            Ok(paths) => info!(
                "Preview of {} complete: {} files in {}",
                prepared.url,
                paths.len(),
                format_duration(start_time.elapsed())
            ),
            Err(e) => error!("Preview of {} failed: {}", prepared.url, e),
        }

        result
    }

    async fn run_stages(&self, prepared: &PreparedRequest) -> Result<ResultMap, PreviewError> {
        let mut paths = JobPaths::new(&prepared.job_path);
        paths.ensure_job_directory().await?;

        let port = self.ports.allocate()?;
        info!("Renderer port = {}", port);

        let full_path = paths.full_path();
        self.render(port, &prepared.url, &prepared.viewport, &full_path)
            .await?;

        let sizes: Vec<SizeSpec> = prepared
            .output_sizes
            .iter()
            .map(|(name, dimensions)| SizeSpec {
                name: name.clone(),
                dimensions: *dimensions,
                path: paths.path_for(name),
            })
            .collect();

        if sizes.is_empty() {
            debug!("No output sizes requested");
            return Ok(paths.into_result_map());
        }

        let pipeline = ThumbnailPipeline::new(self.processor.clone(), full_path, prepared.viewport);
        for (name, path) in pipeline.process_all(sizes).await? {
            debug!("{} -> {}", name, path.display());
        }

        Ok(paths.into_result_map())
    }

    /// Launch a renderer, capture the page, and always close the renderer.
    async fn render(
        &self,
        port: u16,
        url: &str,
        viewport: &Viewport,
        output: &Path,
    ) -> Result<(), PreviewError> {
        let limit = self.config.render_timeout;

        let mut renderer = timeout(limit, self.launcher.launch(port))
            .await
            .map_err(|_| PreviewError::render_timeout(limit))??;

        let result = timeout(limit, capture(renderer.as_mut(), url, viewport, output))
            .await
            .map_err(|_| PreviewError::render_timeout(limit))
            .and_then(|captured| captured);

        renderer.close().await;
        result
    }

    fn job_lock(&self, job_path: &Path) -> Arc<Mutex<()>> {
        self.job_locks
            .entry(job_path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }
}

async fn capture(
    renderer: &mut dyn Renderer,
    url: &str,
    viewport: &Viewport,
    output: &Path,
) -> Result<(), PreviewError> {
    let status = renderer.open(url, viewport).await?;
    info!("Opened page {} ({:?})", url, status);

    if status != PageStatus::Success {
        return Err(PreviewError::RenderFailure(format!("failed to open {url}")));
    }

    renderer.render_to_file(output).await?;
    info!("Full render saved to {}", output.display());
    Ok(())
}
