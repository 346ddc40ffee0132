//! # Page Preview
//!
//! Renders a webpage into a full-size PNG screenshot plus a set of resized
//! thumbnails, stored under a per-job directory.
//!
//! ## Pipeline
//!
//! | Stage | Component | On failure |
//! |-------|-----------|------------|
//! | 1. Job directory | [`JobPaths`] | `ResourceUnavailable` |
//! | 2. Renderer port | [`PortAllocator`] | `ResourceUnavailable` |
//! | 3. Full render | [`RendererLauncher`] / [`Renderer`] | `RenderFailure` |
//! | 4. Thumbnails (concurrent) | [`ThumbnailPipeline`] / [`ImageProcessor`] | `Io` |
//!
//! Each stage starts only after the previous one succeeded. Stage 4 runs one
//! task per output size and waits for all of them before returning. The
//! first failure ends the request; nothing is retried.
//!
//! ## Output layout
//!
//! ```text
//! <parent>/<name>/full.png
//! <parent>/<name>/<size>.png
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use page_preview::{Config, Dimensions, PreviewService, Viewport};
//!
//! #[tokio::main]
//! async fn main() {
//!     let service = PreviewService::new(Config::default()).expect("valid config");
//!
//!     service
//!         .generate_preview(
//!             "http://example.com",
//!             "job1",
//!             "/tmp/previews",
//!             Some(Viewport::new(800, 600)),
//!             Some([("thumb".to_string(), Dimensions::new(100, 75))].into()),
//!             |result| match result {
//!                 Ok(paths) => println!("thumb at {}", paths["thumb"].display()),
//!                 Err(e) => eprintln!("preview failed: {e}"),
//!             },
//!         )
//!         .await;
//! }
//! ```

/// Configuration, dimensions and request types
pub mod config;

/// Error types
pub mod error;

/// Free port discovery for renderer instances
pub mod port;

/// Per-job directory and file paths
pub mod job;

/// Headless browser rendering
pub mod renderer;

/// Image cropping and resizing
pub mod image_processor;

/// Concurrent thumbnail generation
pub mod thumbnail;

/// Main preview service orchestrating the pipeline
pub mod preview_service;

/// Logging setup and formatting helpers
pub mod utils;


pub use config::*;
pub use error::*;
pub use image_processor::*;
pub use job::*;
pub use port::*;
pub use preview_service::*;
pub use renderer::*;
pub use thumbnail::*;
pub use utils::*;
