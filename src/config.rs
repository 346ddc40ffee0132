//! Configuration and request types for preview generation
//!
//! This module holds the service [`Config`], the dimension types shared by the
//! renderer and the thumbnail pipeline, and [`PreviewRequest`] together with
//! the defaulting rules applied before a request is processed.

use crate::PreviewError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// Name of the implicit size holding the unscaled render
pub const FULL_SIZE_NAME: &str = "full";

/// Mapping of size name to target thumbnail dimensions
pub type OutputSizes = BTreeMap<String, Dimensions>;

/// Mapping of size name to the file written for it, returned on success
pub type ResultMap = HashMap<String, PathBuf>;

/// Main configuration for the preview service
///
/// Supplies the defaults used when a request omits its viewport or output
/// sizes, and the settings handed to the browser launcher.
///
/// # Examples
///
/// ```rust
/// use page_preview::Config;
///
/// let config = Config::default();
/// assert_eq!(config.default_viewport.width, 1024);
/// assert_eq!(config.default_output_sizes.len(), 3);
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Viewport used when a request does not carry a valid one (default: 1024x768)
    pub default_viewport: Viewport,

    /// Thumbnail sizes used when a request does not carry a valid mapping
    ///
    /// Defaults to small (160x120), medium (320x240) and large (640x480).
    pub default_output_sizes: OutputSizes,

    /// Upper bound on browser launch, page open and render (default: 30 seconds)
    ///
    /// Expiry is reported as a render failure.
    pub render_timeout: Duration,

    /// Path to Chrome/Chromium executable (default: auto-detect)
    pub chrome_path: Option<String>,

    /// Custom User-Agent string for page loads (default: Chrome default)
    pub user_agent: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_viewport: Viewport::default(),
            default_output_sizes: default_output_sizes(),
            render_timeout: Duration::from_secs(30),
            chrome_path: None,
            user_agent: None,
        }
    }
}

impl Config {
    /// Load a configuration from JSON; absent fields keep their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, PreviewError> {
        let config: Config = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PreviewError> {
        if !self.default_viewport.is_valid() {
            return Err(PreviewError::InvalidArgument(
                "default viewport dimensions must be greater than 0".to_string(),
            ));
        }

        if let Some((name, _)) = self
            .default_output_sizes
            .iter()
            .find(|(_, size)| !size.is_valid())
        {
            return Err(PreviewError::InvalidArgument(format!(
                "default output size '{name}' must have non-zero dimensions"
            )));
        }

        if self.render_timeout.is_zero() {
            return Err(PreviewError::InvalidArgument(
                "render timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn default_output_sizes() -> OutputSizes {
    [
        ("small", Dimensions::new(160, 120)),
        ("medium", Dimensions::new(320, 240)),
        ("large", Dimensions::new(640, 480)),
    ]
    .into_iter()
    .map(|(name, size)| (name.to_string(), size))
    .collect()
}

/// Width and height of a thumbnail in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Browser viewport used for the full render
///
/// `y` is the vertical scroll offset the render starts from. Requests are
/// always rendered from the top of the page, so normalization resets it to 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Viewport {
    /// Viewport width in pixels (default: 1024)
    pub width: u32,

    /// Viewport height in pixels (default: 768)
    pub height: u32,

    #[serde(default)]
    pub y: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            y: 0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1024, 768)
    }
}

/// A request to render one page into a full-size image and thumbnails
///
/// # Examples
///
/// ```rust
/// use page_preview::{Config, Dimensions, PreviewRequest, Viewport};
///
/// let request = PreviewRequest::new("http://example.com", "job1", "/tmp/previews")
///     .with_viewport(Viewport::new(800, 600))
///     .with_output_sizes([("thumb".to_string(), Dimensions::new(100, 75))].into());
///
/// let prepared = request.prepare(&Config::default()).unwrap();
/// assert_eq!(prepared.job_path, std::path::Path::new("/tmp/previews/job1"));
/// ```
#[derive(Debug, Clone)]
pub struct PreviewRequest {
    pub id: String,
    pub url: String,
    pub name: String,
    pub parent_directory: PathBuf,
    pub viewport: Option<Viewport>,
    pub output_sizes: Option<OutputSizes>,
}

impl Default for PreviewRequest {
    fn default() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            url: String::new(),
            name: String::new(),
            parent_directory: PathBuf::new(),
            viewport: None,
            output_sizes: None,
        }
    }
}

impl PreviewRequest {
    pub fn new(
        url: impl Into<String>,
        name: impl Into<String>,
        parent_directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            parent_directory: parent_directory.into(),
            ..Default::default()
        }
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = Some(viewport);
        self
    }

    pub fn with_output_sizes(mut self, output_sizes: OutputSizes) -> Self {
        self.output_sizes = Some(output_sizes);
        self
    }

    /// Build a request from a loosely typed JSON object
    ///
    /// Expects `url`, `name` and `parentDirectory` as non-empty strings.
    /// `viewport` and `outputSizes` are kept only when well formed; anything
    /// else is dropped so that [`PreviewRequest::prepare`] applies the defaults.
    pub fn from_value(value: &Value) -> Result<Self, PreviewError> {
        let url = required_string(value, "url")?;
        let name = required_string(value, "name")?;
        let parent_directory = required_string(value, "parentDirectory")?;

        Ok(Self {
            viewport: value.get("viewport").and_then(viewport_from_value),
            output_sizes: value.get("outputSizes").and_then(output_sizes_from_value),
            ..Self::new(url, name, parent_directory)
        })
    }

    /// Validate the request and resolve its defaults against `config`.
    pub fn prepare(&self, config: &Config) -> Result<PreparedRequest, PreviewError> {
        if self.url.is_empty() {
            return Err(PreviewError::missing_parameter("url"));
        }
        if self.name.is_empty() {
            return Err(PreviewError::missing_parameter("name"));
        }
        if self.parent_directory.as_os_str().is_empty() {
            return Err(PreviewError::missing_parameter("parentDirectory"));
        }

        let mut viewport = self
            .viewport
            .filter(Viewport::is_valid)
            .unwrap_or(config.default_viewport);
        viewport.y = 0;

        let output_sizes = self
            .output_sizes
            .clone()
            .filter(|sizes| sizes.values().all(Dimensions::is_valid))
            .unwrap_or_else(|| config.default_output_sizes.clone());

        if let Some(name) = output_sizes.keys().find(|name| !is_plain_size_name(name)) {
            return Err(PreviewError::InvalidArgument(format!(
                "output size name '{name}' is reserved or not a plain file name"
            )));
        }

        Ok(PreparedRequest {
            id: self.id.clone(),
            url: self.url.clone(),
            job_path: self.parent_directory.join(relative_job_name(&self.name)?),
            viewport,
            output_sizes,
        })
    }
}

/// A validated request with every default resolved
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub id: String,
    pub url: String,
    pub job_path: PathBuf,
    pub viewport: Viewport,
    pub output_sizes: OutputSizes,
}

fn is_plain_size_name(name: &str) -> bool {
    !name.is_empty()
        && name != FULL_SIZE_NAME
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
}

/// Job name with any root or drive prefix stripped, so it always nests
/// under the parent directory.
fn relative_job_name(name: &str) -> Result<PathBuf, PreviewError> {
    let mut relative = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::CurDir => {}
            Component::Normal(part) => relative.push(part),
            Component::ParentDir => {
                return Err(PreviewError::InvalidArgument(format!(
                    "job name '{name}' must not contain '..'"
                )))
            }
        }
    }

    if relative.as_os_str().is_empty() {
        return Err(PreviewError::InvalidArgument(format!(
            "job name '{name}' does not name a directory"
        )));
    }
    Ok(relative)
}

fn required_string(value: &Value, key: &str) -> Result<String, PreviewError> {
    match value.get(key).and_then(Value::as_str) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(PreviewError::missing_parameter(key)),
    }
}

fn dimensions_from_value(value: &Value) -> Option<Dimensions> {
    if !value.is_object() {
        return None;
    }
    serde_json::from_value::<Dimensions>(value.clone())
        .ok()
        .filter(Dimensions::is_valid)
}

fn viewport_from_value(value: &Value) -> Option<Viewport> {
    dimensions_from_value(value).map(|d| Viewport::new(d.width, d.height))
}

fn output_sizes_from_value(value: &Value) -> Option<OutputSizes> {
    value
        .as_object()?
        .iter()
        .map(|(name, size)| dimensions_from_value(size).map(|d| (name.clone(), d)))
        .collect()
}
