pub mod arcgis;

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use pinpoint_map::geometry::{Envelope, Point};
use pinpoint_map::graphics::Attributes;

/// Result attribute holding the matched place's display name.
pub const PLACE_NAME: &str = "PlaceName";

/// Readiness of a [`Locator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    NotLoaded,
    Loading,
    Loaded,
    FailedToLoad,
}

impl LoadStatus {
    #[must_use]
    pub const fn is_loaded(self) -> bool {
        matches!(self, Self::Loaded)
    }
}

/// One autocomplete candidate for partially typed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestResult {
    pub label: String,
}

impl SuggestResult {
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

/// A matched location.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeResult {
    pub label: String,
    pub display_location: Point,
    pub extent: Envelope,
    /// Match score, 0 to 100.
    pub score: f64,
    pub attributes: Attributes,
}

impl GeocodeResult {
    /// The [`PLACE_NAME`] attribute as text, if present and not empty.
    #[must_use]
    pub fn place_name(&self) -> Option<&str> {
        self.attributes
            .get(PLACE_NAME)
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Options for a geocode request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeocodeParameters {
    pub max_results: u32,
    pub result_attribute_names: Vec<String>,
}

impl Default for GeocodeParameters {
    fn default() -> Self {
        Self {
            max_results: 1,
            result_attribute_names: Vec::new(),
        }
    }
}

impl GeocodeParameters {
    #[must_use]
    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results.max(1);
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.result_attribute_names.contains(&name) {
            self.result_attribute_names.push(name);
        }
        self
    }
}

/// Errors from locator requests.
#[derive(Debug)]
pub enum Error {
    /// The request could not be sent or its body not read.
    Network(String),
    /// The service answered with a non-success HTTP status.
    Status(u16),
    /// The service answered with an error document.
    Service { code: i64, message: String },
    /// The response body was not understood.
    Parse(String),
    /// A request was made before the locator finished loading.
    NotLoaded,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "network error: {msg}"),
            Self::Status(status) => write!(f, "geocoding service returned status {status}"),
            Self::Service { code, message } => write!(f, "service error ({code}): {message}"),
            Self::Parse(msg) => write!(f, "failed to parse response: {msg}"),
            Self::NotLoaded => f.write_str("locator is not loaded"),
        }
    }
}

impl std::error::Error for Error {}

/// An address locator: suggests completions and resolves text to locations.
///
/// A locator must be loaded before geocoding. [`Locator::load`] loads it
/// once; after a failed load only [`Locator::retry_load`] tries again.
pub trait Locator: Send + Sync + 'static {
    fn load_status(&self) -> LoadStatus;

    /// Load the locator if it has not been loaded. Resolves to the status
    /// after the attempt.
    fn load(&self) -> Pin<Box<dyn Future<Output = LoadStatus> + Send + '_>>;

    /// Load again if the previous attempt failed.
    fn retry_load(&self) -> Pin<Box<dyn Future<Output = LoadStatus> + Send + '_>>;

    /// Autocomplete candidates for partially typed `text`, in service order.
    fn suggest(
        &self,
        text: String,
    ) -> Pin<Box<dyn Future<Output = exn::Result<Vec<SuggestResult>, Error>> + Send + '_>>;

    /// Resolve `text` to at most `params.max_results` locations, best first.
    fn geocode<'a>(
        &'a self,
        text: String,
        params: &'a GeocodeParameters,
    ) -> Pin<Box<dyn Future<Output = exn::Result<Vec<GeocodeResult>, Error>> + Send + 'a>>;
}
