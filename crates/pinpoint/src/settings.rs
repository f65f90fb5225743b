use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use exn::ResultExt;
use pinpoint_locator::{arcgis, GeocodeParameters, PLACE_NAME};
use pinpoint_map::viewpoint::Viewpoint;

const APP_DIR: &str = "pinpoint";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug)]
pub struct Error(String);

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Error {}

/// User settings, read from `settings.json` in the platform config directory.
///
/// Every key is optional; missing keys take their default.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the `GeocodeServer` REST service.
    pub locator_url: String,
    /// Candidates requested per geocode. Only the first is shown.
    pub max_results: u32,
    /// Result attributes requested alongside each candidate.
    pub result_attributes: Vec<String>,
    /// Length of the transition to a new result.
    pub animation_secs: f64,
    pub initial_viewpoint: InitialViewpoint,
    /// PNG used for the result marker. The built-in pin when unset.
    pub pin_path: Option<PathBuf>,
    /// Drop responses to requests that a newer request superseded. Off by
    /// default: every submission reports an outcome and the last response
    /// to arrive is what the map shows.
    pub discard_stale_results: bool,
    pub request_timeout_secs: u64,
    pub search_hint: String,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize)]
pub struct InitialViewpoint {
    pub lat: f64,
    pub lon: f64,
    pub scale: f64,
}

impl Default for InitialViewpoint {
    // North America.
    fn default() -> Self {
        Self {
            lat: 40.0,
            lon: -100.0,
            scale: 100_000_000.0,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            locator_url: arcgis::WORLD_GEOCODE_SERVER.to_owned(),
            max_results: 1,
            result_attributes: vec![PLACE_NAME.to_owned()],
            animation_secs: 3.0,
            initial_viewpoint: InitialViewpoint::default(),
            pin_path: None,
            discard_stale_results: false,
            request_timeout_secs: 15,
            search_hint: "Search for an address".to_owned(),
        }
    }
}

impl Settings {
    /// `<config dir>/pinpoint/settings.json`, if the platform has a config dir.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(SETTINGS_FILE))
    }

    /// Read settings from `path`. A missing file gives the defaults.
    pub fn load(path: &Path) -> exn::Result<Self, Error> {
        let body = match fs::read_to_string(path) {
            Ok(body) => body,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no settings file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).or_raise(|| Error(format!("read settings {}", path.display())));
            }
        };
        let settings: Self = serde_json::from_str(&body)
            .or_raise(|| Error(format!("parse settings {}", path.display())))?;
        tracing::info!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    #[must_use]
    pub fn geocode_parameters(&self) -> GeocodeParameters {
        self.result_attributes.iter().fold(
            GeocodeParameters::default().with_max_results(self.max_results),
            |params, name| params.with_attribute(name.as_str()),
        )
    }

    /// Transition length; negative or non-finite values mean no animation.
    #[must_use]
    pub fn animation_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.animation_secs).unwrap_or(Duration::ZERO)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub const fn initial_viewpoint(&self) -> Viewpoint {
        let v = self.initial_viewpoint;
        Viewpoint::new(v.lat, v.lon, v.scale)
    }
}
