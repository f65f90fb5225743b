use serde::Serialize;

use crate::geometry::Point;

/// How a callout appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShowOptions {
    /// Fade the callout in.
    pub animate: bool,
    /// Pan the map so the callout is visible.
    pub recenter: bool,
    /// Animate that pan.
    pub animate_recenter: bool,
}

impl Default for ShowOptions {
    fn default() -> Self {
        Self {
            animate: true,
            recenter: false,
            animate_recenter: false,
        }
    }
}

/// A text bubble anchored at a map location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Callout {
    pub text: String,
    pub anchor: Point,
    pub options: ShowOptions,
}

impl Callout {
    #[must_use]
    pub fn new(text: impl Into<String>, anchor: Point) -> Self {
        Self {
            text: text.into(),
            anchor,
            options: ShowOptions::default(),
        }
    }

    #[must_use]
    pub const fn with_options(mut self, options: ShowOptions) -> Self {
        self.options = options;
        self
    }
}
