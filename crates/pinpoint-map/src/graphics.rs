use std::collections::BTreeMap;

use serde::Serialize;

use crate::geometry::Point;
use crate::symbol::Symbol;

/// Named attribute values attached to a graphic.
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// A point drawn on the map with its attributes.
///
/// `symbol` is `None` when the marker image failed to load; such a graphic
/// still carries geometry and attributes but has nothing to draw.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Graphic {
    geometry: Point,
    attributes: Attributes,
    symbol: Option<Symbol>,
}

impl Graphic {
    #[must_use]
    pub const fn new(geometry: Point, attributes: Attributes, symbol: Option<Symbol>) -> Self {
        Self {
            geometry,
            attributes,
            symbol,
        }
    }

    #[must_use]
    pub const fn geometry(&self) -> &Point {
        &self.geometry
    }

    #[must_use]
    pub const fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    #[must_use]
    pub const fn symbol(&self) -> Option<&Symbol> {
        self.symbol.as_ref()
    }

    /// Attribute rendered as text. Strings are returned verbatim, `null` and
    /// missing attributes as `None`.
    #[must_use]
    pub fn attribute_text(&self, name: &str) -> Option<String> {
        match self.attributes.get(name)? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Where a callout for this graphic should point: the center of the
    /// geometry's extent.
    #[must_use]
    pub fn callout_location(&self) -> Point {
        self.geometry.extent().center()
    }
}

/// Ordered collection of graphics drawn above the basemap.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphicsOverlay {
    graphics: Vec<Graphic>,
}

impl GraphicsOverlay {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            graphics: Vec::new(),
        }
    }

    pub fn add(&mut self, graphic: Graphic) {
        self.graphics.push(graphic);
    }

    /// Remove every graphic, returning how many were removed.
    pub fn clear(&mut self) -> usize {
        let n = self.graphics.len();
        self.graphics.clear();
        n
    }

    #[must_use]
    pub fn graphics(&self) -> &[Graphic] {
        &self.graphics
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.graphics.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graphics.is_empty()
    }
}
