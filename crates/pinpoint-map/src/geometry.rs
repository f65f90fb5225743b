use std::fmt;

use serde::{Deserialize, Serialize};

/// Well-known ID of a coordinate system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpatialReference {
    pub wkid: u32,
}

impl SpatialReference {
    /// Geographic WGS 84 (longitude/latitude in degrees).
    pub const WGS84: Self = Self { wkid: 4326 };
}

impl Default for SpatialReference {
    fn default() -> Self {
        Self::WGS84
    }
}

/// A point geometry. `x` is longitude and `y` latitude for [`SpatialReference::WGS84`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub spatial_reference: SpatialReference,
}

impl Point {
    #[must_use]
    pub const fn new(x: f64, y: f64, spatial_reference: SpatialReference) -> Self {
        Self {
            x,
            y,
            spatial_reference,
        }
    }

    /// WGS 84 point from latitude and longitude in decimal degrees.
    #[must_use]
    pub const fn from_lat_lon(lat: f64, lon: f64) -> Self {
        Self::new(lon, lat, SpatialReference::WGS84)
    }

    #[must_use]
    pub const fn lat(&self) -> f64 {
        self.y
    }

    #[must_use]
    pub const fn lon(&self) -> f64 {
        self.x
    }

    /// Degenerate envelope covering only this point.
    #[must_use]
    pub const fn extent(&self) -> Envelope {
        Envelope {
            xmin: self.x,
            ymin: self.y,
            xmax: self.x,
            ymax: self.y,
            spatial_reference: self.spatial_reference,
        }
    }

    /// Linear interpolation towards `other`; `t` is clamped to `0..=1`.
    #[must_use]
    pub fn lerp(&self, other: &Self, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        Self::new(
            (other.x - self.x).mul_add(t, self.x),
            (other.y - self.y).mul_add(t, self.y),
            self.spatial_reference,
        )
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.5}, {:.5})", self.y, self.x)
    }
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
    #[serde(default)]
    pub spatial_reference: SpatialReference,
}

impl Envelope {
    /// Build an envelope from two corners in any order.
    #[must_use]
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64, spatial_reference: SpatialReference) -> Self {
        Self {
            xmin: x1.min(x2),
            ymin: y1.min(y2),
            xmax: x1.max(x2),
            ymax: y1.max(y2),
            spatial_reference,
        }
    }

    /// Square envelope of `half_size` units on each side of `center`.
    #[must_use]
    pub fn around(center: &Point, half_size: f64) -> Self {
        let half = half_size.abs();
        Self::new(
            center.x - half,
            center.y - half,
            center.x + half,
            center.y + half,
            center.spatial_reference,
        )
    }

    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(
            (self.xmin + self.xmax) / 2.0,
            (self.ymin + self.ymax) / 2.0,
            self.spatial_reference,
        )
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    #[must_use]
    pub fn contains(&self, point: &Point) -> bool {
        (self.xmin..=self.xmax).contains(&point.x) && (self.ymin..=self.ymax).contains(&point.y)
    }
}
