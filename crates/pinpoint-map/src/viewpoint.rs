use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::geometry::{Envelope, Point};

/// Approximate ground distance of one degree of latitude.
const METERS_PER_DEGREE: f64 = 111_320.0;
const INCHES_PER_METER: f64 = 39.37;
/// Assumed display density.
const DPI: f64 = 96.0;
/// Scale used when framing a degenerate (single point) extent.
const MIN_SCALE: f64 = 2_000.0;

/// Pixel size of the map view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ScreenSize {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
        }
    }
}

/// What the map is looking at: a center and a scale denominator (1:`scale`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewpoint {
    pub center: Point,
    pub scale: f64,
}

impl Viewpoint {
    #[must_use]
    pub const fn new(lat: f64, lon: f64, scale: f64) -> Self {
        Self {
            center: Point::from_lat_lon(lat, lon),
            scale,
        }
    }

    /// Smallest viewpoint that frames `extent` on a screen of `screen` pixels.
    #[must_use]
    pub fn from_extent(extent: &Envelope, screen: ScreenSize) -> Self {
        let center = extent.center();
        let ground_width = extent.width() * METERS_PER_DEGREE * center.lat().to_radians().cos();
        let ground_height = extent.height() * METERS_PER_DEGREE;
        let screen_width = f64::from(screen.width.max(1)) / DPI / INCHES_PER_METER;
        let screen_height = f64::from(screen.height.max(1)) / DPI / INCHES_PER_METER;
        let scale = (ground_width.abs() / screen_width).max(ground_height.abs() / screen_height);
        Self {
            center,
            scale: scale.max(MIN_SCALE),
        }
    }

    /// Interpolate towards `to`. The center moves linearly, the scale
    /// geometrically so zooming feels uniform.
    #[must_use]
    pub fn interpolate(&self, to: &Self, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        let from_ln = self.scale.max(1.0).ln();
        let to_ln = to.scale.max(1.0).ln();
        Self {
            center: self.center.lerp(&to.center, t),
            scale: (to_ln - from_ln).mul_add(t, from_ln).exp(),
        }
    }
}

/// A viewpoint transition in progress.
#[derive(Debug, Clone)]
pub(crate) struct Animation {
    pub(crate) id: u64,
    from: Viewpoint,
    pub(crate) to: Viewpoint,
    started: Instant,
    duration: Duration,
    paused_at: Option<Instant>,
}

impl Animation {
    pub(crate) const fn new(
        id: u64,
        from: Viewpoint,
        to: Viewpoint,
        started: Instant,
        duration: Duration,
    ) -> Self {
        Self {
            id,
            from,
            to,
            started,
            duration,
            paused_at: None,
        }
    }

    /// Fraction of the transition completed at `now`, in `0..=1`.
    pub(crate) fn progress(&self, now: Instant) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let at = self.paused_at.unwrap_or(now);
        let elapsed = at.saturating_duration_since(self.started);
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
    }

    pub(crate) fn sample(&self, now: Instant) -> Viewpoint {
        self.from.interpolate(&self.to, ease_in_out(self.progress(now)))
    }

    pub(crate) fn is_finished(&self, now: Instant) -> bool {
        self.progress(now) >= 1.0
    }

    pub(crate) fn pause(&mut self, now: Instant) {
        if self.paused_at.is_none() {
            self.paused_at = Some(now);
        }
    }

    /// Shift the start time by however long the animation was paused.
    pub(crate) fn resume(&mut self, now: Instant) {
        if let Some(paused_at) = self.paused_at.take() {
            self.started += now.saturating_duration_since(paused_at);
        }
    }
}

fn ease_in_out(t: f64) -> f64 {
    t * t * 2.0f64.mul_add(-t, 3.0)
}
