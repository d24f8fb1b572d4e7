//! Scale-bar calibration model.
//!
//! A calibration is a two-point scale bar plus the micron length it
//! represents. All math here is pure; persistence of a changed calibration
//! is issued by the sync layer.

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_SCALE_UM, MIN_SCALE_UM, SCALE_BAR_ANGLE_TOLERANCE_DEG};
use crate::geometry::Point;

/// Pixel dimensions of the displayed image, used as clamp bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageBounds {
    pub width: f64,
    pub height: f64,
}

impl ImageBounds {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Clamp a point to be non-negative and, when bounds are known, inside the image.
pub fn clamp_point(p: Point, bounds: Option<ImageBounds>) -> Point {
    let (max_x, max_y) = bounds.map_or((f64::INFINITY, f64::INFINITY), |b| (b.width, b.height));
    Point::new(p.x.max(0.0).min(max_x), p.y.max(0.0).min(max_y))
}

/// Clamp a micron value into the supported range.
///
/// Non-finite input falls back to the minimum.
pub fn clamp_scale_um(value: f64) -> f64 {
    if value.is_nan() {
        return MIN_SCALE_UM;
    }
    value.clamp(MIN_SCALE_UM, MAX_SCALE_UM)
}

/// Pixels per micron for a bar of the given length. 0 when `um <= 0`.
pub fn px_per_um(bar: &ScaleBar, um: f64) -> f64 {
    if um <= 0.0 {
        return 0.0;
    }
    bar.length() / um
}

/// Convert a pixel area into square microns. 0 when uncalibrated.
pub fn area_um2(area_px2: f64, px_per_um: f64) -> f64 {
    if px_per_um > 0.0 {
        area_px2 / (px_per_um * px_per_um)
    } else {
        0.0
    }
}

/// Which end of the scale bar a drag handle controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleBarHandle {
    Start,
    End,
}

/// Two-point reference segment in image space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleBar {
    pub p1: Point,
    pub p2: Point,
}

impl ScaleBar {
    pub fn new(p1: Point, p2: Point) -> Self {
        Self { p1, p2 }
    }

    pub fn from_coords(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::new(Point::new(x1, y1), Point::new(x2, y2))
    }

    /// Euclidean length in pixels.
    pub fn length(&self) -> f64 {
        self.p1.distance_to(&self.p2)
    }

    /// Direction angle from p1 to p2 in degrees, in (-180, 180].
    pub fn angle_deg(&self) -> f64 {
        (self.p2.y - self.p1.y)
            .atan2(self.p2.x - self.p1.x)
            .to_degrees()
    }

    /// Both endpoints clamped into bounds.
    pub fn clamped(&self, bounds: Option<ImageBounds>) -> Self {
        Self::new(clamp_point(self.p1, bounds), clamp_point(self.p2, bounds))
    }

    /// Flatten the bar onto its mean y if it leans past the angle tolerance.
    pub fn straightened(&self) -> Self {
        if self.angle_deg().abs() <= SCALE_BAR_ANGLE_TOLERANCE_DEG {
            return *self;
        }
        let y = (self.p1.y + self.p2.y) / 2.0;
        Self::new(Point::new(self.p1.x, y), Point::new(self.p2.x, y))
    }

    /// Copy with one endpoint replaced.
    pub fn with_handle(&self, handle: ScaleBarHandle, p: Point) -> Self {
        match handle {
            ScaleBarHandle::Start => Self::new(p, self.p2),
            ScaleBarHandle::End => Self::new(self.p1, p),
        }
    }
}

/// Scale bar plus the micron length it represents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub scale_bar: Option<ScaleBar>,
    pub scale_um: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            scale_bar: None,
            scale_um: crate::constants::DEFAULT_SCALE_UM,
        }
    }
}

impl Calibration {
    pub fn new(scale_bar: ScaleBar, scale_um: f64) -> Self {
        Self {
            scale_bar: Some(scale_bar),
            scale_um: clamp_scale_um(scale_um),
        }
    }

    /// Pixels per micron, 0 while no scale bar is defined.
    pub fn px_per_um(&self) -> f64 {
        self.scale_bar
            .as_ref()
            .map_or(0.0, |bar| px_per_um(bar, self.scale_um))
    }

    /// Replace the scale bar.
    ///
    /// Coordinates are clamped into `bounds`; if the result differs from the
    /// current bar the near-horizontal correction is applied. Returns whether
    /// the stored bar changed.
    pub fn set_scale_bar(&mut self, bar: ScaleBar, bounds: Option<ImageBounds>) -> bool {
        let clamped = bar.clamped(bounds);
        if self.scale_bar == Some(clamped) {
            return false;
        }
        let corrected = clamped.straightened();
        let changed = self.scale_bar != Some(corrected);
        self.scale_bar = Some(corrected);
        changed
    }

    /// Set the micron length, clamped to the supported range. Returns the stored value.
    pub fn set_scale_um(&mut self, value: f64) -> f64 {
        self.scale_um = clamp_scale_um(value);
        self.scale_um
    }
}

/// Most recent successfully detected or loaded calibration in this process.
///
/// Reused for images whose scale bar cannot be detected.
#[derive(Debug, Clone, Default)]
pub struct LastKnownCalibration {
    calibration: Option<Calibration>,
}

impl LastKnownCalibration {
    pub fn remember(&mut self, calibration: Calibration) {
        if calibration.scale_bar.is_some() {
            self.calibration = Some(calibration);
        }
    }

    pub fn get(&self) -> Option<Calibration> {
        self.calibration
    }
}
