//! Pan/zoom viewport mathematics.
//!
//! Maps pointer positions on the display surface to image space and back,
//! and keeps the image point under the cursor fixed while zooming.

use crate::constants::viewport as defaults;
use crate::geometry::{self, Point};

/// Width and height of an image or display container in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    fn is_positive(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// Wheel direction for a zoom step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
}

/// Tunables for fitting and zooming.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportSettings {
    /// Fraction of the container a fitted image occupies.
    pub fit_margin: f64,
    /// Multiplicative zoom factor per step.
    pub zoom_step: f64,
}

impl Default for ViewportSettings {
    fn default() -> Self {
        Self {
            fit_margin: defaults::FIT_MARGIN,
            zoom_step: defaults::ZOOM_STEP,
        }
    }
}

/// Offset (pan) and scale (zoom) of the image within its display surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub offset: Point,
    pub scale: f64,
}

impl Viewport {
    pub fn new(offset: Point, scale: f64) -> Self {
        Self { offset, scale }
    }

    /// Identity viewport (scale 1, no pan).
    pub fn identity() -> Self {
        Self::new(Point::default(), 1.0)
    }

    /// Scale the image to fit the container and center it.
    ///
    /// Returns `None` when either size is empty.
    pub fn fit_to_container(image: Size, container: Size, margin: f64) -> Option<Viewport> {
        if !image.is_positive() || !container.is_positive() {
            return None;
        }

        let scale =
            (container.width / image.width).min(container.height / image.height) * margin;
        let offset = Point::new(
            (container.width - image.width * scale) / 2.0,
            (container.height - image.height * scale) / 2.0,
        );
        Some(Viewport::new(offset, scale))
    }

    /// Zoom one step while keeping the image point under `pointer` fixed.
    pub fn zoom_at_pointer(&self, pointer: Point, direction: ZoomDirection, step: f64) -> Viewport {
        let new_scale = match direction {
            ZoomDirection::In => self.scale * step,
            ZoomDirection::Out => self.scale / step,
        };

        // Image-space point under the pointer before zooming
        let anchor = self.to_image_space(pointer);

        Viewport::new(
            Point::new(
                pointer.x - anchor.x * new_scale,
                pointer.y - anchor.y * new_scale,
            ),
            new_scale,
        )
    }

    /// Shift the pan by a screen-space delta.
    pub fn pan_by(&self, dx: f64, dy: f64) -> Viewport {
        Viewport::new(Point::new(self.offset.x + dx, self.offset.y + dy), self.scale)
    }

    /// Pointer position to image coordinates.
    pub fn to_image_space(&self, pointer: Point) -> Point {
        geometry::to_image_space(pointer, self.offset, self.scale)
    }

    /// Image coordinates to display coordinates.
    pub fn to_screen_space(&self, p: Point) -> Point {
        Point::new(
            p.x * self.scale + self.offset.x,
            p.y * self.scale + self.offset.y,
        )
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::identity()
    }
}
