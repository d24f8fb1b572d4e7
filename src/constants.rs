//! Global constants for the poreroi engine

/// Smallest micron length a scale bar may represent.
pub const MIN_SCALE_UM: f64 = 1.0;

/// Largest micron length a scale bar may represent.
pub const MAX_SCALE_UM: f64 = 10_000.0;

/// Micron length assigned to a detected or loaded scale bar without one.
pub const DEFAULT_SCALE_UM: f64 = 100.0;

/// Scale bars steeper than this (degrees) are flattened to a horizontal ruler.
pub const SCALE_BAR_ANGLE_TOLERANCE_DEG: f64 = 10.0;

/// Minimum number of vertices for a confirmable ROI polygon.
pub const MIN_ROI_VERTICES: usize = 3;

/// Viewport constants
pub mod viewport {
    /// Multiplicative step of a single wheel notch.
    pub const ZOOM_STEP: f64 = 1.1;

    /// Fraction of the container the fitted image occupies.
    pub const FIT_MARGIN: f64 = 0.95;
}

/// Sync timing constants
pub mod sync {
    /// Delay before the single automatic notes-save retry (milliseconds).
    pub const NOTE_RETRY_DELAY_MS: u64 = 1500;

    /// Lifetime of an informational notice (milliseconds).
    pub const INFO_NOTICE_TTL_MS: u64 = 4000;
}
