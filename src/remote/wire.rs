//! Wire schemas of the analysis backend.
//!
//! Raw payloads are deserialized into these types and then validated into
//! domain values. Nothing downstream sees an unchecked payload.

use serde::{Deserialize, Serialize};

use crate::calibration::{Calibration, ScaleBar, clamp_scale_um};
use crate::constants::{DEFAULT_SCALE_UM, MIN_ROI_VERTICES};
use crate::error::RemoteError;
use crate::geometry::Point;
use crate::model::{Roi, RoiId};

/// One entry of the image listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageEntry {
    pub filename: String,
    #[serde(default)]
    pub has_data: bool,
}

impl ImageEntry {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            has_data: false,
        }
    }
}

/// Scale bar endpoints as the backend encodes them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleBarCoords {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl ScaleBarCoords {
    pub fn validate(&self) -> Result<ScaleBar, RemoteError> {
        if [self.x1, self.y1, self.x2, self.y2]
            .iter()
            .any(|v| !v.is_finite())
        {
            return Err(RemoteError::invalid_response(
                "scale bar has non-finite coordinates",
            ));
        }
        Ok(ScaleBar::from_coords(self.x1, self.y1, self.x2, self.y2))
    }
}

impl From<&ScaleBar> for ScaleBarCoords {
    fn from(bar: &ScaleBar) -> Self {
        Self {
            x1: bar.p1.x,
            y1: bar.p1.y,
            x2: bar.p2.x,
            y2: bar.p2.y,
        }
    }
}

/// Body of a calibration save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationPayload {
    pub scale_bar: Option<ScaleBarCoords>,
    pub scale_um: f64,
}

impl From<&Calibration> for CalibrationPayload {
    fn from(cal: &Calibration) -> Self {
        Self {
            scale_bar: cal.scale_bar.as_ref().map(ScaleBarCoords::from),
            scale_um: cal.scale_um,
        }
    }
}

fn default_version() -> u32 {
    1
}

/// A persisted ROI inside a loaded analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoiRecord {
    pub id: RoiId,
    #[serde(default = "default_version")]
    pub version: u32,
    pub points: Vec<Point>,
    #[serde(default)]
    pub area_px2: f64,
    #[serde(default)]
    pub area_um2: f64,
    #[serde(default)]
    pub notes: Option<String>,
}

impl RoiRecord {
    fn validate(self) -> Result<Roi, String> {
        if self.id == 0 {
            return Err("ROI id must be positive".to_string());
        }
        if self.version == 0 {
            return Err(format!("ROI {} has version 0", self.id));
        }
        if self.points.len() < MIN_ROI_VERTICES {
            return Err(format!(
                "ROI {} has {} points, needs {}",
                self.id,
                self.points.len(),
                MIN_ROI_VERTICES
            ));
        }
        if self
            .points
            .iter()
            .any(|p| !p.x.is_finite() || !p.y.is_finite())
        {
            return Err(format!("ROI {} has non-finite points", self.id));
        }
        Ok(Roi::from_stored(
            self.id,
            self.version,
            self.points,
            self.area_px2,
            self.area_um2,
            self.notes.filter(|n| !n.is_empty()),
        ))
    }
}

impl From<&Roi> for RoiRecord {
    fn from(roi: &Roi) -> Self {
        Self {
            id: roi.id,
            version: roi.version,
            points: roi.points.clone(),
            area_px2: roi.area_px2,
            area_um2: roi.area_um2,
            notes: roi.notes.clone(),
        }
    }
}

/// Response of a load-analysis call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisPayload {
    #[serde(default)]
    pub scale_bar: Option<ScaleBarCoords>,
    #[serde(default)]
    pub scale_um: Option<f64>,
    #[serde(default)]
    pub rois: Vec<RoiRecord>,
}

/// A validated analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedAnalysis {
    /// Present only when the payload carried a scale bar.
    pub calibration: Option<Calibration>,
    /// Micron value from the payload, defaulted and clamped.
    pub scale_um: f64,
    pub rois: Vec<Roi>,
}

impl AnalysisPayload {
    /// Validate into domain values.
    ///
    /// Malformed ROIs are dropped with a warning; a malformed scale bar
    /// rejects the whole payload. A missing or non-positive micron value
    /// becomes the default.
    pub fn validate(self) -> Result<LoadedAnalysis, RemoteError> {
        let scale_um = match self.scale_um {
            Some(um) if um > 0.0 => clamp_scale_um(um),
            _ => DEFAULT_SCALE_UM,
        };

        let calibration = match self.scale_bar {
            Some(coords) => Some(Calibration::new(coords.validate()?, scale_um)),
            None => None,
        };

        let rois = self
            .rois
            .into_iter()
            .filter_map(|record| match record.validate() {
                Ok(roi) => Some(roi),
                Err(reason) => {
                    log::warn!("Skipping stored ROI: {}", reason);
                    None
                }
            })
            .collect();

        Ok(LoadedAnalysis {
            calibration,
            scale_um,
            rois,
        })
    }
}

/// Body of a save-ROI call, for both geometry and notes-only updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveRoiRequest {
    pub selection_number: RoiId,
    pub version: u32,
    pub scale_px_per_um: f64,
    pub scale_bar: Option<ScaleBarCoords>,
    pub scale_um: f64,
    pub area_um2: f64,
    pub area_px2: f64,
    pub points: Vec<Point>,
    pub is_modification: bool,
    #[serde(default)]
    pub is_notes_only: bool,
    #[serde(default)]
    pub notes: String,
}

impl SaveRoiRequest {
    /// Geometry save of a confirmed ROI.
    pub fn geometry(roi: &Roi, calibration: &Calibration, is_modification: bool) -> Self {
        Self {
            selection_number: roi.id,
            version: roi.version,
            scale_px_per_um: calibration.px_per_um(),
            scale_bar: calibration.scale_bar.as_ref().map(ScaleBarCoords::from),
            scale_um: calibration.scale_um,
            area_um2: roi.area_um2,
            area_px2: roi.area_px2,
            points: roi.points.clone(),
            is_modification,
            is_notes_only: false,
            notes: roi.notes_text().to_string(),
        }
    }

    /// Notes-only update. Version and geometry are unchanged.
    pub fn notes_only(roi: &Roi, calibration: &Calibration, notes: &str) -> Self {
        Self {
            is_modification: true,
            is_notes_only: true,
            notes: notes.to_string(),
            ..Self::geometry(roi, calibration, true)
        }
    }
}
