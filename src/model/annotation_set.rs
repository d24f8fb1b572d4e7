//! Per-image collection of ROIs.

use std::collections::BTreeMap;

use crate::geometry::{Point, nearest_neighbor_distances};

use super::roi::{Roi, RoiId};

/// Measurement readout for one ROI.
#[derive(Debug, Clone, PartialEq)]
pub struct RoiSummary {
    pub id: RoiId,
    pub version: u32,
    pub area_px2: f64,
    pub area_um2: f64,
    /// Side of the square with the same area, when calibrated.
    pub equivalent_side_um: Option<f64>,
    /// Minimum perimeter distance to the nearest other ROI.
    pub nearest_px: Option<f64>,
    /// Same distance in microns, when calibrated.
    pub nearest_um: Option<f64>,
    pub notes: String,
    pub notes_pending: bool,
    pub notes_failed: bool,
}

/// All ROIs of one image, keyed and ordered by id.
#[derive(Debug, Clone, Default)]
pub struct AnnotationSet {
    rois: BTreeMap<RoiId, Roi>,
}

impl AnnotationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from stored ROIs. Later duplicates of an id are dropped.
    pub fn from_rois(rois: impl IntoIterator<Item = Roi>) -> Self {
        let mut set = Self::new();
        for roi in rois {
            if set.rois.contains_key(&roi.id) {
                log::warn!("Dropping duplicate ROI id {}", roi.id);
                continue;
            }
            set.rois.insert(roi.id, roi);
        }
        set
    }

    /// Id the next new ROI receives: one past the largest existing id.
    pub fn next_id(&self) -> RoiId {
        self.rois.keys().next_back().copied().unwrap_or(0) + 1
    }

    /// Insert an ROI, replacing one with the same id.
    pub fn insert(&mut self, roi: Roi) {
        self.rois.insert(roi.id, roi);
    }

    /// Replace geometry and version of an existing ROI in place.
    ///
    /// Returns false if the id is unknown.
    pub fn replace_geometry(
        &mut self,
        id: RoiId,
        version: u32,
        points: Vec<Point>,
        px_per_um: f64,
    ) -> bool {
        let Some(roi) = self.rois.get_mut(&id) else {
            return false;
        };
        roi.version = version;
        roi.points = points;
        roi.recompute_area(px_per_um);
        true
    }

    pub fn get(&self, id: RoiId) -> Option<&Roi> {
        self.rois.get(&id)
    }

    pub fn get_mut(&mut self, id: RoiId) -> Option<&mut Roi> {
        self.rois.get_mut(&id)
    }

    pub fn contains(&self, id: RoiId) -> bool {
        self.rois.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Roi> {
        self.rois.values()
    }

    pub fn len(&self) -> usize {
        self.rois.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rois.is_empty()
    }

    pub fn clear(&mut self) {
        self.rois.clear();
    }

    /// Re-derive every ROI's areas after a calibration change.
    pub fn recompute_areas(&mut self, px_per_um: f64) {
        for roi in self.rois.values_mut() {
            roi.recompute_area(px_per_um);
        }
    }

    /// Ids of ROIs with local notes not yet sent.
    pub fn unsent_note_ids(&self) -> Vec<RoiId> {
        self.rois
            .values()
            .filter(|roi| roi.note_sync() == super::NoteSync::Pending)
            .map(|roi| roi.id)
            .collect()
    }

    /// Measurement readout for every ROI, ordered by id.
    pub fn summaries(&self, px_per_um: f64) -> Vec<RoiSummary> {
        let polygons: Vec<&[Point]> = self.rois.values().map(|r| r.points.as_slice()).collect();
        let nearest = nearest_neighbor_distances(&polygons);
        let calibrated = px_per_um > 0.0;

        self.rois
            .values()
            .zip(nearest)
            .map(|(roi, nearest_px)| RoiSummary {
                id: roi.id,
                version: roi.version,
                area_px2: roi.area_px2,
                area_um2: roi.area_um2,
                equivalent_side_um: (roi.area_um2 > 0.0).then(|| roi.area_um2.sqrt()),
                nearest_px,
                nearest_um: nearest_px.filter(|_| calibrated).map(|d| d / px_per_um),
                notes: roi.notes_text().to_string(),
                notes_pending: roi.notes_pending(),
                notes_failed: roi.notes_failed(),
            })
            .collect()
    }
}
