//! In-process analysis store.
//!
//! Mirrors the backend's persistence rules (ROI upsert by id, notes-only
//! updates, calibration validation) without any I/O. Failures can be
//! injected per operation.

use std::collections::{BTreeMap, HashMap};

use crate::constants::{DEFAULT_SCALE_UM, MAX_SCALE_UM, MIN_SCALE_UM};
use crate::error::RemoteError;
use crate::model::RoiId;

use super::AnalysisStore;
use super::wire::{AnalysisPayload, CalibrationPayload, ImageEntry, RoiRecord, SaveRoiRequest, ScaleBarCoords};

/// Store operations, used for failure injection and call recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListImages,
    FetchImage,
    FetchThumbnail,
    DetectScaleBar,
    SaveCalibration,
    LoadAnalysis,
    SaveRoi,
    DeleteAnalysis,
}

#[derive(Debug, Clone, Default)]
struct StoredImage {
    bytes: Vec<u8>,
    detection: Option<ScaleBarCoords>,
    scale_bar: Option<ScaleBarCoords>,
    scale_um: Option<f64>,
    rois: BTreeMap<RoiId, RoiRecord>,
}

/// Analysis store held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    images: BTreeMap<String, StoredImage>,
    failures: HashMap<Operation, usize>,
    calls: Vec<Operation>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an image without analysis data.
    pub fn with_image(mut self, filename: impl Into<String>) -> Self {
        self.images.entry(filename.into()).or_default();
        self
    }

    /// Register an image whose scale bar detection succeeds.
    pub fn with_detection(mut self, filename: impl Into<String>, coords: ScaleBarCoords) -> Self {
        self.images.entry(filename.into()).or_default().detection = Some(coords);
        self
    }

    pub fn with_image_bytes(mut self, filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.images.entry(filename.into()).or_default().bytes = bytes;
        self
    }

    /// Make the next `times` calls of `op` fail with a server error.
    pub fn fail_next(&mut self, op: Operation, times: usize) {
        self.failures.insert(op, times);
    }

    /// Every operation attempted so far, in order.
    pub fn calls(&self) -> &[Operation] {
        &self.calls
    }

    pub fn call_count(&self, op: Operation) -> usize {
        self.calls.iter().filter(|c| **c == op).count()
    }

    /// Persisted analysis of an image, as a load would return it.
    pub fn analysis(&self, filename: &str) -> Option<AnalysisPayload> {
        self.images.get(filename).map(|image| AnalysisPayload {
            scale_bar: image.scale_bar,
            scale_um: image.scale_um,
            rois: image.rois.values().cloned().collect(),
        })
    }

    fn begin(&mut self, op: Operation) -> Result<(), RemoteError> {
        self.calls.push(op);
        match self.failures.get_mut(&op) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(RemoteError::Status {
                    code: 500,
                    message: format!("injected {:?} failure", op),
                })
            }
            _ => Ok(()),
        }
    }

    fn image_mut(&mut self, filename: &str) -> Result<&mut StoredImage, RemoteError> {
        self.images.get_mut(filename).ok_or(RemoteError::NotFound)
    }
}

impl AnalysisStore for MemoryStore {
    fn list_images(&mut self) -> Result<Vec<ImageEntry>, RemoteError> {
        self.begin(Operation::ListImages)?;
        Ok(self
            .images
            .iter()
            .map(|(filename, image)| ImageEntry {
                filename: filename.clone(),
                has_data: !image.rois.is_empty(),
            })
            .collect())
    }

    fn fetch_image(&mut self, filename: &str) -> Result<Vec<u8>, RemoteError> {
        self.begin(Operation::FetchImage)?;
        Ok(self.image_mut(filename)?.bytes.clone())
    }

    fn fetch_thumbnail(&mut self, filename: &str, _size: u32) -> Result<Vec<u8>, RemoteError> {
        self.begin(Operation::FetchThumbnail)?;
        Ok(self.image_mut(filename)?.bytes.clone())
    }

    fn detect_scale_bar(&mut self, filename: &str) -> Result<ScaleBarCoords, RemoteError> {
        self.begin(Operation::DetectScaleBar)?;
        self.image_mut(filename)?
            .detection
            .ok_or(RemoteError::NotFound)
    }

    fn save_calibration(
        &mut self,
        filename: &str,
        payload: &CalibrationPayload,
    ) -> Result<(), RemoteError> {
        self.begin(Operation::SaveCalibration)?;
        let image = self.image_mut(filename)?;
        let um = payload.scale_um;
        image.scale_bar = payload.scale_bar;
        image.scale_um = Some(if (MIN_SCALE_UM..=MAX_SCALE_UM).contains(&um) {
            um
        } else {
            DEFAULT_SCALE_UM
        });
        Ok(())
    }

    fn load_analysis(&mut self, filename: &str) -> Result<AnalysisPayload, RemoteError> {
        self.begin(Operation::LoadAnalysis)?;
        self.analysis(filename).ok_or(RemoteError::NotFound)
    }

    fn save_roi(&mut self, filename: &str, payload: &SaveRoiRequest) -> Result<(), RemoteError> {
        self.begin(Operation::SaveRoi)?;
        let image = self.image_mut(filename)?;
        let id = payload.selection_number;

        if payload.is_notes_only {
            let record = image.rois.get_mut(&id).ok_or(RemoteError::NotFound)?;
            record.notes = Some(payload.notes.clone());
            return Ok(());
        }

        image.scale_bar = payload.scale_bar;
        image.scale_um = Some(payload.scale_um);
        image.rois.insert(
            id,
            RoiRecord {
                id,
                version: payload.version,
                points: payload.points.clone(),
                area_px2: payload.area_px2,
                area_um2: payload.area_um2,
                notes: Some(payload.notes.clone()).filter(|n| !n.is_empty()),
            },
        );
        Ok(())
    }

    fn delete_analysis(&mut self, filename: &str) -> Result<(), RemoteError> {
        self.begin(Operation::DeleteAnalysis)?;
        let image = self.image_mut(filename)?;
        image.rois.clear();
        image.scale_bar = None;
        image.scale_um = None;
        Ok(())
    }
}
