//! Remote analysis store interface.
//!
//! The engine never talks to the backend directly. It emits [`RemoteCall`]s;
//! a host executes them against an [`AnalysisStore`] and hands back a typed
//! [`Reply`].

#[cfg(not(target_arch = "wasm32"))]
mod http;
mod memory;
mod wire;

#[cfg(not(target_arch = "wasm32"))]
pub use http::HttpStore;
pub use memory::{MemoryStore, Operation};
pub use wire::{
    AnalysisPayload, CalibrationPayload, ImageEntry, LoadedAnalysis, RoiRecord, SaveRoiRequest,
    ScaleBarCoords,
};

use crate::calibration::ScaleBar;
use crate::error::RemoteError;

/// A request to the analysis backend.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    ListImages,
    DetectScaleBar {
        filename: String,
    },
    SaveCalibration {
        filename: String,
        payload: CalibrationPayload,
    },
    LoadAnalysis {
        filename: String,
    },
    SaveRoi {
        filename: String,
        payload: SaveRoiRequest,
    },
    DeleteAnalysis {
        filename: String,
    },
}

impl RemoteCall {
    /// Image this call targets, if any.
    pub fn filename(&self) -> Option<&str> {
        match self {
            RemoteCall::ListImages => None,
            RemoteCall::DetectScaleBar { filename }
            | RemoteCall::SaveCalibration { filename, .. }
            | RemoteCall::LoadAnalysis { filename }
            | RemoteCall::SaveRoi { filename, .. }
            | RemoteCall::DeleteAnalysis { filename } => Some(filename),
        }
    }
}

/// A validated successful response.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Images(Vec<ImageEntry>),
    ScaleBar(ScaleBar),
    Analysis(LoadedAnalysis),
    /// Plain acknowledgement of a write.
    Ack,
}

/// Backend operations the engine depends on.
///
/// Implementations only move bytes; validation of the payloads happens in
/// [`AnalysisStore::execute`].
pub trait AnalysisStore {
    fn list_images(&mut self) -> Result<Vec<ImageEntry>, RemoteError>;

    fn fetch_image(&mut self, filename: &str) -> Result<Vec<u8>, RemoteError>;

    fn fetch_thumbnail(&mut self, filename: &str, size: u32) -> Result<Vec<u8>, RemoteError>;

    /// Auto-detected scale bar. `NotFound` when detection finds nothing.
    fn detect_scale_bar(&mut self, filename: &str) -> Result<ScaleBarCoords, RemoteError>;

    fn save_calibration(
        &mut self,
        filename: &str,
        payload: &CalibrationPayload,
    ) -> Result<(), RemoteError>;

    fn load_analysis(&mut self, filename: &str) -> Result<AnalysisPayload, RemoteError>;

    fn save_roi(&mut self, filename: &str, payload: &SaveRoiRequest) -> Result<(), RemoteError>;

    fn delete_analysis(&mut self, filename: &str) -> Result<(), RemoteError>;

    /// Run a call and validate its response.
    fn execute(&mut self, call: &RemoteCall) -> Result<Reply, RemoteError> {
        match call {
            RemoteCall::ListImages => self.list_images().map(Reply::Images),
            RemoteCall::DetectScaleBar { filename } => {
                let coords = self.detect_scale_bar(filename)?;
                coords.validate().map(Reply::ScaleBar)
            }
            RemoteCall::SaveCalibration { filename, payload } => self
                .save_calibration(filename, payload)
                .map(|()| Reply::Ack),
            RemoteCall::LoadAnalysis { filename } => {
                let payload = self.load_analysis(filename)?;
                payload.validate().map(Reply::Analysis)
            }
            RemoteCall::SaveRoi { filename, payload } => {
                self.save_roi(filename, payload).map(|()| Reply::Ack)
            }
            RemoteCall::DeleteAnalysis { filename } => {
                self.delete_analysis(filename).map(|()| Reply::Ack)
            }
        }
    }
}
