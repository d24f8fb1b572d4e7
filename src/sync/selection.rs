//! Image list, image selection, analysis load and scale bar detection.

use crate::calibration::{Calibration, ScaleBar};
use crate::error::{RemoteError, ValidationError};
use crate::model::AnnotationSet;
use crate::remote::{CalibrationPayload, LoadedAnalysis, RemoteCall, Reply};
use crate::session::DrawingSession;
use crate::viewport::Viewport;

use super::{InFlight, NoticeLevel, Target, Workspace, expect_reply};

impl Workspace {
    // ========================================================================
    // Image list
    // ========================================================================

    pub fn refresh_images(&mut self) {
        self.request(RemoteCall::ListImages, InFlight::ListImages);
    }

    pub(super) fn on_images(&mut self, result: Result<Reply, RemoteError>) {
        match expect_reply(result, |reply| match reply {
            Reply::Images(images) => Some(images),
            _ => None,
        }) {
            Ok(images) => {
                log::info!("Loaded {} images", images.len());
                self.images = images;
            }
            Err(e) => {
                log::warn!("Image list failed: {}", e);
                self.notify(NoticeLevel::Error, "Failed to fetch images.", None);
            }
        }
    }

    pub(super) fn set_has_data(&mut self, filename: &str, has_data: bool) {
        if let Some(entry) = self.images.iter_mut().find(|e| e.filename == filename) {
            entry.has_data = has_data;
        }
    }

    // ========================================================================
    // Selection
    // ========================================================================

    /// Switch to `filename`.
    ///
    /// Unsent notes of the current image are flushed first. All per-image
    /// state is reset and the analysis load starts. Responses still in
    /// flight for any earlier selection become stale.
    pub fn select_image(&mut self, filename: impl Into<String>) {
        let filename = filename.into();
        self.flush_pending_notes();

        self.generation += 1;
        log::debug!("Selecting {} (generation {})", filename, self.generation);
        self.selected = Some(Target {
            filename: filename.clone(),
            generation: self.generation,
        });

        self.calibration = Calibration::default();
        self.rois = AnnotationSet::new();
        self.session = DrawingSession::Idle;
        self.image_size = None;
        self.viewport = Viewport::identity();

        self.load_analysis();
    }

    /// Select the image after the current one in the list.
    ///
    /// Returns `None` without changing the selection at the end of the list.
    pub fn select_next_image(&mut self) -> Option<&str> {
        self.select_relative(1)
    }

    /// Select the image before the current one in the list.
    ///
    /// Returns `None` without changing the selection at the start of the list.
    pub fn select_previous_image(&mut self) -> Option<&str> {
        self.select_relative(-1)
    }

    fn select_relative(&mut self, step: isize) -> Option<&str> {
        if self.images.is_empty() {
            return None;
        }
        let index = match self.selected_image() {
            Some(current) => match self.images.iter().position(|e| e.filename == current) {
                Some(pos) => pos.checked_add_signed(step)?,
                None => 0,
            },
            None if step < 0 => self.images.len() - 1,
            None => 0,
        };
        let filename = self.images.get(index)?.filename.clone();
        self.select_image(filename);
        self.selected_image()
    }

    /// Deselect without choosing another image.
    pub fn clear_selection(&mut self) {
        self.flush_pending_notes();
        self.generation += 1;
        self.selected = None;
        self.calibration = Calibration::default();
        self.rois = AnnotationSet::new();
        self.session = DrawingSession::Idle;
        self.image_size = None;
        self.viewport = Viewport::identity();
    }

    // ========================================================================
    // Analysis load
    // ========================================================================

    /// Request the persisted analysis of the selected image.
    pub fn load_analysis(&mut self) {
        let Some(target) = self.current_target() else {
            return;
        };
        let call = RemoteCall::LoadAnalysis {
            filename: target.filename.clone(),
        };
        self.request(call, InFlight::Load(target));
    }

    pub(super) fn on_load(&mut self, target: Target, result: Result<Reply, RemoteError>) {
        if !self.is_current(&target) {
            log::debug!("Discarding stale analysis for {}", target.filename);
            return;
        }

        let loaded = expect_reply(result, |reply| match reply {
            Reply::Analysis(loaded) => Some(loaded),
            _ => None,
        });

        match loaded {
            Ok(loaded) => self.adopt_analysis(&target, loaded),
            Err(e) if e.is_not_found() => {
                log::debug!("No stored analysis for {}", target.filename);
                self.resolve_missing_calibration(&target);
            }
            Err(e) => {
                log::warn!("Loading analysis for {} failed: {}", target.filename, e);
                self.notify(NoticeLevel::Error, "Failed to load analysis.", None);
                self.resolve_missing_calibration(&target);
            }
        }
    }

    fn adopt_analysis(&mut self, target: &Target, loaded: LoadedAnalysis) {
        let LoadedAnalysis {
            calibration,
            scale_um,
            rois,
        } = loaded;

        if !rois.is_empty() {
            log::info!("Loaded {} ROIs for {}", rois.len(), target.filename);
            self.calibration = calibration.unwrap_or(Calibration {
                scale_bar: None,
                scale_um,
            });
            self.rois = AnnotationSet::from_rois(rois);
            self.calibration_resolved.insert(target.filename.clone());
            if let Some(calibration) = calibration {
                self.last_known.remember(calibration);
            }
            return;
        }

        match calibration {
            Some(calibration) => {
                log::info!("Loaded calibration for {}", target.filename);
                self.calibration = calibration;
                self.last_known.remember(calibration);
            }
            None => self.resolve_missing_calibration(target),
        }
    }

    /// Nothing usable was stored: detect once per image, otherwise fall back
    /// to the last known calibration.
    fn resolve_missing_calibration(&mut self, target: &Target) {
        if self.calibration_resolved.contains(&target.filename) {
            return;
        }
        if !self.detection_attempted.contains(&target.filename) {
            if !self.detect_in_flight(target) {
                self.auto_detect_scale_bar();
            }
            return;
        }
        if let Some(last) = self.last_known.get() {
            log::debug!("Reusing last known calibration for {}", target.filename);
            self.calibration = last;
            self.rois.recompute_areas(self.calibration.px_per_um());
        }
    }

    fn detect_in_flight(&self, target: &Target) -> bool {
        self.in_flight
            .values()
            .any(|purpose| matches!(purpose, InFlight::Detect(t) if t == target))
    }

    // ========================================================================
    // Scale bar detection
    // ========================================================================

    /// Ask the store to detect the scale bar of the selected image.
    pub fn auto_detect_scale_bar(&mut self) {
        let Some(target) = self.current_target() else {
            return;
        };
        let call = RemoteCall::DetectScaleBar {
            filename: target.filename.clone(),
        };
        self.request(call, InFlight::Detect(target));
    }

    pub(super) fn on_detect(&mut self, target: Target, result: Result<Reply, RemoteError>) {
        if !self.is_current(&target) {
            log::debug!("Discarding stale detection for {}", target.filename);
            return;
        }
        self.detection_attempted.insert(target.filename.clone());

        let detected = expect_reply(result, |reply| match reply {
            Reply::ScaleBar(bar) => Some(bar),
            _ => None,
        });

        match detected {
            Ok(bar) => self.adopt_detected(&target, bar),
            Err(e) => {
                log::debug!("Detection for {} failed: {}", target.filename, e);
                match self.last_known.get() {
                    Some(last) => {
                        self.calibration = last;
                        self.rois.recompute_areas(self.calibration.px_per_um());
                        self.notify(
                            NoticeLevel::Info,
                            "Using the scale bar from the previous image.",
                            None,
                        );
                    }
                    None => self.notify(
                        NoticeLevel::Warning,
                        "Scale bar auto-detection failed. Please define it manually.",
                        None,
                    ),
                }
            }
        }
    }

    fn adopt_detected(&mut self, target: &Target, bar: ScaleBar) {
        let bounds = self.image_bounds();
        self.calibration = Calibration::new(bar.clamped(bounds), crate::constants::DEFAULT_SCALE_UM);
        self.last_known.remember(self.calibration);
        self.rois.recompute_areas(self.calibration.px_per_um());
        log::info!(
            "Detected scale bar for {} ({:.1} px)",
            target.filename,
            bar.length()
        );
        self.persist_calibration();
        self.notify(NoticeLevel::Info, "Scale bar detected automatically", None);
    }

    /// Fire-and-forget save of the current calibration.
    pub(super) fn persist_calibration(&mut self) {
        let Some(target) = self.current_target() else {
            return;
        };
        let call = RemoteCall::SaveCalibration {
            filename: target.filename.clone(),
            payload: CalibrationPayload::from(&self.calibration),
        };
        self.request(call, InFlight::SaveCalibration(target));
    }

    // ========================================================================
    // Delete
    // ========================================================================

    /// Remove every stored ROI and the calibration of the selected image.
    ///
    /// Refused while an ROI confirm is waiting for the store.
    pub fn delete_analysis(&mut self) -> Result<(), ValidationError> {
        let target = self.current_target().ok_or(ValidationError::NoImageSelected)?;
        if self.session.is_submitting() {
            return Err(ValidationError::Submitting);
        }
        let call = RemoteCall::DeleteAnalysis {
            filename: target.filename.clone(),
        };
        self.request(call, InFlight::Delete(target));
        Ok(())
    }

    pub(super) fn on_delete(&mut self, target: Target, result: Result<Reply, RemoteError>) {
        if !self.is_current(&target) {
            log::debug!("Discarding stale delete result for {}", target.filename);
            return;
        }
        if let Err(e) = result {
            log::warn!("Deleting analysis of {} failed: {}", target.filename, e);
            self.notify(NoticeLevel::Error, "Failed to delete analysis.", None);
            return;
        }

        log::info!("Deleted analysis of {}", target.filename);
        self.set_has_data(&target.filename, false);
        self.calibration_resolved.remove(&target.filename);
        self.detection_attempted.remove(&target.filename);
        self.rois.clear();
        self.session = DrawingSession::Idle;
        self.calibration = Calibration::default();
        self.notify(NoticeLevel::Info, "Analysis deleted", None);
    }
}
