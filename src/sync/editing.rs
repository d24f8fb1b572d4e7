//! Viewport, calibration and drawing-session commands.

use crate::calibration::{ScaleBar, ScaleBarHandle, clamp_point};
use crate::error::{RemoteError, ValidationError};
use crate::geometry::Point;
use crate::model::RoiId;
use crate::remote::{RemoteCall, Reply, SaveRoiRequest};
use crate::session::RoiDraft;
use crate::viewport::{Size, Viewport, ZoomDirection};

use super::{InFlight, NoticeLevel, Target, Workspace};

impl Workspace {
    // ========================================================================
    // Viewport
    // ========================================================================

    /// Natural size of the displayed image. Bounds scale bar edits and refits.
    pub fn set_image_size(&mut self, width: f64, height: f64) {
        self.image_size = Some(Size::new(width, height));
        self.fit_to_screen();
    }

    /// Size of the display surface. Refits the image.
    pub fn set_container_size(&mut self, width: f64, height: f64) {
        self.container_size = Some(Size::new(width, height));
        self.fit_to_screen();
    }

    /// Center the image in the container with a small margin.
    pub fn fit_to_screen(&mut self) {
        let (Some(image), Some(container)) = (self.image_size, self.container_size) else {
            return;
        };
        if let Some(viewport) =
            Viewport::fit_to_container(image, container, self.viewport_settings.fit_margin)
        {
            self.viewport = viewport;
        }
    }

    pub fn zoom_at_pointer(&mut self, pointer: Point, direction: ZoomDirection) {
        self.viewport =
            self.viewport
                .zoom_at_pointer(pointer, direction, self.viewport_settings.zoom_step);
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.viewport = self.viewport.pan_by(dx, dy);
    }

    fn pointer_to_image(&self, pointer: Point) -> Point {
        clamp_point(self.viewport.to_image_space(pointer), self.image_bounds())
    }

    // ========================================================================
    // Calibration
    // ========================================================================

    /// Replace the scale bar of the selected image.
    ///
    /// Returns whether the stored bar changed. Changes are persisted and
    /// every ROI's area is re-derived.
    pub fn set_scale_bar(&mut self, bar: ScaleBar) -> Result<bool, ValidationError> {
        if self.selected.is_none() {
            return Err(ValidationError::NoImageSelected);
        }
        let bounds = self.image_bounds();
        let changed = self.calibration.set_scale_bar(bar, bounds);
        if changed {
            self.calibration_changed();
        }
        Ok(changed)
    }

    /// Move one end of the scale bar to the image point under `pointer`.
    pub fn drag_scale_bar_handle(
        &mut self,
        handle: ScaleBarHandle,
        pointer: Point,
    ) -> Result<bool, ValidationError> {
        let bar = self
            .calibration
            .scale_bar
            .ok_or(ValidationError::NoScaleBar)?;
        let p = self.pointer_to_image(pointer);
        self.set_scale_bar(bar.with_handle(handle, p))
    }

    /// Set the micron length of the scale bar. Returns the clamped value.
    pub fn set_scale_um(&mut self, value: f64) -> Result<f64, ValidationError> {
        if self.selected.is_none() {
            return Err(ValidationError::NoImageSelected);
        }
        let before = self.calibration.scale_um;
        let stored = self.calibration.set_scale_um(value);
        if stored != before {
            self.calibration_changed();
        }
        Ok(stored)
    }

    fn calibration_changed(&mut self) {
        log::debug!(
            "Calibration now {:.4} px/um",
            self.calibration.px_per_um()
        );
        self.rois.recompute_areas(self.calibration.px_per_um());
        self.persist_calibration();
    }

    // ========================================================================
    // Drawing session
    // ========================================================================

    pub fn start_drawing(&mut self) -> Result<(), ValidationError> {
        if self.selected.is_none() {
            return Err(ValidationError::NoImageSelected);
        }
        self.session.start_new()
    }

    pub fn start_modifying(&mut self, id: RoiId) -> Result<(), ValidationError> {
        if self.selected.is_none() {
            return Err(ValidationError::NoImageSelected);
        }
        self.session.start_modifying(id, &self.rois)
    }

    pub fn add_point(&mut self, p: Point) -> Result<(), ValidationError> {
        let p = clamp_point(p, self.image_bounds());
        self.session.add_point(p)
    }

    pub fn add_point_at_pointer(&mut self, pointer: Point) -> Result<(), ValidationError> {
        let p = self.pointer_to_image(pointer);
        self.session.add_point(p)
    }

    pub fn remove_last_point(&mut self) -> Result<Option<Point>, ValidationError> {
        self.session.remove_last_point()
    }

    pub fn move_point(&mut self, index: usize, p: Point) -> Result<(), ValidationError> {
        let p = clamp_point(p, self.image_bounds());
        self.session.move_point(index, p)
    }

    pub fn move_point_at_pointer(
        &mut self,
        index: usize,
        pointer: Point,
    ) -> Result<(), ValidationError> {
        let p = self.pointer_to_image(pointer);
        self.session.move_point(index, p)
    }

    pub fn clear_points(&mut self) -> Result<(), ValidationError> {
        self.session.clear_points()
    }

    pub fn cancel_drawing(&mut self) -> Result<(), ValidationError> {
        self.session.cancel()
    }

    /// Persist the session's polygon.
    ///
    /// The annotation set changes only once the store acknowledges. A
    /// rejected save keeps the session and its points for another attempt.
    pub fn confirm(&mut self) -> Result<RoiId, ValidationError> {
        let target = self
            .current_target()
            .ok_or(ValidationError::NoImageSelected)?;
        let draft = self
            .session
            .begin_confirm(&self.rois, self.calibration.px_per_um())?;
        let id = draft.roi.id;

        let payload = SaveRoiRequest::geometry(&draft.roi, &self.calibration, draft.is_modification);
        let call = RemoteCall::SaveRoi {
            filename: target.filename.clone(),
            payload,
        };
        log::debug!(
            "Confirming ROI {} v{} ({:.1} px2)",
            id,
            draft.roi.version,
            draft.roi.area_px2
        );
        self.request(call, InFlight::Confirm { target, draft });
        Ok(id)
    }

    pub(super) fn on_confirm(
        &mut self,
        target: Target,
        draft: RoiDraft,
        result: Result<Reply, RemoteError>,
    ) {
        if !self.is_current(&target) {
            log::debug!("Discarding stale confirm of ROI {}", draft.roi.id);
            return;
        }
        // Only the session that issued the confirm may apply its result.
        if !self.session.is_submitting() {
            log::debug!("Discarding confirm of ROI {}, session moved on", draft.roi.id);
            return;
        }

        if let Err(e) = result {
            log::warn!("Saving ROI {} failed: {}", draft.roi.id, e);
            self.session.confirm_failed();
            self.notify(
                NoticeLevel::Error,
                format!("Failed to save ROI {}", draft.roi.id),
                None,
            );
            return;
        }

        let RoiDraft {
            roi,
            is_modification,
        } = draft;
        let id = roi.id;
        let px_per_um = self.calibration.px_per_um();

        if is_modification {
            if !self
                .rois
                .replace_geometry(id, roi.version, roi.points, px_per_um)
            {
                log::warn!("ROI {} vanished before its modification was saved", id);
            }
        } else {
            let mut roi = roi;
            roi.recompute_area(px_per_um);
            self.rois.insert(roi);
        }

        log::info!("Saved ROI {} for {}", id, target.filename);
        self.session.confirm_succeeded();
        self.set_has_data(&target.filename, true);
    }
}
