//! Drawing and modification session over ROIs.
//!
//! ```text
//! Idle --start_new--------------> Drawing(New)
//! Idle --start_modifying(id)----> Drawing(Modifying(id))
//! Drawing --add/remove/move-----> Drawing
//! Drawing --cancel--------------> Idle
//! Drawing --begin_confirm-------> Drawing (submitting)
//!         --confirm_succeeded---> Idle
//!         --confirm_failed------> Drawing (points kept)
//! ```
//!
//! A confirm only produces an [`RoiDraft`]; the annotation set changes once
//! the store acknowledges the save.

use crate::constants::MIN_ROI_VERTICES;
use crate::error::ValidationError;
use crate::geometry::{Point, polygon_area};
use crate::model::{AnnotationSet, Roi, RoiId};

/// What a drawing session produces when confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// A brand new ROI.
    New,
    /// New geometry for an existing ROI.
    Modifying(RoiId),
}

/// An ROI ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RoiDraft {
    pub roi: Roi,
    pub is_modification: bool,
}

/// Transient drawing state.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DrawingSession {
    #[default]
    Idle,
    Drawing {
        mode: SessionMode,
        points: Vec<Point>,
        /// A confirm is waiting for the store.
        submitting: bool,
    },
}

impl DrawingSession {
    pub fn is_drawing(&self) -> bool {
        matches!(self, DrawingSession::Drawing { .. })
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self, DrawingSession::Drawing { submitting: true, .. })
    }

    pub fn mode(&self) -> Option<SessionMode> {
        match self {
            DrawingSession::Idle => None,
            DrawingSession::Drawing { mode, .. } => Some(*mode),
        }
    }

    /// ROI currently under geometry modification.
    pub fn modifying_roi(&self) -> Option<RoiId> {
        match self.mode() {
            Some(SessionMode::Modifying(id)) => Some(id),
            _ => None,
        }
    }

    pub fn points(&self) -> &[Point] {
        match self {
            DrawingSession::Idle => &[],
            DrawingSession::Drawing { points, .. } => points,
        }
    }

    /// Whether an edit of `id` may start now.
    pub fn can_modify(&self, id: RoiId) -> bool {
        match self {
            DrawingSession::Idle => true,
            DrawingSession::Drawing { mode, .. } => *mode == SessionMode::Modifying(id),
        }
    }

    /// Area of the in-progress polygon in px².
    pub fn live_area_px2(&self) -> f64 {
        polygon_area(self.points())
    }

    pub fn start_new(&mut self) -> Result<(), ValidationError> {
        if self.is_drawing() {
            return Err(ValidationError::SessionBusy);
        }
        *self = DrawingSession::Drawing {
            mode: SessionMode::New,
            points: Vec::new(),
            submitting: false,
        };
        log::debug!("Drawing session started (new ROI)");
        Ok(())
    }

    /// Start editing an existing ROI, seeded with its current geometry.
    pub fn start_modifying(&mut self, id: RoiId, rois: &AnnotationSet) -> Result<(), ValidationError> {
        if self.is_drawing() {
            return Err(ValidationError::SessionBusy);
        }
        let roi = rois.get(id).ok_or(ValidationError::UnknownRoi(id))?;
        *self = DrawingSession::Drawing {
            mode: SessionMode::Modifying(id),
            points: roi.points.clone(),
            submitting: false,
        };
        log::debug!("Drawing session started (modifying ROI {})", id);
        Ok(())
    }

    /// Mutable access to session points, refused while submitting.
    fn editable_points(&mut self) -> Result<&mut Vec<Point>, ValidationError> {
        match self {
            DrawingSession::Idle => Err(ValidationError::NotDrawing),
            DrawingSession::Drawing {
                submitting: true, ..
            } => Err(ValidationError::Submitting),
            DrawingSession::Drawing { points, .. } => Ok(points),
        }
    }

    pub fn add_point(&mut self, p: Point) -> Result<(), ValidationError> {
        self.editable_points()?.push(p);
        log::trace!("Session point added at ({:.1}, {:.1})", p.x, p.y);
        Ok(())
    }

    /// Pop the last point. No-op on an empty session.
    pub fn remove_last_point(&mut self) -> Result<Option<Point>, ValidationError> {
        Ok(self.editable_points()?.pop())
    }

    pub fn move_point(&mut self, index: usize, p: Point) -> Result<(), ValidationError> {
        let points = self.editable_points()?;
        let len = points.len();
        let slot = points
            .get_mut(index)
            .ok_or(ValidationError::PointIndex { index, len })?;
        *slot = p;
        Ok(())
    }

    /// Drop all points but stay in the current mode.
    pub fn clear_points(&mut self) -> Result<(), ValidationError> {
        self.editable_points()?.clear();
        Ok(())
    }

    /// Discard the session without side effects.
    pub fn cancel(&mut self) -> Result<(), ValidationError> {
        if self.is_submitting() {
            return Err(ValidationError::Submitting);
        }
        if !self.is_drawing() {
            return Err(ValidationError::NotDrawing);
        }
        *self = DrawingSession::Idle;
        log::debug!("Drawing session cancelled");
        Ok(())
    }

    /// Build the ROI this session would produce and mark the session as submitting.
    ///
    /// New ROIs get `max(existing ids) + 1` and version 1. Modifications keep
    /// the id, bump the version and carry over the local notes (including
    /// any text not yet sent).
    pub fn begin_confirm(
        &mut self,
        rois: &AnnotationSet,
        px_per_um: f64,
    ) -> Result<RoiDraft, ValidationError> {
        let DrawingSession::Drawing {
            mode,
            points,
            submitting,
        } = self
        else {
            return Err(ValidationError::NotDrawing);
        };
        if *submitting {
            return Err(ValidationError::Submitting);
        }
        if points.len() < MIN_ROI_VERTICES {
            return Err(ValidationError::TooFewPoints {
                required: MIN_ROI_VERTICES,
                actual: points.len(),
            });
        }

        let draft = match *mode {
            SessionMode::New => RoiDraft {
                roi: Roi::new(rois.next_id(), 1, points.clone(), px_per_um),
                is_modification: false,
            },
            SessionMode::Modifying(id) => {
                let existing = rois.get(id).ok_or(ValidationError::UnknownRoi(id))?;
                RoiDraft {
                    roi: Roi::new(id, existing.version + 1, points.clone(), px_per_um)
                        .with_notes(existing.notes.clone()),
                    is_modification: true,
                }
            }
        };

        *submitting = true;
        Ok(draft)
    }

    /// The store accepted the confirmed ROI.
    pub fn confirm_succeeded(&mut self) {
        *self = DrawingSession::Idle;
    }

    /// The store rejected the confirmed ROI; keep the points for another attempt.
    pub fn confirm_failed(&mut self) {
        if let DrawingSession::Drawing { submitting, .. } = self {
            *submitting = false;
        }
    }
}
