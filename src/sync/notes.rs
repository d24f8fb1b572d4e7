//! Optimistic ROI notes with one automatic retry.

use crate::error::{RemoteError, ValidationError};
use crate::model::{FailureAction, NoteSync, RoiId, SaveAttempt};
use crate::remote::{RemoteCall, Reply, SaveRoiRequest};

use super::{InFlight, NoticeLevel, Target, TimerKind, Workspace};

impl Workspace {
    /// Apply an edit of ROI notes locally.
    ///
    /// The edit is queued for saving only when it differs from the last
    /// confirmed text and is not blank (unless `save_cleared_notes` is set).
    pub fn update_notes_local(
        &mut self,
        id: RoiId,
        text: impl Into<String>,
    ) -> Result<(), ValidationError> {
        let text = text.into();
        let save_cleared = self.settings.save_cleared_notes;
        let roi = self.rois.get_mut(id).ok_or(ValidationError::UnknownRoi(id))?;

        roi.notes = if text.is_empty() { None } else { Some(text) };
        let state = roi.note_sync().edited(roi.notes_worth_saving(save_cleared));
        roi.set_note_sync(state);
        log::trace!("ROI {} notes edited, now {:?}", id, state);
        Ok(())
    }

    /// Send the current notes of `id` as a first attempt.
    pub fn save_notes(&mut self, id: RoiId) -> Result<(), ValidationError> {
        let roi = self.rois.get(id).ok_or(ValidationError::UnknownRoi(id))?;
        if matches!(roi.note_sync(), NoteSync::Saving { .. }) {
            return Err(ValidationError::AlreadyInFlight);
        }
        self.send_notes(id, SaveAttempt::First)
    }

    /// Manually resend notes whose automatic retry failed too.
    pub fn retry_failed_notes(&mut self, id: RoiId) -> Result<(), ValidationError> {
        let roi = self.rois.get(id).ok_or(ValidationError::UnknownRoi(id))?;
        if !roi.notes_failed() {
            return Err(ValidationError::NothingToRetry(id));
        }
        if self.notice.as_ref().is_some_and(|n| n.roi_id == Some(id)) {
            self.notice = None;
        }
        self.send_notes(id, SaveAttempt::First)
    }

    /// Send every edit not yet handed to the store.
    ///
    /// Returns how many saves were started.
    pub fn flush_pending_notes(&mut self) -> usize {
        let ids = self.rois.unsent_note_ids();
        let mut sent = 0;
        for id in ids {
            match self.send_notes(id, SaveAttempt::First) {
                Ok(()) => sent += 1,
                Err(e) => log::debug!("Not flushing notes of ROI {}: {}", id, e),
            }
        }
        if sent > 0 {
            log::debug!("Flushed {} pending notes", sent);
        }
        sent
    }

    fn send_notes(&mut self, id: RoiId, attempt: SaveAttempt) -> Result<(), ValidationError> {
        let target = self
            .current_target()
            .ok_or(ValidationError::NoImageSelected)?;
        let roi = self.rois.get_mut(id).ok_or(ValidationError::UnknownRoi(id))?;

        let text = roi.notes_text().to_string();
        let payload = SaveRoiRequest::notes_only(roi, &self.calibration, &text);
        roi.set_note_sync(roi.note_sync().sent(attempt));

        let call = RemoteCall::SaveRoi {
            filename: target.filename.clone(),
            payload,
        };
        self.request(
            call,
            InFlight::SaveNotes {
                target,
                roi_id: id,
                text,
                attempt,
            },
        );
        Ok(())
    }

    pub(super) fn on_notes_saved(
        &mut self,
        target: Target,
        id: RoiId,
        text: String,
        attempt: SaveAttempt,
        result: Result<Reply, RemoteError>,
    ) {
        if !self.is_current(&target) {
            log::debug!("Discarding stale notes result for ROI {}", id);
            return;
        }
        let save_cleared = self.settings.save_cleared_notes;
        let Some(roi) = self.rois.get_mut(id) else {
            log::debug!("Notes result for unknown ROI {}", id);
            return;
        };

        match result {
            Ok(_) => {
                roi.confirm_notes(&text);
                if matches!(roi.note_sync(), NoteSync::Saving { .. }) {
                    let resend = roi.notes_worth_saving(save_cleared);
                    roi.set_note_sync(roi.note_sync().acknowledged(resend));
                }
                log::info!("Saved notes for ROI {}", id);
            }
            Err(e) => {
                log::warn!("Saving notes for ROI {} ({:?}) failed: {}", id, attempt, e);
                let (state, action) = roi.note_sync().save_failed();
                roi.set_note_sync(state);
                match action {
                    FailureAction::ScheduleRetry => {
                        let filename = target.filename;
                        self.schedule(
                            self.settings.note_retry_delay,
                            TimerKind::RetryNotes {
                                filename,
                                roi_id: id,
                            },
                        );
                    }
                    FailureAction::Surface => self.notify(
                        NoticeLevel::Error,
                        format!("Failed to save notes for ROI {}", id),
                        Some(id),
                    ),
                }
            }
        }
    }

    pub(super) fn on_retry_due(&mut self, filename: &str, id: RoiId) {
        if self.selected_image() != Some(filename) {
            log::debug!("Dropping notes retry for ROI {} of {}", id, filename);
            return;
        }
        let save_cleared = self.settings.save_cleared_notes;
        let Some(roi) = self.rois.get_mut(id) else {
            return;
        };
        if roi.note_sync() != NoteSync::RetryScheduled {
            return;
        }
        if !roi.notes_worth_saving(save_cleared) {
            log::debug!("Notes of ROI {} no longer need saving, retry dropped", id);
            roi.set_note_sync(NoteSync::Synced);
            return;
        }
        if let Err(e) = self.send_notes(id, SaveAttempt::Retry) {
            log::debug!("Notes retry for ROI {} not sent: {}", id, e);
        }
    }
}
