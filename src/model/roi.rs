//! Region-of-interest data and note synchronization state.

use crate::calibration::area_um2;
use crate::geometry::{Point, polygon_area};

/// Unique identifier of an ROI within one image's annotation set.
pub type RoiId = u32;

/// Which automatic attempt a notes save in flight is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveAttempt {
    /// First send, triggered by the user or a flush.
    First,
    /// The single automatic retry.
    Retry,
}

/// Save state of an ROI's notes.
///
/// ```text
/// Synced -> Pending -> Saving(First) -> Synced
///                                    -> RetryScheduled -> Saving(Retry) -> Synced
///                                                                       -> Failed
/// ```
/// `Failed` only leaves through a manual retry or a new local edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoteSync {
    /// Local text equals the last text the store acknowledged.
    #[default]
    Synced,
    /// Local edit not yet sent.
    Pending,
    /// A save request is in flight.
    Saving { attempt: SaveAttempt },
    /// First attempt failed; one retry is waiting on a timer.
    RetryScheduled,
    /// Retry failed too. Needs a manual retry.
    Failed,
}

/// What the coordinator must do after a failed notes save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    ScheduleRetry,
    Surface,
}

impl NoteSync {
    /// State after a local edit. `worth_saving` is false when the text is
    /// blank or equals the confirmed text.
    ///
    /// A save already in flight or a scheduled retry carries the latest text,
    /// so those states are kept.
    pub fn edited(self, worth_saving: bool) -> NoteSync {
        match self {
            NoteSync::Saving { .. } | NoteSync::RetryScheduled => self,
            _ if worth_saving => NoteSync::Pending,
            _ => NoteSync::Synced,
        }
    }

    /// State once a request has been sent.
    pub fn sent(self, attempt: SaveAttempt) -> NoteSync {
        NoteSync::Saving { attempt }
    }

    /// State after the store acknowledged a save. `needs_resend` is true
    /// when the notes were edited in flight into text still worth saving.
    pub fn acknowledged(self, needs_resend: bool) -> NoteSync {
        if needs_resend {
            NoteSync::Pending
        } else {
            NoteSync::Synced
        }
    }

    /// State after a failed save, plus what the caller has to do about it.
    pub fn save_failed(self) -> (NoteSync, FailureAction) {
        match self {
            NoteSync::Saving {
                attempt: SaveAttempt::First,
            } => (NoteSync::RetryScheduled, FailureAction::ScheduleRetry),
            _ => (NoteSync::Failed, FailureAction::Surface),
        }
    }

    /// Whether local notes have not yet been acknowledged.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            NoteSync::Pending | NoteSync::Saving { .. } | NoteSync::RetryScheduled
        )
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, NoteSync::Failed)
    }
}

/// A confirmed polygon annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct Roi {
    pub id: RoiId,
    /// Starts at 1 and increments on every confirmed geometry change.
    pub version: u32,
    /// Polygon vertices in image space, implicitly closed.
    pub points: Vec<Point>,
    pub area_px2: f64,
    pub area_um2: f64,
    pub notes: Option<String>,
    confirmed_notes: String,
    note_sync: NoteSync,
}

impl Roi {
    /// Create an ROI and derive its areas from the current calibration.
    pub fn new(id: RoiId, version: u32, points: Vec<Point>, px_per_um: f64) -> Self {
        let mut roi = Self {
            id,
            version,
            points,
            area_px2: 0.0,
            area_um2: 0.0,
            notes: None,
            confirmed_notes: String::new(),
            note_sync: NoteSync::Synced,
        };
        roi.recompute_area(px_per_um);
        roi
    }

    /// Rebuild an ROI exactly as the store persisted it.
    ///
    /// Stored notes count as confirmed.
    pub fn from_stored(
        id: RoiId,
        version: u32,
        points: Vec<Point>,
        area_px2: f64,
        area_um2: f64,
        notes: Option<String>,
    ) -> Self {
        Self {
            id,
            version,
            points,
            area_px2,
            area_um2,
            confirmed_notes: notes.clone().unwrap_or_default(),
            notes,
            note_sync: NoteSync::Synced,
        }
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    pub fn recompute_area(&mut self, px_per_um: f64) {
        self.area_px2 = polygon_area(&self.points);
        self.area_um2 = area_um2(self.area_px2, px_per_um);
    }

    /// Current note text, empty when none.
    pub fn notes_text(&self) -> &str {
        self.notes.as_deref().unwrap_or("")
    }

    /// Last note text the store acknowledged.
    pub fn confirmed_notes(&self) -> &str {
        &self.confirmed_notes
    }

    pub fn note_sync(&self) -> NoteSync {
        self.note_sync
    }

    pub fn set_note_sync(&mut self, state: NoteSync) {
        self.note_sync = state;
    }

    /// Whether the local notes differ from the confirmed text and may be sent.
    ///
    /// Blank text is only worth saving when `save_cleared` is set.
    pub fn notes_worth_saving(&self, save_cleared: bool) -> bool {
        let text = self.notes_text();
        text != self.confirmed_notes && (save_cleared || !text.trim().is_empty())
    }

    pub(crate) fn confirm_notes(&mut self, text: &str) {
        self.confirmed_notes = text.to_string();
    }

    pub fn notes_pending(&self) -> bool {
        self.note_sync.is_pending()
    }

    pub fn notes_failed(&self) -> bool {
        self.note_sync.is_failed()
    }
}
