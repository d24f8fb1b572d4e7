//! Reconciles local annotation state with the remote analysis store.
//!
//! [`Workspace`] is the single state object of a client session. Every user
//! action is a named command on it; commands mutate state synchronously and
//! queue [`Effect`]s (remote calls, timers) for the host. Completions come
//! back through [`Workspace::handle_response`] and [`Workspace::handle_timer`].
//!
//! Responses are applied only if the selection they were issued for is still
//! current. Reselecting an image starts a new selection generation, so a late
//! response from an earlier visit of the same image is ignored as well.

mod editing;
mod effect;
mod notes;
mod notice;
mod selection;

#[cfg(test)]
mod tests;

pub use effect::{Effect, RequestId, TimerId, TimerKind};
pub use notice::{Notice, NoticeLevel};

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::calibration::{Calibration, ImageBounds, LastKnownCalibration};
use crate::constants::sync as defaults;
use crate::error::RemoteError;
use crate::model::{AnnotationSet, RoiId, RoiSummary, SaveAttempt};
use crate::remote::{ImageEntry, RemoteCall, Reply};
use crate::session::{DrawingSession, RoiDraft};
use crate::viewport::{Size, Viewport, ViewportSettings};

/// Timing and policy knobs of the sync layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncSettings {
    /// Delay before the single automatic notes-save retry.
    pub note_retry_delay: Duration,
    /// How long informational notices stay up.
    pub info_notice_ttl: Duration,
    /// Queue notes that were emptied for saving too.
    pub save_cleared_notes: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            note_retry_delay: Duration::from_millis(defaults::NOTE_RETRY_DELAY_MS),
            info_notice_ttl: Duration::from_millis(defaults::INFO_NOTICE_TTL_MS),
            save_cleared_notes: false,
        }
    }
}

/// The image a request was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    filename: String,
    generation: u64,
}

/// What an outstanding request was for.
#[derive(Debug, Clone)]
enum InFlight {
    ListImages,
    Detect(Target),
    SaveCalibration(Target),
    Load(Target),
    Confirm {
        target: Target,
        draft: RoiDraft,
    },
    SaveNotes {
        target: Target,
        roi_id: RoiId,
        text: String,
        attempt: SaveAttempt,
    },
    Delete(Target),
}

/// Client-side state of the annotation tool.
#[derive(Debug)]
pub struct Workspace {
    settings: SyncSettings,
    viewport_settings: ViewportSettings,

    images: Vec<ImageEntry>,
    selected: Option<Target>,
    generation: u64,

    image_size: Option<Size>,
    container_size: Option<Size>,
    viewport: Viewport,

    calibration: Calibration,
    rois: AnnotationSet,
    session: DrawingSession,

    last_known: LastKnownCalibration,
    calibration_resolved: HashSet<String>,
    detection_attempted: HashSet<String>,

    notice: Option<Notice>,
    next_notice_id: u64,

    next_request_id: u64,
    next_timer_id: u64,
    in_flight: HashMap<RequestId, InFlight>,
    /// Pending timers with the selection generation they were scheduled in.
    timers: HashMap<TimerId, (TimerKind, u64)>,
    outbox: Vec<Effect>,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new(SyncSettings::default(), ViewportSettings::default())
    }
}

impl Workspace {
    pub fn new(settings: SyncSettings, viewport_settings: ViewportSettings) -> Self {
        Self {
            settings,
            viewport_settings,
            images: Vec::new(),
            selected: None,
            generation: 0,
            image_size: None,
            container_size: None,
            viewport: Viewport::identity(),
            calibration: Calibration::default(),
            rois: AnnotationSet::new(),
            session: DrawingSession::default(),
            last_known: LastKnownCalibration::default(),
            calibration_resolved: HashSet::new(),
            detection_attempted: HashSet::new(),
            notice: None,
            next_notice_id: 1,
            next_request_id: 1,
            next_timer_id: 1,
            in_flight: HashMap::new(),
            timers: HashMap::new(),
            outbox: Vec::new(),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn images(&self) -> &[ImageEntry] {
        &self.images
    }

    pub fn selected_image(&self) -> Option<&str> {
        self.selected.as_ref().map(|t| t.filename.as_str())
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn px_per_um(&self) -> f64 {
        self.calibration.px_per_um()
    }

    pub fn image_bounds(&self) -> Option<ImageBounds> {
        self.image_size
            .map(|size| ImageBounds::new(size.width, size.height))
    }

    pub fn rois(&self) -> &AnnotationSet {
        &self.rois
    }

    pub fn session(&self) -> &DrawingSession {
        &self.session
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn last_known_calibration(&self) -> Option<Calibration> {
        self.last_known.get()
    }

    pub fn is_calibration_resolved(&self, filename: &str) -> bool {
        self.calibration_resolved.contains(filename)
    }

    pub fn is_detection_attempted(&self, filename: &str) -> bool {
        self.detection_attempted.contains(filename)
    }

    /// Per-ROI measurement readout under the current calibration.
    pub fn summaries(&self) -> Vec<RoiSummary> {
        self.rois.summaries(self.px_per_um())
    }

    /// Area of the polygon being drawn, in px² and µm².
    pub fn session_area(&self) -> (f64, f64) {
        let px2 = self.session.live_area_px2();
        (px2, crate::calibration::area_um2(px2, self.px_per_um()))
    }

    /// Whether any remote request is still outstanding.
    pub fn has_in_flight(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Take all effects queued since the last drain.
    pub fn drain_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.outbox)
    }

    // ========================================================================
    // Effect plumbing
    // ========================================================================

    fn request(&mut self, call: RemoteCall, purpose: InFlight) -> RequestId {
        let id = RequestId(self.next_request_id);
        self.next_request_id += 1;
        log::trace!("{} -> {:?}", id, call);
        self.in_flight.insert(id, purpose);
        self.outbox.push(Effect::Request { id, call });
        id
    }

    fn schedule(&mut self, delay: Duration, timer: TimerKind) -> TimerId {
        let id = TimerId(self.next_timer_id);
        self.next_timer_id += 1;
        self.timers.insert(id, (timer.clone(), self.generation));
        self.outbox.push(Effect::Schedule { id, delay, timer });
        id
    }

    fn current_target(&self) -> Option<Target> {
        self.selected.clone()
    }

    /// Stale-response guard.
    fn is_current(&self, target: &Target) -> bool {
        self.selected.as_ref() == Some(target)
    }

    fn notify(&mut self, level: NoticeLevel, text: impl Into<String>, roi_id: Option<RoiId>) {
        let id = self.next_notice_id;
        self.next_notice_id += 1;
        let text = text.into();
        match level {
            NoticeLevel::Info => log::info!("{}", text),
            NoticeLevel::Warning | NoticeLevel::Error => log::warn!("{}", text),
        }
        self.notice = Some(Notice {
            id,
            level,
            text,
            roi_id,
        });
        if level == NoticeLevel::Info {
            self.schedule(
                self.settings.info_notice_ttl,
                TimerKind::ClearNotice { notice_id: id },
            );
        }
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    // ========================================================================
    // Completions
    // ========================================================================

    /// Apply the outcome of a remote request.
    ///
    /// Unknown ids (already handled, or never issued) are ignored.
    pub fn handle_response(&mut self, id: RequestId, result: Result<Reply, RemoteError>) {
        let Some(purpose) = self.in_flight.remove(&id) else {
            log::debug!("Ignoring response for unknown {}", id);
            return;
        };

        match purpose {
            InFlight::ListImages => self.on_images(result),
            InFlight::Detect(target) => self.on_detect(target, result),
            InFlight::SaveCalibration(target) => match result {
                Ok(_) => log::debug!("Calibration saved for {}", target.filename),
                Err(e) => log::warn!("Failed to save calibration for {}: {}", target.filename, e),
            },
            InFlight::Load(target) => self.on_load(target, result),
            InFlight::Confirm { target, draft } => self.on_confirm(target, draft, result),
            InFlight::SaveNotes {
                target,
                roi_id,
                text,
                attempt,
            } => self.on_notes_saved(target, roi_id, text, attempt, result),
            InFlight::Delete(target) => self.on_delete(target, result),
        }
    }

    /// Run a timer that has come due.
    pub fn handle_timer(&mut self, id: TimerId) {
        let Some((timer, generation)) = self.timers.remove(&id) else {
            log::debug!("Ignoring unknown {}", id);
            return;
        };

        match timer {
            TimerKind::RetryNotes { filename, roi_id } => {
                if generation == self.generation {
                    self.on_retry_due(&filename, roi_id);
                } else {
                    log::debug!("Dropping notes retry for ROI {} of {}", roi_id, filename);
                }
            }
            TimerKind::ClearNotice { notice_id } => {
                if self.notice.as_ref().is_some_and(|n| n.id == notice_id) {
                    self.notice = None;
                }
            }
        }
    }
}

/// Expect a specific reply variant, treating anything else as a bad response.
fn expect_reply<T>(
    result: Result<Reply, RemoteError>,
    extract: impl FnOnce(Reply) -> Option<T>,
) -> Result<T, RemoteError> {
    let reply = result?;
    extract(reply).ok_or_else(|| RemoteError::invalid_response("unexpected reply kind"))
}
