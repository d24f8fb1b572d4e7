//! Side effects the workspace asks its host to perform.

use std::fmt;
use std::time::Duration;

use crate::model::RoiId;
use crate::remote::RemoteCall;

/// Identifies an outstanding remote request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub(crate) u64);

/// Identifies a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub(crate) u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req#{}", self.0)
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Work scheduled for later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerKind {
    /// The single automatic notes-save retry.
    RetryNotes { filename: String, roi_id: RoiId },
    /// Self-clearing of an informational notice.
    ClearNotice { notice_id: u64 },
}

/// Something the host must do on the workspace's behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Execute a remote call and report back via `handle_response(id, ..)`.
    Request { id: RequestId, call: RemoteCall },
    /// Call `handle_timer(id)` once `delay` has elapsed.
    Schedule {
        id: TimerId,
        delay: Duration,
        timer: TimerKind,
    },
}
