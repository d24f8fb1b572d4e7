//! User-facing transient messages.

use crate::model::RoiId;

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Self-clears after a short time.
    Info,
    /// Needs user action (e.g. define the scale bar manually).
    Warning,
    /// A failed remote operation.
    Error,
}

/// The message currently shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub level: NoticeLevel,
    pub text: String,
    /// ROI a failed notes save belongs to, for a targeted retry.
    pub roi_id: Option<RoiId>,
}

impl Notice {
    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}
