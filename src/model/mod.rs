//! ROI data model.

mod annotation_set;
mod roi;

pub use annotation_set::{AnnotationSet, RoiSummary};
pub use roi::{FailureAction, NoteSync, Roi, RoiId, SaveAttempt};
