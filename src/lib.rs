//! poreroi - Pore ROI measurement for microscopy images
//!
//! Calibrates images from a scale bar, measures user-drawn polygon regions
//! of interest and keeps them in sync with a remote analysis store.
//!
//! The core ([`sync::Workspace`]) performs no I/O: commands queue
//! [`sync::Effect`]s which a host such as [`driver::Driver`] executes
//! against a [`remote::AnalysisStore`].

pub mod calibration;
#[cfg(not(target_arch = "wasm32"))]
pub mod config;
pub mod constants;
pub mod driver;
pub mod error;
pub mod geometry;
pub mod model;
pub mod remote;
pub mod session;
pub mod sync;
pub mod viewport;
