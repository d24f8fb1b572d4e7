//! Scenario tests for the workspace coordinator.
//!
//! Each test plays the host: it drains effects, picks out the requests it
//! cares about and feeds responses back in whatever order the scenario needs.

mod drawing_tests;
mod load_tests;

use std::time::Duration;

use crate::calibration::{Calibration, ScaleBar};
use crate::error::RemoteError;
use crate::geometry::Point;
use crate::model::{Roi, RoiId};
use crate::remote::{LoadedAnalysis, RemoteCall, Reply, SaveRoiRequest};

use super::{Effect, RequestId, TimerId, TimerKind, Workspace};

const EPSILON: f64 = 1e-9;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

/// Axis-aligned square with its top-left corner at (x, y).
fn square(x: f64, y: f64, side: f64) -> Vec<Point> {
    vec![
        Point::new(x, y),
        Point::new(x + side, y),
        Point::new(x + side, y + side),
        Point::new(x, y + side),
    ]
}

/// 100 px bar; with 10 µm this gives 10 px/µm.
fn ten_px_per_um() -> Calibration {
    Calibration::new(ScaleBar::from_coords(0.0, 0.0, 100.0, 0.0), 10.0)
}

fn analysis(calibration: Option<Calibration>, rois: Vec<Roi>) -> Reply {
    Reply::Analysis(LoadedAnalysis {
        scale_um: calibration.map_or(100.0, |c| c.scale_um),
        calibration,
        rois,
    })
}

/// Split drained effects into requests and timers.
fn drain(ws: &mut Workspace) -> (Vec<(RequestId, RemoteCall)>, Vec<(TimerId, Duration, TimerKind)>) {
    let mut requests = Vec::new();
    let mut timers = Vec::new();
    for effect in ws.drain_effects() {
        match effect {
            Effect::Request { id, call } => requests.push((id, call)),
            Effect::Schedule { id, delay, timer } => timers.push((id, delay, timer)),
        }
    }
    (requests, timers)
}

fn drain_requests(ws: &mut Workspace) -> Vec<(RequestId, RemoteCall)> {
    drain(ws).0
}

/// The only request queued since the last drain.
fn single_request(ws: &mut Workspace) -> (RequestId, RemoteCall) {
    let mut requests = drain_requests(ws);
    assert_eq!(requests.len(), 1, "expected one request, got {:?}", requests);
    requests.remove(0)
}

fn roi_payload(call: &RemoteCall) -> &SaveRoiRequest {
    match call {
        RemoteCall::SaveRoi { payload, .. } => payload,
        other => panic!("expected a ROI save, got {:?}", other),
    }
}

fn server_error() -> RemoteError {
    RemoteError::Status {
        code: 500,
        message: "boom".into(),
    }
}

/// Workspace with `filename` selected and loaded with a calibration but no ROIs.
fn calibrated_workspace(filename: &str) -> Workspace {
    let mut ws = Workspace::default();
    ws.select_image(filename);
    let (id, _) = single_request(&mut ws);
    ws.handle_response(id, Ok(analysis(Some(ten_px_per_um()), Vec::new())));
    assert!(drain_requests(&mut ws).is_empty());
    ws
}

/// Draw and confirm a polygon, acknowledging the save.
fn confirm_polygon(ws: &mut Workspace, points: &[Point]) -> RoiId {
    ws.start_drawing().expect("start drawing");
    for p in points {
        ws.add_point(*p).expect("add point");
    }
    let roi = ws.confirm().expect("confirm");
    let (id, _) = single_request(ws);
    ws.handle_response(id, Ok(Reply::Ack));
    roi
}

/// Start modifying `roi`, replace its geometry and acknowledge the save.
fn modify_polygon(ws: &mut Workspace, roi: RoiId, points: &[Point]) {
    ws.start_modifying(roi).expect("start modifying");
    ws.clear_points().expect("clear");
    for p in points {
        ws.add_point(*p).expect("add point");
    }
    ws.confirm().expect("confirm");
    let (id, call) = single_request(ws);
    assert!(roi_payload(&call).is_modification);
    ws.handle_response(id, Ok(Reply::Ack));
}
