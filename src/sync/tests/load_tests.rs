//! Tests for selection, analysis load and scale bar detection.

use super::*;
use crate::remote::ImageEntry;
use crate::sync::NoticeLevel;

fn stored_roi(id: RoiId, version: u32) -> Roi {
    Roi::from_stored(id, version, square(0.0, 0.0, 10.0), 100.0, 1.0, None)
}

#[test]
fn test_stale_load_has_no_effect() {
    let a_reply = analysis(
        Some(Calibration::new(ScaleBar::from_coords(0.0, 0.0, 50.0, 0.0), 5.0)),
        vec![stored_roi(1, 1), stored_roi(2, 3)],
    );
    let b_reply = analysis(Some(ten_px_per_um()), vec![stored_roi(7, 2)]);

    let mut ws = Workspace::default();
    ws.select_image("a.tif");
    let (load_a, _) = single_request(&mut ws);
    ws.select_image("b.tif");
    let (load_b, call) = single_request(&mut ws);
    assert_eq!(call.filename(), Some("b.tif"));

    ws.handle_response(load_b, Ok(b_reply.clone()));
    ws.handle_response(load_a, Ok(a_reply));

    let mut fresh = Workspace::default();
    fresh.select_image("b.tif");
    let (load, _) = single_request(&mut fresh);
    fresh.handle_response(load, Ok(b_reply));

    assert_eq!(ws.selected_image(), Some("b.tif"));
    assert_eq!(ws.calibration(), fresh.calibration());
    assert_eq!(ws.summaries(), fresh.summaries());
    assert_eq!(ws.session(), fresh.session());
    assert_eq!(ws.notice(), fresh.notice());
    assert!(!ws.is_calibration_resolved("a.tif"));
    assert!(drain_requests(&mut ws).is_empty());
}

#[test]
fn test_stale_load_arriving_first_is_ignored() {
    let mut ws = Workspace::default();
    ws.select_image("a.tif");
    let (load_a, _) = single_request(&mut ws);
    ws.select_image("b.tif");
    let (load_b, _) = single_request(&mut ws);

    ws.handle_response(load_a, Ok(analysis(Some(ten_px_per_um()), vec![stored_roi(1, 1)])));
    assert!(ws.rois().is_empty());
    assert_eq!(ws.calibration(), &Calibration::default());

    ws.handle_response(load_b, Err(RemoteError::NotFound));
    let (_, call) = single_request(&mut ws);
    assert_eq!(
        call,
        RemoteCall::DetectScaleBar {
            filename: "b.tif".into()
        }
    );
}

#[test]
fn test_reselecting_same_image_invalidates_old_load() {
    let mut ws = Workspace::default();
    ws.select_image("a.tif");
    let (first, _) = single_request(&mut ws);
    ws.select_image("b.tif");
    drain_requests(&mut ws);
    ws.select_image("a.tif");
    let (second, _) = single_request(&mut ws);

    ws.handle_response(first, Ok(analysis(None, vec![stored_roi(1, 1)])));
    assert!(ws.rois().is_empty());

    ws.handle_response(second, Ok(analysis(None, vec![stored_roi(4, 1)])));
    assert!(ws.rois().contains(4));
}

#[test]
fn test_load_adopts_stored_rois_verbatim() {
    let mut ws = Workspace::default();
    ws.select_image("a.tif");
    let (id, _) = single_request(&mut ws);
    ws.handle_response(id, Ok(analysis(Some(ten_px_per_um()), vec![stored_roi(3, 5)])));

    let roi = ws.rois().get(3).expect("roi 3");
    assert_eq!(roi.version, 5);
    // Stored areas are not re-derived on load.
    assert!(approx_eq(roi.area_um2, 1.0));
    assert!(ws.is_calibration_resolved("a.tif"));
    assert_eq!(ws.last_known_calibration(), Some(ten_px_per_um()));
    assert!(drain_requests(&mut ws).is_empty());
}

#[test]
fn test_load_rois_without_scale_bar() {
    let mut ws = Workspace::default();
    ws.select_image("a.tif");
    let (id, _) = single_request(&mut ws);
    ws.handle_response(id, Ok(analysis(None, vec![stored_roi(1, 1)])));

    assert_eq!(ws.rois().len(), 1);
    assert!(ws.calibration().scale_bar.is_none());
    assert!(ws.is_calibration_resolved("a.tif"));
    assert!(ws.last_known_calibration().is_none());
    assert!(drain_requests(&mut ws).is_empty());
}

#[test]
fn test_load_calibration_only() {
    let ws = calibrated_workspace("a.tif");
    assert_eq!(ws.calibration(), &ten_px_per_um());
    assert_eq!(ws.last_known_calibration(), Some(ten_px_per_um()));
    assert!(!ws.is_calibration_resolved("a.tif"));
    assert!(approx_eq(ws.px_per_um(), 10.0));
}

#[test]
fn test_detection_attempted_once_per_image() {
    let mut ws = Workspace::default();
    ws.select_image("a.tif");
    let (load, _) = single_request(&mut ws);
    ws.handle_response(load, Err(RemoteError::NotFound));
    let (detect, call) = single_request(&mut ws);
    assert!(matches!(call, RemoteCall::DetectScaleBar { .. }));

    ws.handle_response(detect, Err(RemoteError::NotFound));
    assert!(ws.is_detection_attempted("a.tif"));
    let notice = ws.notice().expect("notice");
    assert_eq!(notice.level, NoticeLevel::Warning);
    assert!(notice.text.contains("define it manually"));

    ws.select_image("b.tif");
    drain_requests(&mut ws);
    ws.select_image("a.tif");
    let (load, _) = single_request(&mut ws);
    ws.handle_response(load, Err(RemoteError::NotFound));
    assert!(drain_requests(&mut ws).is_empty());
}

#[test]
fn test_stale_detection_not_marked_attempted() {
    let mut ws = Workspace::default();
    ws.select_image("a.tif");
    let (load, _) = single_request(&mut ws);
    ws.handle_response(load, Err(RemoteError::NotFound));
    let (detect, _) = single_request(&mut ws);

    ws.select_image("b.tif");
    ws.handle_response(detect, Err(RemoteError::NotFound));
    assert!(!ws.is_detection_attempted("a.tif"));
    assert!(ws.notice().is_none());
}

#[test]
fn test_detection_success() {
    let mut ws = Workspace::default();
    ws.select_image("a.tif");
    ws.set_image_size(200.0, 100.0);
    let (load, _) = single_request(&mut ws);
    ws.handle_response(load, Err(RemoteError::NotFound));
    let (detect, _) = single_request(&mut ws);

    ws.handle_response(
        detect,
        Ok(Reply::ScaleBar(ScaleBar::from_coords(10.0, 90.0, 400.0, 90.0))),
    );

    let bar = ws.calibration().scale_bar.expect("scale bar");
    assert!(approx_eq(bar.p2.x, 200.0));
    assert!(approx_eq(ws.calibration().scale_um, 100.0));
    assert_eq!(ws.last_known_calibration(), Some(*ws.calibration()));

    let (requests, timers) = drain(&mut ws);
    assert_eq!(requests.len(), 1);
    assert!(matches!(requests[0].1, RemoteCall::SaveCalibration { .. }));
    assert_eq!(timers.len(), 1);
    assert_eq!(timers[0].1, Duration::from_secs(4));

    let notice = ws.notice().expect("notice").clone();
    assert_eq!(notice.level, NoticeLevel::Info);
    ws.handle_timer(timers[0].0);
    assert!(ws.notice().is_none());
}

#[test]
fn test_failed_calibration_persist_is_silent() {
    let mut ws = Workspace::default();
    ws.select_image("a.tif");
    let (load, _) = single_request(&mut ws);
    ws.handle_response(load, Err(RemoteError::NotFound));
    let (detect, _) = single_request(&mut ws);
    ws.handle_response(
        detect,
        Ok(Reply::ScaleBar(ScaleBar::from_coords(0.0, 0.0, 50.0, 0.0))),
    );
    let (save, _) = single_request(&mut ws);
    let before = ws.notice().cloned();

    ws.handle_response(save, Err(server_error()));
    assert_eq!(ws.notice().cloned(), before);
    assert!(drain_requests(&mut ws).is_empty());
}

#[test]
fn test_detection_failure_falls_back_to_last_known() {
    let mut ws = calibrated_workspace("a.tif");
    ws.select_image("b.tif");
    let (load, _) = single_request(&mut ws);
    ws.handle_response(load, Err(RemoteError::NotFound));
    let (detect, _) = single_request(&mut ws);
    ws.handle_response(detect, Err(RemoteError::NotFound));

    assert_eq!(ws.calibration(), &ten_px_per_um());
    assert!(ws.is_detection_attempted("b.tif"));
    // Fallback is not persisted.
    assert!(drain_requests(&mut ws).is_empty());
}

#[test]
fn test_reload_after_attempt_uses_last_known() {
    let mut ws = Workspace::default();
    ws.select_image("b.tif");
    let (load, _) = single_request(&mut ws);
    ws.handle_response(load, Err(RemoteError::NotFound));
    let (detect, _) = single_request(&mut ws);
    ws.handle_response(detect, Err(RemoteError::NotFound));

    ws.select_image("a.tif");
    let (load, _) = single_request(&mut ws);
    ws.handle_response(load, Ok(analysis(Some(ten_px_per_um()), Vec::new())));

    ws.select_image("b.tif");
    let (load, _) = single_request(&mut ws);
    ws.handle_response(load, Err(RemoteError::NotFound));
    assert_eq!(ws.calibration(), &ten_px_per_um());
    assert!(drain_requests(&mut ws).is_empty());
}

#[test]
fn test_load_error_surfaces_and_detects() {
    let mut ws = Workspace::default();
    ws.select_image("a.tif");
    let (load, _) = single_request(&mut ws);
    ws.handle_response(load, Err(server_error()));

    assert!(ws.notice().is_some_and(|n| n.is_error()));
    let (_, call) = single_request(&mut ws);
    assert!(matches!(call, RemoteCall::DetectScaleBar { .. }));
}

#[test]
fn test_unknown_response_ignored() {
    let mut ws = calibrated_workspace("a.tif");
    ws.handle_response(RequestId(999), Err(server_error()));
    assert!(ws.notice().is_none());
}

#[test]
fn test_image_list_and_navigation() {
    let mut ws = Workspace::default();
    ws.refresh_images();
    let (id, call) = single_request(&mut ws);
    assert_eq!(call, RemoteCall::ListImages);
    ws.handle_response(
        id,
        Ok(Reply::Images(vec![
            ImageEntry::new("a.tif"),
            ImageEntry::new("b.tif"),
            ImageEntry::new("c.tif"),
        ])),
    );
    assert_eq!(ws.images().len(), 3);

    assert_eq!(ws.select_next_image(), Some("a.tif"));
    assert_eq!(ws.select_next_image(), Some("b.tif"));
    assert_eq!(ws.select_previous_image(), Some("a.tif"));
    drain_requests(&mut ws);

    // Navigation stops at both ends of the list.
    assert_eq!(ws.select_previous_image(), None);
    assert_eq!(ws.selected_image(), Some("a.tif"));
    assert!(drain_requests(&mut ws).is_empty());

    ws.select_image("c.tif");
    drain_requests(&mut ws);
    assert_eq!(ws.select_next_image(), None);
    assert_eq!(ws.selected_image(), Some("c.tif"));
    assert!(drain_requests(&mut ws).is_empty());
}

#[test]
fn test_previous_without_selection_picks_last() {
    let mut ws = Workspace::default();
    ws.refresh_images();
    let (id, _) = single_request(&mut ws);
    ws.handle_response(
        id,
        Ok(Reply::Images(vec![ImageEntry::new("a.tif"), ImageEntry::new("b.tif")])),
    );
    assert_eq!(ws.select_previous_image(), Some("b.tif"));
}

#[test]
fn test_image_list_failure_notice() {
    let mut ws = Workspace::default();
    ws.refresh_images();
    let (id, _) = single_request(&mut ws);
    ws.handle_response(id, Err(RemoteError::Network("refused".into())));

    let notice = ws.notice().expect("notice");
    assert_eq!(notice.text, "Failed to fetch images.");
    assert!(ws.images().is_empty());
}

#[test]
fn test_navigation_without_images() {
    let mut ws = Workspace::default();
    assert_eq!(ws.select_next_image(), None);
    assert!(drain_requests(&mut ws).is_empty());
}
