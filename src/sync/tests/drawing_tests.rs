//! Tests for drawing sessions, confirm and delete.

use super::*;
use crate::error::ValidationError;
use crate::remote::ImageEntry;
use crate::session::SessionMode;
use crate::viewport::ZoomDirection;

#[test]
fn test_first_roi_gets_id_one() {
    let mut ws = calibrated_workspace("a.tif");
    let id = confirm_polygon(&mut ws, &square(0.0, 0.0, 10.0));
    assert_eq!(id, 1);

    let roi = ws.rois().get(1).expect("roi");
    assert_eq!(roi.version, 1);
    assert!(approx_eq(roi.area_px2, 100.0));
    assert!(approx_eq(roi.area_um2, 1.0));
    assert!(!ws.session().is_drawing());
}

#[test]
fn test_ids_follow_max_existing() {
    let mut ws = Workspace::default();
    ws.select_image("a.tif");
    let (load, _) = single_request(&mut ws);
    let stored = Roi::from_stored(5, 1, square(0.0, 0.0, 4.0), 16.0, 0.0, None);
    ws.handle_response(load, Ok(analysis(None, vec![stored])));

    assert_eq!(confirm_polygon(&mut ws, &square(20.0, 0.0, 4.0)), 6);
}

#[test]
fn test_ids_restart_after_delete() {
    let mut ws = calibrated_workspace("a.tif");
    confirm_polygon(&mut ws, &square(0.0, 0.0, 10.0));
    confirm_polygon(&mut ws, &square(20.0, 0.0, 10.0));
    assert_eq!(ws.rois().len(), 2);

    ws.delete_analysis().expect("delete");
    let (id, call) = single_request(&mut ws);
    assert_eq!(
        call,
        RemoteCall::DeleteAnalysis {
            filename: "a.tif".into()
        }
    );
    ws.handle_response(id, Ok(Reply::Ack));
    assert!(ws.rois().is_empty());
    assert_eq!(ws.calibration(), &Calibration::default());

    assert_eq!(confirm_polygon(&mut ws, &square(0.0, 0.0, 10.0)), 1);
}

#[test]
fn test_modification_bumps_only_target_version() {
    let mut ws = calibrated_workspace("a.tif");
    let first = confirm_polygon(&mut ws, &square(0.0, 0.0, 10.0));
    let second = confirm_polygon(&mut ws, &square(20.0, 0.0, 10.0));
    let third = confirm_polygon(&mut ws, &square(40.0, 0.0, 10.0));

    modify_polygon(&mut ws, second, &square(20.0, 0.0, 20.0));

    assert_eq!(ws.rois().get(first).map(|r| r.version), Some(1));
    assert_eq!(ws.rois().get(second).map(|r| r.version), Some(2));
    assert_eq!(ws.rois().get(third).map(|r| r.version), Some(1));
    assert!(approx_eq(
        ws.rois().get(second).map_or(0.0, |r| r.area_px2),
        400.0
    ));
    assert_eq!(ws.rois().len(), 3);
}

#[test]
fn test_modification_carries_unsent_notes() {
    let mut ws = calibrated_workspace("a.tif");
    let id = confirm_polygon(&mut ws, &square(0.0, 0.0, 10.0));
    ws.update_notes_local(id, "large pore").expect("notes");

    ws.start_modifying(id).expect("modify");
    ws.confirm().expect("confirm");
    let (_, call) = single_request(&mut ws);
    let payload = roi_payload(&call);
    assert_eq!(payload.notes, "large pore");
    assert_eq!(payload.version, 2);
    assert!(!payload.is_notes_only);
}

#[test]
fn test_confirm_needs_three_points() {
    let mut ws = calibrated_workspace("a.tif");
    ws.start_drawing().expect("start");
    ws.add_point(Point::new(0.0, 0.0)).expect("add");
    ws.add_point(Point::new(5.0, 0.0)).expect("add");

    assert_eq!(
        ws.confirm(),
        Err(ValidationError::TooFewPoints {
            required: 3,
            actual: 2
        })
    );
    assert!(drain_requests(&mut ws).is_empty());
    assert!(ws.session().is_drawing());
    assert!(ws.notice().is_none());
}

#[test]
fn test_confirm_without_selection() {
    let mut ws = Workspace::default();
    assert_eq!(ws.start_drawing(), Err(ValidationError::NoImageSelected));
    assert_eq!(ws.confirm(), Err(ValidationError::NoImageSelected));
}

#[test]
fn test_confirm_failure_keeps_session() {
    let mut ws = calibrated_workspace("a.tif");
    ws.start_drawing().expect("start");
    for p in square(0.0, 0.0, 10.0) {
        ws.add_point(p).expect("add");
    }
    ws.confirm().expect("confirm");
    assert!(ws.session().is_submitting());
    assert_eq!(ws.add_point(Point::new(1.0, 1.0)), Err(ValidationError::Submitting));
    assert_eq!(ws.cancel_drawing(), Err(ValidationError::Submitting));

    let (id, _) = single_request(&mut ws);
    ws.handle_response(id, Err(server_error()));

    assert!(ws.rois().is_empty());
    assert_eq!(ws.session().mode(), Some(SessionMode::New));
    assert!(!ws.session().is_submitting());
    assert_eq!(ws.session().points().len(), 4);
    assert!(ws.notice().is_some_and(|n| n.is_error()));

    // Another attempt goes through.
    ws.confirm().expect("confirm again");
    let (id, _) = single_request(&mut ws);
    ws.handle_response(id, Ok(Reply::Ack));
    assert_eq!(ws.rois().len(), 1);
}

#[test]
fn test_stale_confirm_ignored() {
    let mut ws = calibrated_workspace("a.tif");
    ws.start_drawing().expect("start");
    for p in square(0.0, 0.0, 10.0) {
        ws.add_point(p).expect("add");
    }
    ws.confirm().expect("confirm");
    let (id, _) = single_request(&mut ws);

    ws.select_image("b.tif");
    ws.handle_response(id, Ok(Reply::Ack));
    assert!(ws.rois().is_empty());
    assert!(!ws.session().is_drawing());
}

#[test]
fn test_confirm_marks_image_has_data() {
    let mut ws = Workspace::default();
    ws.refresh_images();
    let (id, _) = single_request(&mut ws);
    ws.handle_response(id, Ok(Reply::Images(vec![ImageEntry::new("a.tif")])));
    ws.select_image("a.tif");
    let (load, _) = single_request(&mut ws);
    ws.handle_response(load, Ok(analysis(Some(ten_px_per_um()), Vec::new())));

    confirm_polygon(&mut ws, &square(0.0, 0.0, 10.0));
    assert!(ws.images()[0].has_data);

    ws.delete_analysis().expect("delete");
    let (id, _) = single_request(&mut ws);
    ws.handle_response(id, Ok(Reply::Ack));
    assert!(!ws.images()[0].has_data);
}

#[test]
fn test_delete_failure_keeps_state() {
    let mut ws = calibrated_workspace("a.tif");
    confirm_polygon(&mut ws, &square(0.0, 0.0, 10.0));
    ws.delete_analysis().expect("delete");
    let (id, _) = single_request(&mut ws);
    ws.handle_response(id, Err(server_error()));

    assert_eq!(ws.rois().len(), 1);
    assert_eq!(ws.calibration(), &ten_px_per_um());
    assert!(ws.notice().is_some_and(|n| n.is_error()));
}

#[test]
fn test_delete_clears_drawing_session() {
    let mut ws = calibrated_workspace("a.tif");
    ws.start_drawing().expect("start");
    ws.add_point(Point::new(1.0, 1.0)).expect("add");
    ws.delete_analysis().expect("delete");
    let (id, _) = single_request(&mut ws);
    ws.handle_response(id, Ok(Reply::Ack));
    assert!(!ws.session().is_drawing());
}

#[test]
fn test_delete_refused_while_confirm_in_flight() {
    let mut ws = calibrated_workspace("a.tif");
    confirm_polygon(&mut ws, &square(0.0, 0.0, 10.0));
    ws.start_drawing().expect("start");
    for p in square(20.0, 0.0, 10.0) {
        ws.add_point(p).expect("add");
    }
    ws.confirm().expect("confirm");
    let (pending, _) = single_request(&mut ws);

    assert_eq!(ws.delete_analysis(), Err(ValidationError::Submitting));
    assert!(drain_requests(&mut ws).is_empty());

    ws.handle_response(pending, Ok(Reply::Ack));
    assert_eq!(ws.rois().len(), 2);
    ws.delete_analysis().expect("delete");
    let (delete, _) = single_request(&mut ws);
    ws.handle_response(delete, Ok(Reply::Ack));
    assert!(ws.rois().is_empty());
}

#[test]
fn test_cannot_modify_while_drawing() {
    let mut ws = calibrated_workspace("a.tif");
    let id = confirm_polygon(&mut ws, &square(0.0, 0.0, 10.0));
    ws.start_drawing().expect("start");
    assert_eq!(ws.start_modifying(id), Err(ValidationError::SessionBusy));
    assert_eq!(ws.start_modifying(42), Err(ValidationError::SessionBusy));
    ws.cancel_drawing().expect("cancel");
    assert_eq!(ws.start_modifying(42), Err(ValidationError::UnknownRoi(42)));
}

#[test]
fn test_session_area_live() {
    let mut ws = calibrated_workspace("a.tif");
    ws.start_drawing().expect("start");
    for p in square(0.0, 0.0, 20.0).into_iter().take(3) {
        ws.add_point(p).expect("add");
    }
    let (px2, um2) = ws.session_area();
    assert!(approx_eq(px2, 200.0));
    assert!(approx_eq(um2, 2.0));

    ws.remove_last_point().expect("remove");
    assert!(approx_eq(ws.session_area().0, 0.0));
}

#[test]
fn test_pointer_points_map_through_viewport() {
    let mut ws = calibrated_workspace("a.tif");
    ws.set_container_size(400.0, 200.0);
    ws.set_image_size(200.0, 100.0);
    // Fit: scale 1.9, image centered.
    assert!(approx_eq(ws.viewport().scale, 1.9));

    ws.start_drawing().expect("start");
    let screen = ws.viewport().to_screen_space(Point::new(50.0, 25.0));
    ws.add_point_at_pointer(screen).expect("add");
    let p = ws.session().points()[0];
    assert!((p.x - 50.0).abs() < 1e-6);
    assert!((p.y - 25.0).abs() < 1e-6);

    // Off-image pointers are clamped to the image.
    ws.add_point_at_pointer(Point::new(-100.0, 1000.0)).expect("add");
    assert_eq!(ws.session().points()[1], Point::new(0.0, 100.0));

    ws.move_point_at_pointer(1, screen).expect("move");
    assert!((ws.session().points()[1].x - 50.0).abs() < 1e-6);
}

#[test]
fn test_zoom_keeps_pointer_fixed() {
    let mut ws = calibrated_workspace("a.tif");
    let pointer = Point::new(120.0, 80.0);
    let before = ws.viewport().to_image_space(pointer);
    ws.zoom_at_pointer(pointer, ZoomDirection::In);
    let after = ws.viewport().to_image_space(pointer);
    assert!(approx_eq(ws.viewport().scale, 1.1));
    assert!((before.x - after.x).abs() < 1e-9);
    assert!((before.y - after.y).abs() < 1e-9);

    ws.pan_by(10.0, -5.0);
    assert!(approx_eq(ws.viewport().offset.x, pointer.x - (pointer.x * 1.1) + 10.0));
}
