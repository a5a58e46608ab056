pub mod test_utils;

use std::sync::atomic::{AtomicBool, Ordering};
use wakemap_core::geodesy::GeoPoint;
use wakemap_core::route_simulator::{simulate, RouteSteps, SimulationParams, BROUGHTON_TO_NEWCASTLE};
use wakemap_core::storage::{drive_simulation, RunStatus, Storage, BROUGHTON_TO_NEWCASTLE_NAME};

#[test]
fn simulate_and_analyze() {
    let (_temp_dir, db_path) = test_utils::temp_db_path("storage-simulate_and_analyze");
    let storage = Storage::open(&db_path).unwrap();
    let cancel = AtomicBool::new(false);
    let params = SimulationParams::new(30., 60);

    let report = storage
        .simulate_broughton_to_newcastle(params, &cancel)
        .unwrap();
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.speed_knots, 30.);
    assert_eq!(report.interval_seconds, 60);

    let expected = simulate(&BROUGHTON_TO_NEWCASTLE, params, 0);
    assert_eq!(report.points, expected.points.len());

    let track = storage.load_track(report.track_id).unwrap().unwrap();
    assert_eq!(track.header.name, BROUGHTON_TO_NEWCASTLE_NAME);
    assert_eq!(track.header.ended_at, Some(report.ended_at));
    assert_eq!(report.ended_at - track.header.started_at, expected.end_time);
    assert_eq!(track.points.len(), report.points);
    test_utils::assert_same_position(
        track.points.last().unwrap().position,
        GeoPoint::new(-32.92, 151.79),
    );

    let stats = storage.track_stats(report.track_id).unwrap().unwrap();
    assert_eq!(stats.coordinates.len(), report.points);
    assert_eq!(stats.started_at, track.header.started_at);
    assert_eq!(stats.ended_at, report.ended_at);
    // every simulated point carries its speed
    assert!(stats.speeds.iter().all(|s| s.is_some()));
    let recorded_m = track.header.distance_m.unwrap();
    assert!((recorded_m - stats.distance_m).abs() < 1e-6);

    let listed = storage.list_tracks(10).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, report.track_id);
}

#[test]
fn invalid_params_are_normalized() {
    let (_temp_dir, db_path) = test_utils::temp_db_path("storage-normalized");
    let storage = Storage::open(&db_path).unwrap();
    let short_route = [GeoPoint::new(-33., 151.), GeoPoint::new(-33., 151.001)];
    let report = storage
        .run_simulation(
            "short",
            &short_route,
            SimulationParams::new(0., 0),
            &AtomicBool::new(false),
        )
        .unwrap();
    assert_eq!(report.speed_knots, 6.);
    assert_eq!(report.interval_seconds, 10);
}

#[test]
fn canceled_before_start() {
    let (_temp_dir, db_path) = test_utils::temp_db_path("storage-canceled");
    let storage = Storage::open(&db_path).unwrap();
    let cancel = AtomicBool::new(true);
    let report = storage
        .simulate_broughton_to_newcastle(SimulationParams::default(), &cancel)
        .unwrap();
    assert_eq!(report.status, RunStatus::Canceled);
    assert_eq!(report.points, 0);

    // the track exists, finalized at its start time
    let track = storage.load_track(report.track_id).unwrap().unwrap();
    assert!(track.points.is_empty());
    assert_eq!(track.header.ended_at, Some(track.header.started_at));

    let feature = storage.track_feature(report.track_id).unwrap().unwrap();
    assert_eq!(feature["bbox"], serde_json::json!([0.0, 0.0, 0.0, 0.0]));
}

#[test]
fn cancel_mid_run_keeps_prefix() {
    let cancel = AtomicBool::new(false);
    let steps = RouteSteps::new(&BROUGHTON_TO_NEWCASTLE, SimulationParams::default(), 0);
    let mut seen = Vec::new();
    let outcome = drive_simulation(steps, &cancel, |index, point| {
        seen.push(point.clone());
        if index == 4 {
            cancel.store(true, Ordering::Relaxed);
        }
        Ok(())
    })
    .unwrap();
    assert_eq!(outcome.status, RunStatus::Canceled);
    assert_eq!(outcome.points, 5);
    assert_eq!(outcome.last_time, Some(40));
    assert_eq!(
        seen,
        simulate(&BROUGHTON_TO_NEWCASTLE, SimulationParams::default(), 0).points[..5]
    );
}

#[test]
fn sink_failure_aborts() {
    let cancel = AtomicBool::new(false);
    let steps = RouteSteps::new(&BROUGHTON_TO_NEWCASTLE, SimulationParams::default(), 0);
    let mut calls = 0;
    let result = drive_simulation(steps, &cancel, |index, _| {
        calls += 1;
        if index == 2 {
            Err(anyhow::anyhow!("disk full"))
        } else {
            Ok(())
        }
    });
    let err = result.err().unwrap();
    assert_eq!(err.to_string(), "disk full");
    assert_eq!(calls, 3);
}

#[test]
fn unknown_track() {
    let (_temp_dir, db_path) = test_utils::temp_db_path("storage-unknown");
    let storage = Storage::open(&db_path).unwrap();
    assert!(storage.load_track(99).unwrap().is_none());
    assert!(storage.track_stats(99).unwrap().is_none());
    assert!(storage.track_feature(99).unwrap().is_none());
}

#[test]
fn delete_track() {
    let (_temp_dir, db_path) = test_utils::temp_db_path("storage-delete");
    let storage = Storage::open(&db_path).unwrap();
    let report = storage
        .simulate_broughton_to_newcastle(SimulationParams::new(40., 120), &AtomicBool::new(false))
        .unwrap();
    storage.delete_track(report.track_id).unwrap();
    assert!(storage.load_track(report.track_id).unwrap().is_none());
    storage.flush().unwrap();
}
