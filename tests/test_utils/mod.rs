#![allow(dead_code)]

use std::path::PathBuf;

use tempdir::TempDir;
use wakemap_core::geodesy::GeoPoint;
use wakemap_core::track::TrackPoint;

pub const EPS_DEG: f64 = 1e-9;

/// A scratch directory and the database path inside it. Keep the `TempDir`
/// alive for as long as the database is used.
pub fn temp_db_path(name: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new(name).unwrap();
    println!("temp dir: {:?}", temp_dir.path());
    let db_path = temp_dir.path().join("wakemap.db");
    (temp_dir, db_path)
}

pub fn fix(time: i64, lon: f64, lat: f64) -> TrackPoint {
    TrackPoint::at(time, GeoPoint::new(lat, lon))
}

pub fn fix_with_speed(time: i64, lon: f64, lat: f64, sog_ms: f64) -> TrackPoint {
    TrackPoint {
        sog_ms: Some(sog_ms),
        ..fix(time, lon, lat)
    }
}

pub fn assert_same_position(a: GeoPoint, b: GeoPoint) {
    assert!(
        (a.latitude - b.latitude).abs() <= EPS_DEG && (a.longitude - b.longitude).abs() <= EPS_DEG,
        "{:?} != {:?}",
        a,
        b
    );
}

// A loose grid over the globe, poles and the antimeridian included.
pub fn sample_points() -> Vec<GeoPoint> {
    let mut points = Vec::new();
    for lat in [-90., -60.5, -32.92, 0., 17.25, 45., 89.9, 90.] {
        for lon in [-180., -151.79, -0.001, 0., 33.3, 152.4, 180.] {
            points.push(GeoPoint::new(lat, lon));
        }
    }
    points
}
