pub mod test_utils;

use test_utils::{fix, fix_with_speed};
use wakemap_core::geodesy::GeoPoint;
use wakemap_core::main_db::MainDb;
use wakemap_core::track::TrackPoint;
use wakemap_core::track_analyzer::BoundingBox;

#[test]
fn basic() {
    let (_temp_dir, db_path) = test_utils::temp_db_path("main_db-basic");
    let mut main_db = MainDb::open(&db_path).unwrap();

    let track_id = main_db
        .with_txn(|txn| txn.create_track("Evening sail", 1000))
        .unwrap();
    let full = TrackPoint {
        time: 1010,
        position: GeoPoint::new(-33.85, 151.2),
        sog_ms: Some(2.5),
        cog_rad: Some(1.25),
        source: Some("gps".to_string()),
        quality: Some(3),
    };
    main_db
        .with_txn(|txn| {
            // inserted out of order on purpose
            txn.insert_position(track_id, &full)?;
            txn.insert_position(track_id, &fix(1000, 151.18, -33.86))?;
            txn.insert_position(track_id, &fix(1020, 151.23, -33.83))?;
            Ok(())
        })
        .unwrap();

    let header = main_db
        .with_txn(|txn| txn.get_track(track_id))
        .unwrap()
        .unwrap();
    assert_eq!(header.name, "Evening sail");
    assert_eq!(header.started_at, 1000);
    assert_eq!(header.ended_at, None);

    let points = main_db
        .with_txn(|txn| txn.load_positions(track_id))
        .unwrap();
    assert_eq!(
        points.iter().map(|p| p.time).collect::<Vec<_>>(),
        vec![1000, 1010, 1020]
    );
    // optional fields survive as `None`, not as zero
    assert_eq!(points[0], fix(1000, 151.18, -33.86));
    assert_eq!(points[1], full);

    main_db
        .with_txn(|txn| txn.end_track(track_id, 1020))
        .unwrap();
    let header = main_db
        .with_txn(|txn| txn.get_track(track_id))
        .unwrap()
        .unwrap();
    assert_eq!(header.ended_at, Some(1020));
    assert_eq!(header.distance_m, None);

    main_db
        .with_txn(|txn| txn.set_track_distance(track_id, 1234.5))
        .unwrap();
    let header = main_db
        .with_txn(|txn| txn.get_track(track_id))
        .unwrap()
        .unwrap();
    assert_eq!(header.distance_m, Some(1234.5));
    assert!(main_db
        .with_txn(|txn| txn.set_track_distance(track_id + 1, 1.))
        .is_err());
}

#[test]
fn reopen_keeps_data() {
    let (_temp_dir, db_path) = test_utils::temp_db_path("main_db-reopen");
    let track_id = {
        let mut main_db = MainDb::open(&db_path).unwrap();
        main_db
            .with_txn(|txn| {
                let id = txn.create_track("persisted", 5)?;
                txn.insert_position(id, &fix_with_speed(5, 151.0, -33.0, 1.0))?;
                Ok(id)
            })
            .unwrap()
    };
    // migrations must not run twice
    let mut main_db = MainDb::open(&db_path).unwrap();
    let points = main_db
        .with_txn(|txn| txn.load_positions(track_id))
        .unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].sog_ms, Some(1.0));
}

#[test]
fn missing_tracks() {
    let (_temp_dir, db_path) = test_utils::temp_db_path("main_db-missing");
    let mut main_db = MainDb::open(&db_path).unwrap();
    assert_eq!(main_db.with_txn(|txn| txn.get_track(42)).unwrap(), None);
    assert!(main_db.with_txn(|txn| txn.end_track(42, 1)).is_err());
    assert!(main_db.with_txn(|txn| txn.delete_track(42)).is_err());
    assert!(main_db
        .with_txn(|txn| txn.load_positions(42))
        .unwrap()
        .is_empty());
    assert_eq!(main_db.with_txn(|txn| txn.track_bbox(42)).unwrap(), None);
}

#[test]
fn positions_require_a_track() {
    let (_temp_dir, db_path) = test_utils::temp_db_path("main_db-fk");
    let mut main_db = MainDb::open(&db_path).unwrap();
    assert!(main_db
        .with_txn(|txn| txn.insert_position(7, &fix(0, 151.0, -33.0)))
        .is_err());
}

#[test]
fn list_tracks() {
    let (_temp_dir, db_path) = test_utils::temp_db_path("main_db-list_tracks");
    let mut main_db = MainDb::open(&db_path).unwrap();
    main_db
        .with_txn(|txn| {
            for i in 0..60 {
                txn.create_track(&format!("track {}", i), 1000 + i)?;
            }
            Ok(())
        })
        .unwrap();

    let tracks = main_db.with_txn(|txn| txn.list_tracks(3)).unwrap();
    assert_eq!(
        tracks.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
        vec!["track 59", "track 58", "track 57"]
    );
    // out of range limits fall back to 50
    assert_eq!(main_db.with_txn(|txn| txn.list_tracks(0)).unwrap().len(), 50);
    assert_eq!(main_db.with_txn(|txn| txn.list_tracks(-1)).unwrap().len(), 50);
    assert_eq!(main_db.with_txn(|txn| txn.list_tracks(201)).unwrap().len(), 50);
    assert_eq!(main_db.with_txn(|txn| txn.list_tracks(200)).unwrap().len(), 60);
}

#[test]
fn bbox_and_spatial_lookup() {
    let (_temp_dir, db_path) = test_utils::temp_db_path("main_db-bbox");
    let mut main_db = MainDb::open(&db_path).unwrap();
    let (harbour, offshore, inside_id) = main_db
        .with_txn(|txn| {
            let harbour = txn.create_track("harbour", 0)?;
            let inside = txn.insert_position(harbour, &fix(0, 151.20, -33.86))?;
            txn.insert_position(harbour, &fix(10, 151.25, -33.84))?;
            let offshore = txn.create_track("offshore", 0)?;
            txn.insert_position(offshore, &fix(0, 152.40, -32.60))?;
            Ok((harbour, offshore, inside))
        })
        .unwrap();

    let bbox = main_db
        .with_txn(|txn| txn.track_bbox(harbour))
        .unwrap()
        .unwrap();
    assert_eq!(bbox.to_array(), [151.20, -33.86, 151.25, -33.84]);

    let query = BoundingBox {
        min_lon: 151.0,
        min_lat: -34.0,
        max_lon: 151.22,
        max_lat: -33.0,
    };
    let ids = main_db
        .with_txn(|txn| txn.positions_in_bbox(&query))
        .unwrap();
    assert_eq!(ids, vec![inside_id]);

    main_db
        .with_txn(|txn| txn.delete_track(harbour))
        .unwrap();
    assert!(main_db
        .with_txn(|txn| txn.positions_in_bbox(&query))
        .unwrap()
        .is_empty());
    assert!(main_db
        .with_txn(|txn| txn.load_positions(harbour))
        .unwrap()
        .is_empty());
    assert_eq!(
        main_db
            .with_txn(|txn| txn.load_positions(offshore))
            .unwrap()
            .len(),
        1
    );
}
