use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::geodesy::{self, GeoPoint};
use crate::geojson;
use crate::main_db::MainDb;
use crate::route_simulator::{RouteSteps, SimulationParams, BROUGHTON_TO_NEWCASTLE};
use crate::track::{Track, TrackHeader, TrackId, TrackPoint};
use crate::track_analyzer::{self, TrackStats};

pub const BROUGHTON_TO_NEWCASTLE_NAME: &str = "Sim: Broughton→Newcastle (SSW)";

// runs planned beyond this many points get a warning, they hold the db for long
const LONG_RUN_POINTS: u64 = 100_000;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Canceled,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SimulationReport {
    pub track_id: TrackId,
    pub points: usize,
    pub ended_at: i64,
    pub speed_knots: f64,
    pub interval_seconds: i64,
    pub status: RunStatus,
}

pub struct RunOutcome {
    pub points: usize,
    // time of the last point handed to the sink
    pub last_time: Option<i64>,
    pub status: RunStatus,
}

/// Feeds generated points to `sink` one at a time. `cancel` is checked
/// before each point; the first sink error aborts the run and is returned
/// as is.
pub fn drive_simulation<F>(
    steps: impl Iterator<Item = TrackPoint>,
    cancel: &AtomicBool,
    mut sink: F,
) -> Result<RunOutcome>
where
    F: FnMut(usize, &TrackPoint) -> Result<()>,
{
    let mut points = 0;
    let mut last_time = None;
    for point in steps {
        if cancel.load(Ordering::Relaxed) {
            return Ok(RunOutcome {
                points,
                last_time,
                status: RunStatus::Canceled,
            });
        }
        sink(points, &point)?;
        points += 1;
        last_time = Some(point.time);
    }
    Ok(RunOutcome {
        points,
        last_time,
        status: RunStatus::Completed,
    })
}

pub struct Storage {
    pub main_db: Mutex<MainDb>,
}

impl Storage {
    pub fn open(db_path: &Path) -> Result<Self> {
        let main_db = MainDb::open(db_path)?;
        Ok(Storage {
            main_db: Mutex::new(main_db),
        })
    }

    fn with_db<F, O>(&self, f: F) -> Result<O>
    where
        F: FnOnce(&mut MainDb) -> Result<O>,
    {
        let mut main_db = self
            .main_db
            .lock()
            .map_err(|_| anyhow!("main db lock poisoned"))?;
        f(&mut main_db)
    }

    /// Simulates `waypoints` into a new track starting now. Each point is
    /// committed as soon as it is generated, so a failure leaves the prefix
    /// (and an unset end time) behind.
    pub fn run_simulation(
        &self,
        name: &str,
        waypoints: &[GeoPoint],
        params: SimulationParams,
        cancel: &AtomicBool,
    ) -> Result<SimulationReport> {
        let params = params.normalized();
        let started_at = Utc::now().timestamp();
        let track_id = self
            .with_db(|db| db.with_txn(|txn| txn.create_track(name, started_at)))
            .context("create track")?;

        let steps = RouteSteps::new(waypoints, params, started_at);
        let planned = steps.planned_points();
        if planned > LONG_RUN_POINTS {
            warn!(
                "Long simulation: track_id={}, planned={}, speed={}kn, interval={}s",
                track_id, planned, params.speed_knots, params.interval_seconds
            );
        }

        let mut distance_m = 0.;
        let mut prev: Option<GeoPoint> = None;
        let outcome = drive_simulation(steps, cancel, |index, point| {
            self.with_db(|db| db.with_txn(|txn| txn.insert_position(track_id, point)))
                .with_context(|| {
                    if index == 0 {
                        "insert first position".to_string()
                    } else {
                        format!("insert position {}", index)
                    }
                })?;
            if let Some(prev) = prev {
                distance_m += geodesy::distance(prev, point.position);
            }
            prev = Some(point.position);
            Ok(())
        })?;

        let ended_at = outcome.last_time.unwrap_or(started_at);
        self.with_db(|db| {
            db.with_txn(|txn| {
                txn.end_track(track_id, ended_at)?;
                txn.set_track_distance(track_id, distance_m)
            })
        })
        .context("end track")?;

        if outcome.status == RunStatus::Canceled {
            warn!(
                "Simulation canceled: track_id={}, points={}",
                track_id, outcome.points
            );
        } else {
            info!(
                "Simulation done: track_id={}, points={}, ended_at={}",
                track_id, outcome.points, ended_at
            );
        }

        Ok(SimulationReport {
            track_id,
            points: outcome.points,
            ended_at,
            speed_knots: params.speed_knots,
            interval_seconds: params.interval_seconds,
            status: outcome.status,
        })
    }

    pub fn simulate_broughton_to_newcastle(
        &self,
        params: SimulationParams,
        cancel: &AtomicBool,
    ) -> Result<SimulationReport> {
        self.run_simulation(
            BROUGHTON_TO_NEWCASTLE_NAME,
            &BROUGHTON_TO_NEWCASTLE,
            params,
            cancel,
        )
    }

    pub fn list_tracks(&self, limit: i64) -> Result<Vec<TrackHeader>> {
        self.with_db(|db| db.with_txn(|txn| txn.list_tracks(limit)))
    }

    pub fn load_track(&self, track_id: TrackId) -> Result<Option<Track>> {
        self.with_db(|db| {
            db.with_txn(|txn| match txn.get_track(track_id)? {
                None => Ok(None),
                Some(header) => {
                    let points = txn.load_positions(track_id)?;
                    Ok(Some(Track { header, points }))
                }
            })
        })
    }

    pub fn track_stats(&self, track_id: TrackId) -> Result<Option<TrackStats>> {
        Ok(self
            .load_track(track_id)?
            .map(|track| track_analyzer::analyze(&track.points, &track.header.name)))
    }

    pub fn track_feature(&self, track_id: TrackId) -> Result<Option<Value>> {
        Ok(self
            .track_stats(track_id)?
            .map(|stats| geojson::track_feature(track_id, &stats)))
    }

    pub fn delete_track(&self, track_id: TrackId) -> Result<()> {
        self.with_db(|db| db.with_txn(|txn| txn.delete_track(track_id)))
    }

    pub fn flush(&self) -> Result<()> {
        debug!("[storage] flushing");
        self.with_db(|db| db.flush())
    }
}
