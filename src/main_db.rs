use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Transaction};
use std::cmp::Ordering;
use std::path::Path;
use std::time::Duration;

use crate::geodesy::GeoPoint;
use crate::track::{TrackHeader, TrackId, TrackPoint};
use crate::track_analyzer::BoundingBox;
use crate::utils;

/* The main database.

`tracks` has one row per recorded or simulated voyage. `ended_at` stays NULL
until the track is finalized, `distance_m` stays NULL unless the writer knows
the total.

`positions` holds every fix of every track. Readers always get them ordered by
`t`, the analyzer depends on that. Each position also gets a degenerate box in
`positions_rtree` (an SQLite R*Tree keyed by position id) for spatial lookup.
*/

pub const DEFAULT_LIST_LIMIT: i64 = 50;
pub const MAX_LIST_LIMIT: i64 = 200;

#[allow(clippy::type_complexity)]
fn open_db_and_run_migration(
    db_path: &Path,
    migrations: &[&dyn Fn(&Transaction) -> Result<()>],
) -> Result<Connection> {
    debug!("open and run migration for {:?}", db_path);
    let mut conn = Connection::open(db_path)?;
    conn.busy_timeout(Duration::from_millis(5000))?;
    let journal_mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    debug!("journal_mode = {}", journal_mode);
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    let tx = conn.transaction()?;
    let version = utils::db::init_metadata_and_get_version(&tx)? as usize;
    let target_version = migrations.len();
    debug!(
        "current version = {}, target_version = {}",
        version, target_version
    );
    match version.cmp(&target_version) {
        Ordering::Equal => (),
        Ordering::Less => {
            for (i, f) in migrations.iter().enumerate().skip(version) {
                info!("running migration for version: {}", i + 1);
                f(&tx)?;
            }
            utils::db::set_version_in_metadata(&tx, target_version as i32)?;
        }
        Ordering::Greater => {
            bail!(
                "version too high: current version = {}, target_version = {}",
                version,
                target_version
            );
        }
    }
    tx.commit()?;
    Ok(conn)
}

fn clamp_list_limit(limit: i64) -> i64 {
    if limit <= 0 || limit > MAX_LIST_LIMIT {
        DEFAULT_LIST_LIMIT
    } else {
        limit
    }
}

pub struct Txn<'a> {
    db_txn: rusqlite::Transaction<'a>,
}

impl Txn<'_> {
    pub fn create_track(&mut self, name: &str, started_at: i64) -> Result<TrackId> {
        self.db_txn.execute(
            "INSERT INTO tracks (name, started_at) VALUES (?1, ?2);",
            (name, started_at),
        )?;
        let id = self.db_txn.last_insert_rowid();
        info!("Track created: id={}, name={}", id, name);
        Ok(id)
    }

    pub fn insert_position(&mut self, track_id: TrackId, point: &TrackPoint) -> Result<i64> {
        let sql = "INSERT INTO positions (track_id, t, lon, lat, sog_ms, cog_rad, src, qual) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);";
        self.db_txn.prepare_cached(sql)?.execute((
            track_id,
            point.time,
            point.position.longitude,
            point.position.latitude,
            point.sog_ms,
            point.cog_rad,
            point.source.as_deref(),
            point.quality,
        ))?;
        let position_id = self.db_txn.last_insert_rowid();

        let lon = point.position.longitude;
        let lat = point.position.latitude;
        self.db_txn
            .prepare_cached(
                "INSERT OR REPLACE INTO positions_rtree (id, minx, maxx, miny, maxy) VALUES (?1, ?2, ?3, ?4, ?5);",
            )?
            .execute((position_id, lon, lon, lat, lat))?;
        Ok(position_id)
    }

    pub fn end_track(&mut self, track_id: TrackId, ended_at: i64) -> Result<()> {
        let changes = self.db_txn.execute(
            "UPDATE tracks SET ended_at = ?1 WHERE id = ?2;",
            (ended_at, track_id),
        )?;
        if changes == 1 {
            info!("Track finalized: id={}, ended_at={}", track_id, ended_at);
            Ok(())
        } else {
            Err(anyhow!("Failed to find track with id = {}", track_id))
        }
    }

    pub fn set_track_distance(&mut self, track_id: TrackId, distance_m: f64) -> Result<()> {
        let changes = self.db_txn.execute(
            "UPDATE tracks SET distance_m = ?1 WHERE id = ?2;",
            (distance_m, track_id),
        )?;
        if changes == 1 {
            Ok(())
        } else {
            Err(anyhow!("Failed to find track with id = {}", track_id))
        }
    }

    pub fn delete_track(&mut self, track_id: TrackId) -> Result<()> {
        info!("Deleting track: id={}", track_id);
        // the rtree is a virtual table, it does not take part in the cascade
        self.db_txn.execute(
            "DELETE FROM positions_rtree WHERE id IN (SELECT id FROM positions WHERE track_id = ?1);",
            (track_id,),
        )?;
        let changes = self
            .db_txn
            .execute("DELETE FROM tracks WHERE id = ?1;", (track_id,))?;
        if changes == 1 {
            Ok(())
        } else {
            Err(anyhow!("Failed to find track with id = {}", track_id))
        }
    }

    /// Most recent first. `limit` outside `1..=200` falls back to 50.
    pub fn list_tracks(&self, limit: i64) -> Result<Vec<TrackHeader>> {
        let mut query = self.db_txn.prepare(
            "SELECT id, name, started_at, ended_at, distance_m FROM tracks ORDER BY started_at DESC, id DESC LIMIT ?1;",
        )?;
        let rows = query.query_map((clamp_list_limit(limit),), |row| {
            Ok(TrackHeader {
                id: row.get(0)?,
                name: row.get(1)?,
                started_at: row.get(2)?,
                ended_at: row.get(3)?,
                distance_m: row.get(4)?,
            })
        })?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    pub fn get_track(&self, track_id: TrackId) -> Result<Option<TrackHeader>> {
        let mut query = self
            .db_txn
            .prepare("SELECT id, name, started_at, ended_at, distance_m FROM tracks WHERE id = ?1;")?;
        Ok(query
            .query_row((track_id,), |row| {
                Ok(TrackHeader {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    started_at: row.get(2)?,
                    ended_at: row.get(3)?,
                    distance_m: row.get(4)?,
                })
            })
            .optional()?)
    }

    // `id` breaks ties between fixes sharing a timestamp, so insertion order
    // is kept for them.
    pub fn load_positions(&self, track_id: TrackId) -> Result<Vec<TrackPoint>> {
        let mut query = self.db_txn.prepare(
            "SELECT t, lon, lat, sog_ms, cog_rad, src, qual FROM positions WHERE track_id = ?1 ORDER BY t ASC, id ASC;",
        )?;
        let rows = query.query_map((track_id,), |row| {
            Ok(TrackPoint {
                time: row.get(0)?,
                position: GeoPoint {
                    longitude: row.get(1)?,
                    latitude: row.get(2)?,
                },
                sog_ms: row.get(3)?,
                cog_rad: row.get(4)?,
                source: row.get(5)?,
                quality: row.get(6)?,
            })
        })?;
        let mut points = Vec::new();
        for row in rows {
            points.push(row?);
        }
        Ok(points)
    }

    pub fn track_bbox(&self, track_id: TrackId) -> Result<Option<BoundingBox>> {
        let mut query = self.db_txn.prepare(
            "SELECT MIN(lon), MIN(lat), MAX(lon), MAX(lat) FROM positions WHERE track_id = ?1;",
        )?;
        // aggregates over zero rows are all NULL
        let bounds: (Option<f64>, Option<f64>, Option<f64>, Option<f64>) =
            query.query_row((track_id,), |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?;
        Ok(match bounds {
            (Some(min_lon), Some(min_lat), Some(max_lon), Some(max_lat)) => Some(BoundingBox {
                min_lon,
                min_lat,
                max_lon,
                max_lat,
            }),
            _ => None,
        })
    }

    /// Ids of all positions (of any track) inside `bbox`, edges included.
    pub fn positions_in_bbox(&self, bbox: &BoundingBox) -> Result<Vec<i64>> {
        let mut query = self.db_txn.prepare(
            "SELECT id FROM positions_rtree WHERE minx >= ?1 AND maxx <= ?2 AND miny >= ?3 AND maxy <= ?4 ORDER BY id;",
        )?;
        let rows = query.query_map(
            (bbox.min_lon, bbox.max_lon, bbox.min_lat, bbox.max_lat),
            |row| row.get(0),
        )?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }
}

pub struct MainDb {
    conn: Connection,
}

impl MainDb {
    pub fn open(db_path: &Path) -> Result<MainDb> {
        let conn = open_db_and_run_migration(
            db_path,
            &[
                &|tx| {
                    let sql = "
                    CREATE TABLE tracks (
                        id         INTEGER PRIMARY KEY AUTOINCREMENT
                                           NOT NULL,
                        name       TEXT    NOT NULL,
                        started_at INTEGER NOT NULL,
                        ended_at   INTEGER
                    );
                    CREATE TABLE positions (
                        id         INTEGER PRIMARY KEY AUTOINCREMENT
                                           NOT NULL,
                        track_id   INTEGER NOT NULL
                                           REFERENCES tracks (id) ON DELETE CASCADE,
                        t          INTEGER NOT NULL,
                        lon        REAL    NOT NULL,
                        lat        REAL    NOT NULL,
                        sog_ms     REAL,
                        cog_rad    REAL,
                        src        TEXT,
                        qual       INTEGER
                    );
                    CREATE INDEX positions_track_time_index ON positions (
                        track_id,
                        t
                    );
                    CREATE INDEX tracks_started_at_index ON tracks (
                        started_at DESC
                    );
                    CREATE VIRTUAL TABLE positions_rtree USING rtree (
                        id,
                        minx, maxx,
                        miny, maxy
                    );
                    ";
                    for s in sql_split::split(sql) {
                        tx.execute(&s, ())?;
                    }
                    Ok(())
                },
                &|tx| {
                    // filled in when a simulated track is finalized
                    tx.execute("ALTER TABLE tracks ADD COLUMN distance_m REAL;", ())?;
                    Ok(())
                },
            ],
        )?;
        Ok(MainDb { conn })
    }

    pub fn with_txn<F, O>(&mut self, f: F) -> Result<O>
    where
        F: FnOnce(&mut Txn) -> Result<O>,
    {
        let mut txn = Txn {
            db_txn: self.conn.transaction()?,
        };
        let output = f(&mut txn)?;
        txn.db_txn.commit()?;
        Ok(output)
    }

    pub fn flush(&self) -> Result<()> {
        self.conn.cache_flush()?;
        Ok(())
    }
}
