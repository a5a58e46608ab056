use serde_json::{json, Value};

use crate::geodesy::NM_TO_METERS;
use crate::track::TrackId;
use crate::track_analyzer::TrackStats;

const MS_TO_KNOTS: f64 = 1.943844492;

/// Values reported alongside a track, derived from its stats.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackMetrics {
    pub distance_nm: f64,
    pub duration_s: i64,
    pub avg_knots: f64,
}

impl TrackMetrics {
    pub fn of(stats: &TrackStats) -> Self {
        let duration_s = (stats.ended_at - stats.started_at).max(0);
        let avg_knots = if duration_s > 0 {
            stats.distance_m / duration_s as f64 * MS_TO_KNOTS
        } else {
            0.
        };
        TrackMetrics {
            distance_nm: stats.distance_m / NM_TO_METERS,
            duration_s,
            avg_knots,
        }
    }
}

// 3D only when the speed is known, so no nulls end up in the output.
fn coordinates(stats: &TrackStats) -> Vec<Vec<f64>> {
    stats
        .coordinates
        .iter()
        .zip(stats.speeds.iter())
        .map(|(point, speed)| match speed {
            Some(sog_ms) => vec![point.longitude, point.latitude, *sog_ms],
            None => vec![point.longitude, point.latitude],
        })
        .collect()
}

/// A GeoJSON `Feature` with a `LineString` geometry. The third coordinate,
/// when present, is speed over ground in m/s.
pub fn track_feature(id: TrackId, stats: &TrackStats) -> Value {
    let metrics = TrackMetrics::of(stats);
    json!({
        "type": "Feature",
        "properties": {
            "id": id,
            "name": stats.name,
            "started_at": stats.started_at,
            "ended_at": stats.ended_at,
            "distance_m": stats.distance_m,
            "distance_nm": metrics.distance_nm,
            "duration_s": metrics.duration_s,
            "avg_knots": metrics.avg_knots,
        },
        "geometry": {
            "type": "LineString",
            "coordinates": coordinates(stats),
        },
        "bbox": stats.bbox.to_array(),
    })
}
