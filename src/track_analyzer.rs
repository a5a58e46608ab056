use crate::geodesy::{self, GeoPoint};
use crate::track::TrackPoint;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    fn of_point(point: GeoPoint) -> Self {
        BoundingBox {
            min_lon: point.longitude,
            min_lat: point.latitude,
            max_lon: point.longitude,
            max_lat: point.latitude,
        }
    }

    fn expand(&mut self, point: GeoPoint) {
        self.min_lon = self.min_lon.min(point.longitude);
        self.min_lat = self.min_lat.min(point.latitude);
        self.max_lon = self.max_lon.max(point.longitude);
        self.max_lat = self.max_lat.max(point.latitude);
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        (self.min_lon..=self.max_lon).contains(&point.longitude)
            && (self.min_lat..=self.max_lat).contains(&point.latitude)
    }

    /// `[minLon, minLat, maxLon, maxLat]`, GeoJSON order.
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_lon, self.min_lat, self.max_lon, self.max_lat]
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackStats {
    pub name: String,
    pub started_at: i64,
    pub ended_at: i64,
    pub distance_m: f64,
    pub bbox: BoundingBox,
    pub coordinates: Vec<GeoPoint>,
    // one per coordinate, `None` when unknown
    pub speeds: Vec<Option<f64>>,
}

/// Folds an ordered point sequence into `TrackStats`. An empty sequence gives
/// zero distance and a `{0, 0, 0, 0}` bounding box.
pub fn analyze(points: &[TrackPoint], name: &str) -> TrackStats {
    let mut stats = TrackStats {
        name: name.to_string(),
        coordinates: Vec::with_capacity(points.len()),
        speeds: Vec::with_capacity(points.len()),
        ..TrackStats::default()
    };

    let mut prev: Option<&TrackPoint> = None;
    for point in points {
        let speed = match prev {
            None => {
                stats.started_at = point.time;
                stats.bbox = BoundingBox::of_point(point.position);
                point.sog_ms
            }
            Some(prev) => {
                let segment_m = geodesy::distance(prev.position, point.position);
                stats.distance_m += segment_m;
                stats.bbox.expand(point.position);
                point.sog_ms.or_else(|| {
                    // an overflowing delta counts as unknown
                    match point.time.checked_sub(prev.time) {
                        Some(dt) if dt > 0 => Some(segment_m / dt as f64),
                        _ => None,
                    }
                })
            }
        };
        stats.ended_at = point.time;
        stats.coordinates.push(point.position);
        stats.speeds.push(speed);
        prev = Some(point);
    }
    stats
}
