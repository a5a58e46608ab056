use crate::geodesy::GeoPoint;

pub type TrackId = i64;

#[derive(Clone, Debug, PartialEq)]
pub struct TrackPoint {
    pub time: i64,
    pub position: GeoPoint,
    // speed over ground, m/s
    pub sog_ms: Option<f64>,
    // course over ground, radians
    pub cog_rad: Option<f64>,
    pub source: Option<String>,
    pub quality: Option<i64>,
}

impl TrackPoint {
    /// A bare fix with no recorded speed, course, source or quality.
    pub fn at(time: i64, position: GeoPoint) -> Self {
        TrackPoint {
            time,
            position,
            sog_ms: None,
            cog_rad: None,
            source: None,
            quality: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrackHeader {
    pub id: TrackId,
    pub name: String,
    pub started_at: i64,
    // `None` until the track is finalized
    pub ended_at: Option<i64>,
    // total distance, when the writer recorded it
    pub distance_m: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    pub header: TrackHeader,
    pub points: Vec<TrackPoint>,
}
