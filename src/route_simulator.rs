use crate::geodesy::{self, GeoPoint, NM_TO_METERS};
use crate::track::TrackPoint;

pub const DEFAULT_SPEED_KNOTS: f64 = 6.;
pub const DEFAULT_INTERVAL_SECONDS: i64 = 10;
pub const SIM_SOURCE: &str = "sim";
pub const SIM_QUALITY: i64 = 1;

// (lat, lon)
pub const BROUGHTON_TO_NEWCASTLE: [GeoPoint; 5] = [
    // 5 nmi east of Broughton Island
    GeoPoint {
        latitude: -32.60,
        longitude: 152.40,
    },
    // abeam Broughton Island
    GeoPoint {
        latitude: -32.60,
        longitude: 152.30,
    },
    // Port Stephens entrance
    GeoPoint {
        latitude: -32.71,
        longitude: 152.17,
    },
    // Stockton Bight
    GeoPoint {
        latitude: -32.79,
        longitude: 152.08,
    },
    // Newcastle Harbour entrance
    GeoPoint {
        latitude: -32.92,
        longitude: 151.79,
    },
];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationParams {
    pub speed_knots: f64,
    pub interval_seconds: i64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        SimulationParams {
            speed_knots: DEFAULT_SPEED_KNOTS,
            interval_seconds: DEFAULT_INTERVAL_SECONDS,
        }
    }
}

impl SimulationParams {
    pub fn new(speed_knots: f64, interval_seconds: i64) -> Self {
        SimulationParams {
            speed_knots,
            interval_seconds,
        }
    }

    /// Bad values are replaced by the defaults instead of being rejected, so
    /// a simulation always makes forward progress.
    pub fn normalized(self) -> Self {
        // `!(x > 0)` also catches NaN
        let speed_knots = if !(self.speed_knots > 0.) {
            DEFAULT_SPEED_KNOTS
        } else {
            self.speed_knots
        };
        let interval_seconds = if self.interval_seconds < 1 {
            DEFAULT_INTERVAL_SECONDS
        } else {
            self.interval_seconds
        };
        SimulationParams {
            speed_knots,
            interval_seconds,
        }
    }

    pub fn speed_ms(&self) -> f64 {
        self.speed_knots * NM_TO_METERS / 3600.
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Leg {
    target: GeoPoint,
    bearing: f64,
    steps: u64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Cursor {
    position: GeoPoint,
    time: i64,
    leg_index: usize,
    leg: Leg,
    // steps already taken on `leg`
    step: u64,
}

/// Lazily walks the route, one `TrackPoint` per interval. The first item is
/// the first waypoint itself.
pub struct RouteSteps<'a> {
    waypoints: &'a [GeoPoint],
    speed_ms: f64,
    step_m: f64,
    interval_seconds: i64,
    start_time: i64,
    cursor: Option<Cursor>,
    started: bool,
}

impl<'a> RouteSteps<'a> {
    pub fn new(waypoints: &'a [GeoPoint], params: SimulationParams, start_time: i64) -> Self {
        let params = params.normalized();
        let speed_ms = params.speed_ms();
        RouteSteps {
            waypoints,
            speed_ms,
            step_m: speed_ms * params.interval_seconds as f64,
            interval_seconds: params.interval_seconds,
            start_time,
            cursor: None,
            started: false,
        }
    }

    fn plan_leg(&self, leg_index: usize) -> Option<Leg> {
        let from = *self.waypoints.get(leg_index)?;
        let target = *self.waypoints.get(leg_index + 1)?;
        let leg_distance = geodesy::distance(from, target);
        // a NaN distance casts to 0 and still gets its one step
        let steps = ((leg_distance / self.step_m).ceil() as u64).max(1);
        Some(Leg {
            target,
            bearing: geodesy::initial_bearing(from, target),
            steps,
        })
    }

    /// Points a full walk yields, saturating at `u64::MAX`. Clock overflow
    /// can end the walk before that.
    pub fn planned_points(&self) -> u64 {
        if self.waypoints.is_empty() {
            return 0;
        }
        (0..self.waypoints.len() - 1)
            .filter_map(|leg_index| self.plan_leg(leg_index))
            .fold(1, |total: u64, leg| total.saturating_add(leg.steps))
    }

    fn sim_point(&self, time: i64, position: GeoPoint, cog_rad: f64) -> TrackPoint {
        TrackPoint {
            time,
            position,
            sog_ms: Some(self.speed_ms),
            cog_rad: Some(cog_rad),
            source: Some(SIM_SOURCE.to_string()),
            quality: Some(SIM_QUALITY),
        }
    }

    // Pure transition: the next cursor, or `None` when the last leg is done.
    fn advance(&self, cursor: Cursor) -> Option<Cursor> {
        let (leg_index, leg, step) = if cursor.step == cursor.leg.steps {
            let leg_index = cursor.leg_index + 1;
            (leg_index, self.plan_leg(leg_index)?, 0)
        } else {
            (cursor.leg_index, cursor.leg, cursor.step)
        };
        // the walk ends early if the clock would overflow
        let time = cursor.time.checked_add(self.interval_seconds)?;
        let step = step + 1;
        let position = if step == leg.steps {
            leg.target
        } else {
            geodesy::destination(cursor.position, leg.bearing, self.step_m)
        };
        Some(Cursor {
            position,
            time,
            leg_index,
            leg,
            step,
        })
    }
}

impl Iterator for RouteSteps<'_> {
    type Item = TrackPoint;

    fn next(&mut self) -> Option<TrackPoint> {
        if !self.started {
            self.started = true;
            let first = *self.waypoints.first()?;
            // a single waypoint leaves no leg to walk
            self.cursor = self.plan_leg(0).map(|leg| Cursor {
                position: first,
                time: self.start_time,
                leg_index: 0,
                leg,
                step: 0,
            });
            return Some(self.sim_point(self.start_time, first, 0.));
        }
        let cursor = self.advance(self.cursor?)?;
        self.cursor = Some(cursor);
        Some(self.sim_point(cursor.time, cursor.position, cursor.leg.bearing))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Simulation {
    pub points: Vec<TrackPoint>,
    pub end_time: i64,
}

/// Constant-speed travel along `waypoints`, deterministic for fixed input.
pub fn simulate(waypoints: &[GeoPoint], params: SimulationParams, start_time: i64) -> Simulation {
    let points: Vec<TrackPoint> = RouteSteps::new(waypoints, params, start_time).collect();
    let end_time = points.last().map(|p| p.time).unwrap_or(start_time);
    Simulation { points, end_time }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization() {
        let p = SimulationParams::new(0., 0).normalized();
        assert_eq!(p, SimulationParams::default());
        let p = SimulationParams::new(f64::NAN, -5).normalized();
        assert_eq!(p, SimulationParams::default());
        let p = SimulationParams::new(12.5, 3).normalized();
        assert_eq!(p, SimulationParams::new(12.5, 3));
    }

    #[test]
    fn short_leg_is_one_step() {
        let a = GeoPoint::new(-33., 151.);
        let b = GeoPoint::new(-33., 151.00001);
        let sim = simulate(&[a, b], SimulationParams::default(), 100);
        assert_eq!(sim.points.len(), 2);
        assert_eq!(sim.points[1].position, b);
        assert_eq!(sim.end_time, 110);
    }
}
