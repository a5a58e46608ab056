use std::f64::consts::PI;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
pub const NM_TO_METERS: f64 = 1852.0;

// Spherical earth, no ellipsoid correction. Out-of-range input is not
// rejected, the math just produces garbage (or NaN).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        GeoPoint {
            latitude,
            longitude,
        }
    }
}

/// The point reached by travelling `distance_m` along the great circle that
/// leaves `start` with initial bearing `bearing_rad`.
pub fn destination(start: GeoPoint, bearing_rad: f64, distance_m: f64) -> GeoPoint {
    let lat1 = start.latitude.to_radians();
    let lng1 = start.longitude.to_radians();
    let angular = distance_m / EARTH_RADIUS_M;

    let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing_rad.cos()).asin();
    let lng2 = lng1
        + (bearing_rad.sin() * angular.sin() * lat1.cos())
            .atan2(angular.cos() - lat1.sin() * lat2.sin());

    GeoPoint::new(lat2.to_degrees(), lng2.to_degrees())
}

/// Forward azimuth from `a` to `b`, in radians within `[0, 2π)`.
pub fn initial_bearing(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lng = (b.longitude - a.longitude).to_radians();

    let y = delta_lng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lng.cos();
    let bearing = y.atan2(x);
    if bearing < 0. {
        let wrapped = bearing + 2. * PI;
        // a tiny negative bearing rounds up to exactly 2π
        if wrapped >= 2. * PI {
            0.
        } else {
            wrapped
        }
    } else {
        bearing
    }
}

/// Great-circle distance in meters (haversine).
pub fn distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let half_lat = ((b.latitude - a.latitude).to_radians() / 2.).sin();
    let half_lng = ((b.longitude - a.longitude).to_radians() / 2.).sin();

    let h = half_lat * half_lat + lat1.cos() * lat2.cos() * half_lng * half_lng;
    2. * EARTH_RADIUS_M * h.clamp(0., 1.).sqrt().asin()
}
