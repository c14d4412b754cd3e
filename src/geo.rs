use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
pub const EARTH_RADIUS_KM: f64 = 6_371.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lng: f64,
}

impl Point {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Great-circle distance in kilometers.
pub fn haversine_km(a: Point, b: Point) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().min(1.0).asin();

    EARTH_RADIUS_KM * c
}

/// Great-circle distance in meters.
pub fn haversine_m(a: Point, b: Point) -> f64 {
    haversine_km(a, b) * 1000.0
}

/// Equirectangular projection of a point into local planar meter space.
/// Valid for city-scale spans around `ref_lat`.
pub fn to_local_meters(p: Point, ref_lat: f64) -> (f64, f64) {
    let x = p.lng.to_radians() * EARTH_RADIUS_M * ref_lat.to_radians().cos();
    let y = p.lat.to_radians() * EARTH_RADIUS_M;
    (x, y)
}

/// Initial bearing from `a` to `b`, degrees in [0, 360).
pub fn bearing_deg(a: Point, b: Point) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let y = delta_lng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lng.cos();

    let mut brng = y.atan2(x).to_degrees();
    if brng < 0.0 {
        brng += 360.0;
    }
    if !brng.is_finite() {
        return 0.0;
    }
    // atan2 can return exactly 360.0 after the shift for tiny negative angles
    brng % 360.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_zero_for_identical_points() {
        let p = Point::new(28.6300, 77.2200);
        assert_eq!(haversine_km(p, p), 0.0);
        assert_eq!(haversine_m(p, p), 0.0);
    }

    #[test]
    fn haversine_one_degree_of_latitude() {
        let a = Point::new(28.0, 77.0);
        let b = Point::new(29.0, 77.0);
        let d = haversine_km(a, b);
        // one degree of latitude is ~111.2 km
        assert!((d - 111.2).abs() < 0.5, "got {d}");
    }

    #[test]
    fn local_meters_latitude_scale() {
        let a = Point::new(28.6300, 77.2200);
        let b = Point::new(28.6310, 77.2200);
        let (_, ya) = to_local_meters(a, a.lat);
        let (_, yb) = to_local_meters(b, a.lat);
        // 0.001 deg of latitude is ~111.2 m
        assert!(((yb - ya).abs() - 111.2).abs() < 1.0);
    }

    #[test]
    fn bearing_cardinal_directions() {
        let origin = Point::new(28.0, 77.0);
        let north = bearing_deg(origin, Point::new(29.0, 77.0));
        let east = bearing_deg(origin, Point::new(28.0, 78.0));
        assert!(north < 1.0 || north > 359.0, "north was {north}");
        assert!((east - 90.0).abs() < 1.0, "east was {east}");
    }

    #[test]
    fn bearing_in_range_for_degenerate_pair() {
        let p = Point::new(28.0, 77.0);
        let b = bearing_deg(p, p);
        assert!((0.0..360.0).contains(&b));
    }
}
