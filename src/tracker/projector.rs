use crate::geo::{self, Point};
use serde::Serialize;

/// Treat anything closer than this as already arrived.
const ARRIVED_KM: f64 = 0.03;
const ARRIVED_ETA_MIN: f64 = 0.5;

const SPEED_MIN_KMH: f64 = 5.0;
const SPEED_MAX_KMH: f64 = 60.0;

/// The closest point on a polyline to a query point, with the cumulative
/// distance travelled along the polyline up to that point.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Projection {
    pub lat: f64,
    pub lng: f64,
    pub distance_from_start_km: f64,
}

/// Total polyline length in kilometers.
pub fn polyline_length_km(polyline: &[Point]) -> f64 {
    polyline
        .windows(2)
        .map(|w| geo::haversine_km(w[0], w[1]))
        .sum()
}

/// Project a point onto the nearest location along the polyline.
///
/// Every consecutive segment is considered; the projection is the orthogonal
/// foot clamped to the segment (point-to-segment, not point-to-line), and the
/// globally closest candidate wins. Ties go to the first-encountered segment
/// in traversal order, so the result is deterministic.
pub fn project(polyline: &[Point], point: Point) -> Projection {
    let Some(first) = polyline.first() else {
        return Projection {
            lat: point.lat,
            lng: point.lng,
            distance_from_start_km: 0.0,
        };
    };

    let mut best = Projection {
        lat: first.lat,
        lng: first.lng,
        distance_from_start_km: 0.0,
    };
    let mut best_dist = geo::haversine_km(point, *first);
    let mut travelled = 0.0;

    for w in polyline.windows(2) {
        let (a, b) = (w[0], w[1]);

        // parameterize in lat/lng space; fine at city scale
        let ab_lat = b.lat - a.lat;
        let ab_lng = b.lng - a.lng;
        let ab_len_sq = ab_lat * ab_lat + ab_lng * ab_lng;
        let t = if ab_len_sq == 0.0 {
            0.0
        } else {
            (((point.lat - a.lat) * ab_lat + (point.lng - a.lng) * ab_lng) / ab_len_sq)
                .clamp(0.0, 1.0)
        };

        let proj = Point::new(a.lat + ab_lat * t, a.lng + ab_lng * t);
        let d = geo::haversine_km(point, proj);

        if d < best_dist {
            best_dist = d;
            best = Projection {
                lat: proj.lat,
                lng: proj.lng,
                distance_from_start_km: travelled + geo::haversine_km(a, proj),
            };
        }

        travelled += geo::haversine_km(a, b);
    }

    best
}

/// Position at fraction `t` (0..=1) of the polyline's total length.
pub fn interpolate(polyline: &[Point], t: f64) -> Point {
    let Some(first) = polyline.first() else {
        return Point::default();
    };
    if polyline.len() == 1 {
        return *first;
    }

    let total = polyline_length_km(polyline);
    let mut target = t.clamp(0.0, 1.0) * total;

    for w in polyline.windows(2) {
        let (a, b) = (w[0], w[1]);
        let seg = geo::haversine_km(a, b);
        if target <= seg {
            let f = if seg == 0.0 { 0.0 } else { target / seg };
            return Point::new(a.lat + (b.lat - a.lat) * f, a.lng + (b.lng - a.lng) * f);
        }
        target -= seg;
    }

    *polyline.last().unwrap_or(first)
}

/// Route-relative ETA in minutes from one point to another, at the given
/// speed. Projects both points onto the polyline; movement against route
/// direction counts as zero remaining distance. Never negative, NaN or
/// infinite.
pub fn eta_minutes(polyline: &[Point], from: Point, to: Point, speed_kmh: f64) -> f64 {
    let from_proj = project(polyline, from);
    let to_proj = project(polyline, to);

    let remaining_km = (to_proj.distance_from_start_km - from_proj.distance_from_start_km).max(0.0);

    // "already arrived" still shows a small ETA rather than zero
    if remaining_km < ARRIVED_KM {
        return ARRIVED_ETA_MIN;
    }

    let speed = if speed_kmh.is_finite() {
        speed_kmh.clamp(SPEED_MIN_KMH, SPEED_MAX_KMH)
    } else {
        SPEED_MIN_KMH
    };

    let minutes = remaining_km / speed * 60.0;
    if !minutes.is_finite() || minutes < 0.0 {
        return 0.0;
    }
    (minutes * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corridor() -> Vec<Point> {
        vec![
            Point::new(28.6000, 77.2000),
            Point::new(28.6500, 77.2500),
            Point::new(28.7000, 77.2500),
            Point::new(28.7000, 77.3000),
        ]
    }

    #[test]
    fn vertex_projects_onto_itself() {
        let line = corridor();
        let expected = geo::haversine_km(line[0], line[1]);
        let p = project(&line, line[1]);
        assert!((p.lat - line[1].lat).abs() < 1e-12);
        assert!((p.lng - line[1].lng).abs() < 1e-12);
        assert!((p.distance_from_start_km - expected).abs() < 1e-9);
    }

    #[test]
    fn start_vertex_has_zero_cumulative_distance() {
        let line = corridor();
        let p = project(&line, line[0]);
        assert_eq!(p.distance_from_start_km, 0.0);
    }

    #[test]
    fn cumulative_distance_is_monotone_along_the_line() {
        let line = corridor();
        let mut last = -1.0;
        for i in 0..=10 {
            let pos = interpolate(&line, i as f64 / 10.0);
            let proj = project(&line, pos);
            assert!(
                proj.distance_from_start_km >= last,
                "distance regressed at t={i}"
            );
            last = proj.distance_from_start_km;
        }
    }

    #[test]
    fn degenerate_polylines_do_not_produce_nan() {
        let single = vec![Point::new(28.6, 77.2)];
        let p = project(&single, Point::new(28.7, 77.3));
        assert!(p.distance_from_start_km.is_finite());

        // zero-length segment in the middle
        let line = vec![
            Point::new(28.6, 77.2),
            Point::new(28.6, 77.2),
            Point::new(28.7, 77.2),
        ];
        let p = project(&line, Point::new(28.65, 77.2));
        assert!(p.distance_from_start_km.is_finite());
        assert!(p.lat.is_finite() && p.lng.is_finite());
    }

    #[test]
    fn eta_matches_remaining_distance_over_speed() {
        // straight east-west line so interpolation distances are exact
        let line = vec![Point::new(28.63, 77.0), Point::new(28.63, 78.0)];
        let total = polyline_length_km(&line);
        let vehicle = interpolate(&line, 1.0 / total);
        let pickup = interpolate(&line, 2.0 / total);

        let eta = eta_minutes(&line, vehicle, pickup, 30.0);
        // 1.0 km at 30 km/h is 2.0 minutes
        assert!((eta - 2.0).abs() <= 0.1, "eta was {eta}");
    }

    #[test]
    fn eta_monotone_in_distance_and_speed() {
        let line = vec![Point::new(28.63, 77.0), Point::new(28.63, 78.0)];
        let total = polyline_length_km(&line);
        let from = interpolate(&line, 0.0);

        let mut last = 0.0;
        for km in [1.0, 2.0, 5.0, 10.0, 20.0] {
            let to = interpolate(&line, km / total);
            let eta = eta_minutes(&line, from, to, 30.0);
            assert!(eta >= last, "eta not monotone at {km} km");
            last = eta;
        }

        let to = interpolate(&line, 10.0 / total);
        let mut last = f64::INFINITY;
        for speed in [5.0, 15.0, 30.0, 45.0, 60.0] {
            let eta = eta_minutes(&line, from, to, speed);
            assert!(eta <= last, "eta not monotone in speed at {speed}");
            assert!(eta >= 0.0);
            last = eta;
        }
    }

    #[test]
    fn arrived_and_passed_cases() {
        let line = vec![Point::new(28.63, 77.0), Point::new(28.63, 78.0)];
        let at = interpolate(&line, 0.5);
        // on top of the target: fixed small ETA, not zero
        assert_eq!(eta_minutes(&line, at, at, 30.0), 0.5);

        // behind the target along the route: remaining clamps to zero
        let ahead = interpolate(&line, 0.7);
        let behind = interpolate(&line, 0.3);
        assert_eq!(eta_minutes(&line, ahead, behind, 30.0), 0.5);
    }

    #[test]
    fn eta_survives_degenerate_speed() {
        let line = vec![Point::new(28.63, 77.0), Point::new(28.63, 78.0)];
        let total = polyline_length_km(&line);
        let from = interpolate(&line, 0.0);
        let to = interpolate(&line, 10.0 / total);

        for bad in [0.0, -10.0, f64::NAN, f64::INFINITY] {
            let eta = eta_minutes(&line, from, to, bad);
            assert!(eta.is_finite() && eta >= 0.0, "speed {bad} gave {eta}");
        }
    }
}
