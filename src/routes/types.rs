use crate::geo::{self, Point};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Stop {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
}

impl Stop {
    pub fn point(&self) -> Point {
        Point::new(self.lat, self.lng)
    }
}

/// A fixed route: ordered stops plus the polyline approximating its path.
/// Immutable after load; shared read-only across all vehicles on it.
#[derive(Debug, Clone, Serialize)]
pub struct Route {
    pub id: String,
    pub name: String,
    pub stops: Vec<Stop>,
    pub polyline: Vec<Point>,
}

impl Route {
    pub fn stop(&self, stop_id: &str) -> Option<&Stop> {
        self.stops.iter().find(|s| s.id == stop_id)
    }

    pub fn stop_index(&self, stop_id: &str) -> Option<usize> {
        self.stops.iter().position(|s| s.id == stop_id)
    }

    /// Nearest stop to a point, by great-circle distance.
    pub fn nearest_stop(&self, lat: f64, lng: f64) -> Option<&Stop> {
        let here = Point::new(lat, lng);
        self.stops.iter().min_by(|a, b| {
            let da = geo::haversine_km(here, a.point());
            let db = geo::haversine_km(here, b.point());
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route() -> Route {
        Route {
            id: "R1".into(),
            name: "Test".into(),
            stops: vec![
                Stop { id: "S1".into(), name: "A".into(), lat: 28.60, lng: 77.20 },
                Stop { id: "S2".into(), name: "B".into(), lat: 28.70, lng: 77.20 },
            ],
            polyline: vec![Point::new(28.60, 77.20), Point::new(28.70, 77.20)],
        }
    }

    #[test]
    fn nearest_stop_picks_closest() {
        let r = route();
        let s = r.nearest_stop(28.61, 77.20).unwrap();
        assert_eq!(s.id, "S1");
        let s = r.nearest_stop(28.69, 77.20).unwrap();
        assert_eq!(s.id, "S2");
    }

    #[test]
    fn stop_lookup_by_id() {
        let r = route();
        assert!(r.stop("S2").is_some());
        assert!(r.stop("S9").is_none());
        assert_eq!(r.stop_index("S2"), Some(1));
    }
}
