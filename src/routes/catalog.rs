use crate::error::TrackerError;
use crate::geo::Point;
use crate::routes::{Route, Stop};

/// In-memory route catalog plus the vehicle-to-route assignment table.
/// Built once at startup and shared read-only.
#[derive(Debug)]
pub struct RouteCatalog {
    routes: Vec<Route>,
    /// (vehicle_id, route_id), in stable fleet order.
    assignments: Vec<(String, String)>,
}

impl RouteCatalog {
    pub fn new(routes: Vec<Route>, assignments: Vec<(String, String)>) -> Self {
        Self { routes, assignments }
    }

    /// Demo catalog: the Haldwani → Anand Vihar intercity corridor and a
    /// short Delhi city loop, with `fleet_size` vehicles assigned
    /// round-robin across the routes.
    pub fn demo(fleet_size: usize) -> Self {
        let routes = demo_routes();
        let assignments = (0..fleet_size)
            .map(|i| {
                let vehicle_id = format!("BUS-{:02}", i + 1);
                let route_id = routes[i % routes.len()].id.clone();
                (vehicle_id, route_id)
            })
            .collect();
        Self { routes, assignments }
    }

    pub fn list(&self) -> &[Route] {
        &self.routes
    }

    pub fn get(&self, route_id: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.id == route_id)
    }

    pub fn require(&self, route_id: &str) -> Result<&Route, TrackerError> {
        self.get(route_id).ok_or_else(|| TrackerError::UnknownReference {
            kind: "route",
            id: route_id.to_string(),
        })
    }

    pub fn route_for_vehicle(&self, vehicle_id: &str) -> Option<&str> {
        self.assignments
            .iter()
            .find(|(v, _)| v == vehicle_id)
            .map(|(_, r)| r.as_str())
    }

    /// Fleet assignments in stable order, for simulator initialization.
    pub fn fleet(&self) -> &[(String, String)] {
        &self.assignments
    }
}

fn stop(id: &str, name: &str, lat: f64, lng: f64) -> Stop {
    Stop { id: id.to_string(), name: name.to_string(), lat, lng }
}

fn demo_routes() -> Vec<Route> {
    vec![
        Route {
            id: "R_UK_DEL".to_string(),
            name: "Haldwani → Anand Vihar".to_string(),
            stops: vec![
                stop("S1", "Haldwani Bus Stop", 29.2183, 79.5130),
                stop("S2", "Rudrapur Bus Depot", 28.9740, 79.4050),
                stop("S3", "Bilaspur Bypass", 28.8850, 79.2800),
                stop("S4", "Outside Bilaspur", 28.8800, 79.2700),
                stop("S5", "Rampur Outskirts", 28.8100, 79.0250),
                stop("S6", "Rampur Bus Stand", 28.8030, 79.0250),
                stop("S7", "Moradabad Bypass", 28.8350, 78.7700),
                stop("S8", "Teerthanker Mahaveer University", 28.8250, 78.6600),
                stop("S9", "Joya", 28.8400, 78.5000),
                stop("S10", "Gajraula", 28.8350, 78.2350),
                stop("S11", "Garh Ganga", 28.8000, 78.1000),
                stop("S12", "Gharmuktesar", 28.7800, 78.0500),
                stop("S13", "Hapur Bypass", 28.7100, 77.7800),
                stop("S14", "New Bus Stand, Pilkhuwa", 28.7050, 77.6550),
                stop("S15", "Dasna", 28.6750, 77.5250),
                stop("S16", "NH-9 Ghaziabad", 28.6600, 77.4500),
                stop("S17", "Sector 62 Crossing", 28.6300, 77.3700),
                stop("S18", "ISBT Anand Vihar", 28.6469, 77.3160),
                stop("S19", "Anand Vihar Terminal", 28.6450, 77.3150),
            ],
            polyline: vec![
                Point::new(29.2183, 79.5130),
                Point::new(28.9740, 79.4050),
                Point::new(28.8850, 79.2800),
                Point::new(28.8030, 79.0250),
                Point::new(28.8386, 78.7733),
                Point::new(28.8350, 78.2350),
                Point::new(28.7800, 78.0500),
                Point::new(28.7306, 77.7759),
                Point::new(28.7050, 77.6550),
                Point::new(28.6750, 77.5250),
                Point::new(28.6469, 77.3160),
            ],
        },
        Route {
            id: "R_DEL_CITY".to_string(),
            name: "Anand Vihar → India Gate".to_string(),
            stops: vec![
                stop("C1", "ISBT Anand Vihar", 28.6469, 77.3160),
                stop("C2", "Karkardooma", 28.6550, 77.3020),
                stop("C3", "ITO Crossing", 28.6280, 77.2410),
                stop("C4", "Connaught Place", 28.6315, 77.2167),
                stop("C5", "India Gate", 28.6129, 77.2295),
            ],
            polyline: vec![
                Point::new(28.6469, 77.3160),
                Point::new(28.6550, 77.3020),
                Point::new(28.6280, 77.2410),
                Point::new(28.6315, 77.2167),
                Point::new(28.6129, 77.2295),
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_assigns_fleet_round_robin() {
        let catalog = RouteCatalog::demo(4);
        assert_eq!(catalog.route_for_vehicle("BUS-01"), Some("R_UK_DEL"));
        assert_eq!(catalog.route_for_vehicle("BUS-02"), Some("R_DEL_CITY"));
        assert_eq!(catalog.route_for_vehicle("BUS-03"), Some("R_UK_DEL"));
        assert_eq!(catalog.route_for_vehicle("BUS-99"), None);
    }

    #[test]
    fn require_reports_unknown_route() {
        let catalog = RouteCatalog::demo(1);
        assert!(catalog.require("R_UK_DEL").is_ok());
        assert!(matches!(
            catalog.require("R_NOPE"),
            Err(TrackerError::UnknownReference { kind: "route", .. })
        ));
    }
}
