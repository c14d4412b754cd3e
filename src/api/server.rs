use crate::error::TrackerError;
use crate::geo::Point;
use crate::routes::Route;
use crate::state::AppState;
use crate::tracker::ingest::{self, CrowdPing, IngestOutcome};
use crate::tracker::projector;
use crate::tracker::ranking::{self, Candidate};
use crate::tracker::registry::{unix_ms, VehicleLiveState, VehicleStatus};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

/// A vehicle past the pickup by more than this along the route no longer
/// counts as a candidate for boarding there.
const PASSED_BUFFER_KM: f64 = 0.1;
/// "Arriving" override when within this distance of the pickup.
const ARRIVING_KM: f64 = 0.1;
/// ETA math never divides by less than this.
const MIN_ETA_SPEED_KMH: f64 = 10.0;

pub async fn run_server(state: Arc<AppState>, port: u16) {
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/routes", get(list_routes))
        .route("/discover", get(discover))
        .route("/presence/check", get(presence_check))
        .route("/crowd/update", post(crowd_update))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", port);
    info!("starting HTTP server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "ok": true, "timestamp": unix_ms() }))
}

async fn list_routes(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let routes: Vec<_> = state
        .catalog
        .list()
        .iter()
        .map(|r| {
            json!({
                "id": r.id,
                "name": r.name,
                "stops": r.stops,
            })
        })
        .collect();
    Json(routes)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiscoverQuery {
    route_id: String,
    pickup_id: String,
    drop_id: String,
}

/// Rank the route's live vehicles for a rider's pickup/drop pair. Unknown
/// routes or stops yield an empty list rather than an error; riders poll
/// this endpoint and a transient empty answer is the friendlier failure.
async fn discover(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DiscoverQuery>,
) -> impl IntoResponse {
    let Some(route) = state.catalog.get(&query.route_id) else {
        return Json(Vec::new());
    };
    let (Some(pickup), Some(drop)) = (route.stop(&query.pickup_id), route.stop(&query.drop_id))
    else {
        return Json(Vec::new());
    };

    let pickup_point = pickup.point();
    let drop_point = drop.point();
    let snapshots = state.registry.snapshot_route(&query.route_id).await;

    let candidates: Vec<Candidate> = snapshots
        .iter()
        .filter_map(|live| build_candidate(route, live, pickup_point, drop_point))
        .collect();

    Json(ranking::rank(candidates, unix_ms()))
}

/// Project one vehicle's live record onto the rider's journey. Vehicles
/// with no position yet are skipped.
fn build_candidate(
    route: &Route,
    live: &VehicleLiveState,
    pickup: Point,
    drop: Point,
) -> Option<Candidate> {
    let position = live.position?;

    let bus_proj = projector::project(&route.polyline, position);
    let pickup_proj = projector::project(&route.polyline, pickup);

    let bus_km = bus_proj.distance_from_start_km;
    let pickup_km = pickup_proj.distance_from_start_km;
    let has_passed = bus_km > pickup_km + PASSED_BUFFER_KM;

    let distance_to_pickup_km = (pickup_km - bus_km).max(0.0);
    let speed = live.cruise_speed_kmh.max(MIN_ETA_SPEED_KMH);
    let eta_to_pickup_min = projector::eta_minutes(&route.polyline, position, pickup, speed);
    let eta_to_dest_min = projector::eta_minutes(&route.polyline, position, drop, speed);

    let status = if has_passed {
        VehicleStatus::Passed
    } else if distance_to_pickup_km > 0.0 && distance_to_pickup_km < ARRIVING_KM {
        VehicleStatus::Arriving
    } else {
        live.status
    };

    Some(Candidate {
        vehicle_id: live.vehicle_id.clone(),
        route_id: live.route_id.clone(),
        lat: position.lat,
        lng: position.lng,
        speed_kmh: live.speed_kmh,
        crowd_percent: live.crowd_percent,
        seats_remaining: live.seats_remaining,
        reliability: live.reliability,
        eta_to_pickup_min,
        eta_to_dest_min,
        distance_to_pickup_km: (distance_to_pickup_km * 100.0).round() / 100.0,
        has_passed,
        status,
        trust_level: live.trust_level,
        trust_confidence: live.trust_confidence,
        nearest_stop: live.nearest_stop.clone(),
        nearest_stop_id: live.nearest_stop_id.clone(),
        last_updated_ms: live.last_updated_ms,
        score: 0,
        rank: 0,
        label: String::new(),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PresenceQuery {
    vehicle_id: String,
    reporter_id: String,
}

async fn presence_check(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PresenceQuery>,
) -> impl IntoResponse {
    let inside = state
        .presence
        .is_inside(&query.vehicle_id, &query.reporter_id);
    Json(json!({ "inside": inside }))
}

/// Ingest one passenger ping. Malformed input is the only client error;
/// everything else is a normal, described outcome.
async fn crowd_update(
    State(state): State<Arc<AppState>>,
    Json(ping): Json<CrowdPing>,
) -> impl IntoResponse {
    match ingest::ingest_ping(&state, ping).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome_body(outcome))),
        Err(TrackerError::InvalidInput(msg)) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "accepted": false, "error": msg })),
        ),
        Err(e @ TrackerError::UnknownReference { .. }) => {
            warn!("crowd update discarded: {e}");
            (
                StatusCode::OK,
                Json(json!({ "accepted": false, "reason": e.to_string() })),
            )
        }
        Err(e) => (
            StatusCode::OK,
            Json(json!({ "accepted": false, "reason": e.to_string() })),
        ),
    }
}

fn outcome_body(outcome: IngestOutcome) -> serde_json::Value {
    match outcome {
        IngestOutcome::SpeedMismatchIgnored => json!({
            "accepted": true,
            "counted": false,
            "reason": "speed mismatch",
        }),
        IngestOutcome::AlreadyReported { inside, reports } => json!({
            "accepted": true,
            "counted": false,
            "reason": "already reported",
            "inside": inside,
            "reports": reports,
        }),
        IngestOutcome::AwaitingQuorum { inside, reports } => json!({
            "accepted": true,
            "counted": true,
            "resolved": false,
            "inside": inside,
            "reports": reports,
        }),
        IngestOutcome::NoFix { inside, reports } => json!({
            "accepted": true,
            "counted": true,
            "resolved": false,
            "inside": inside,
            "reports": reports,
        }),
        IngestOutcome::Resolved { inside, reports, crowd_count } => json!({
            "accepted": true,
            "counted": true,
            "resolved": true,
            "inside": inside,
            "reports": reports,
            "crowdCount": crowd_count,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use crate::routes::RouteCatalog;
    use crate::tracker::registry::TrustLevel;

    fn app() -> Arc<AppState> {
        Arc::new(AppState::new(RouteCatalog::demo(4), TrackerConfig::default()))
    }

    fn live_at(vehicle_id: &str, lat: f64, lng: f64, speed: f64) -> VehicleLiveState {
        let mut live = VehicleLiveState::new(vehicle_id, "R_DEL_CITY");
        live.position = Some(Point::new(lat, lng));
        live.speed_kmh = speed;
        live.cruise_speed_kmh = speed;
        live.reliability = 75;
        live.trust_level = TrustLevel::Medium;
        live.trust_confidence = 70;
        live.last_updated_ms = unix_ms();
        live
    }

    #[test]
    fn candidate_past_pickup_is_flagged_passed() {
        let state = app();
        let route = state.catalog.get("R_DEL_CITY").unwrap();
        // bus near India Gate, pickup back at Anand Vihar
        let live = live_at("BUS-02", 28.6129, 77.2295, 30.0);
        let pickup = route.stop("C1").unwrap().point();
        let drop = route.stop("C5").unwrap().point();

        let c = build_candidate(route, &live, pickup, drop).unwrap();
        assert!(c.has_passed);
        assert_eq!(c.status, VehicleStatus::Passed);
    }

    #[test]
    fn candidate_near_pickup_is_arriving() {
        let state = app();
        let route = state.catalog.get("R_DEL_CITY").unwrap();
        // ~80 m short of Connaught Place, approaching from ITO
        let live = live_at("BUS-02", 28.6314, 77.2175, 25.0);
        let pickup = route.stop("C4").unwrap().point();
        let drop = route.stop("C5").unwrap().point();

        let c = build_candidate(route, &live, pickup, drop).unwrap();
        assert!(!c.has_passed);
        assert!(c.distance_to_pickup_km > 0.0);
        assert_eq!(c.status, VehicleStatus::Arriving);
    }

    #[test]
    fn candidate_just_past_pickup_keeps_its_delay_status() {
        let state = app();
        let route = state.catalog.get("R_DEL_CITY").unwrap();
        // ~45 m beyond Connaught Place: inside the passed buffer, so not
        // PASSED, but no longer approaching either
        let live = live_at("BUS-02", 28.6310, 77.2167, 25.0);
        let pickup = route.stop("C4").unwrap().point();
        let drop = route.stop("C5").unwrap().point();

        let c = build_candidate(route, &live, pickup, drop).unwrap();
        assert!(!c.has_passed);
        assert_eq!(c.distance_to_pickup_km, 0.0);
        assert_eq!(c.status, VehicleStatus::OnTime);
    }

    #[tokio::test]
    async fn health_reports_json_body() {
        let Json(body) = health_check().await;
        assert_eq!(body["ok"], true);
        assert!(body["timestamp"].as_u64().unwrap() > 0);
    }

    #[test]
    fn candidate_without_position_is_skipped() {
        let state = app();
        let route = state.catalog.get("R_DEL_CITY").unwrap();
        let live = VehicleLiveState::new("BUS-02", "R_DEL_CITY");
        let pickup = route.stop("C1").unwrap().point();
        let drop = route.stop("C5").unwrap().point();
        assert!(build_candidate(route, &live, pickup, drop).is_none());
    }

    #[test]
    fn candidate_approaching_gets_positive_eta() {
        let state = app();
        let route = state.catalog.get("R_DEL_CITY").unwrap();
        // bus near the route start, heading toward India Gate
        let live = live_at("BUS-02", 28.6469, 77.3160, 30.0);
        let pickup = route.stop("C4").unwrap().point();
        let drop = route.stop("C5").unwrap().point();

        let c = build_candidate(route, &live, pickup, drop).unwrap();
        assert!(!c.has_passed);
        assert!(c.eta_to_pickup_min > 0.5);
        assert!(c.eta_to_dest_min > c.eta_to_pickup_min);
        assert!(c.distance_to_pickup_km > 5.0);
    }
}
