use crate::error::TrackerError;
use crate::geo::Point;
use crate::live::RouteUpdate;
use crate::state::AppState;
use crate::tracker::cluster::{self, PingSample};
use crate::tracker::projector;
use crate::tracker::registry::{self, unix_ms};
use serde::Deserialize;
use tracing::debug;

/// Reports whose speed disagrees with the vehicle by more than this are
/// kept for presence but ignored for crowd influence.
const SPEED_MISMATCH_KMH: f64 = 25.0;

/// Fallback speed when a reporter's device sends none.
const DEFAULT_REPORT_SPEED_KMH: f64 = 20.0;

/// A structured location report from a passenger's device.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrowdPing {
    pub reporter_id: String,
    pub vehicle_id: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default, rename = "speed")]
    pub speed_kmh: Option<f64>,
}

/// What happened to an accepted ping. All of these are normal results;
/// only malformed input or unknown references reject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Presence refreshed, but the reported speed disagreed with the
    /// vehicle too much to count toward the crowd.
    SpeedMismatchIgnored,
    /// The reporter already contributed within the report window.
    AlreadyReported { inside: usize, reports: usize },
    /// Raw GPS recorded; still below the reporter quorum.
    AwaitingQuorum { inside: usize, reports: usize },
    /// Quorum met but the buffered pings do not form a dense cluster yet.
    NoFix { inside: usize, reports: usize },
    /// A clustering-derived fix was resolved and published.
    Resolved {
        inside: usize,
        reports: usize,
        crowd_count: usize,
    },
}

/// Run one passenger ping through the full pipeline:
/// presence → gates → raw GPS passthrough → quorum → clustering →
/// route projection → live-state update → best-effort publish.
pub async fn ingest_ping(
    state: &AppState,
    ping: CrowdPing,
) -> Result<IngestOutcome, TrackerError> {
    if ping.reporter_id.trim().is_empty() || ping.vehicle_id.trim().is_empty() {
        return Err(TrackerError::InvalidInput(
            "reporterId and vehicleId are required".to_string(),
        ));
    }
    if !ping.lat.is_finite()
        || !ping.lng.is_finite()
        || ping.lat.abs() > 90.0
        || ping.lng.abs() > 180.0
    {
        return Err(TrackerError::InvalidInput(
            "lat/lng out of range".to_string(),
        ));
    }

    // A ping for a vehicle we know nothing about is discarded, not failed.
    let route_id = state
        .catalog
        .route_for_vehicle(&ping.vehicle_id)
        .map(str::to_string)
        .ok_or_else(|| TrackerError::UnknownReference {
            kind: "vehicle",
            id: ping.vehicle_id.clone(),
        })?;
    let route = state.catalog.require(&route_id)?;

    state.presence.mark_inside(&ping.vehicle_id, &ping.reporter_id);

    let cfg = &state.config;
    let entry = state.registry.entry(&ping.vehicle_id, &route_id).await;
    let mut live = entry.lock().await;

    let reported_speed = ping.speed_kmh.unwrap_or(0.0);
    if live.speed_kmh > 0.0 && (reported_speed - live.speed_kmh).abs() > SPEED_MISMATCH_KMH {
        debug!(
            vehicle = %ping.vehicle_id,
            reporter = %ping.reporter_id,
            "speed mismatch, report ignored for crowd influence"
        );
        return Ok(IngestOutcome::SpeedMismatchIgnored);
    }

    if state.presence.has_reported(&ping.vehicle_id, &ping.reporter_id) {
        let inside = state.presence.inside_count(&ping.vehicle_id);
        let reports = state.presence.report_count(&ping.vehicle_id);
        return Ok(IngestOutcome::AlreadyReported { inside, reports });
    }
    state.presence.mark_reported(&ping.vehicle_id, &ping.reporter_id);

    let inside = state.presence.inside_count(&ping.vehicle_id);
    let reports = state.presence.report_count(&ping.vehicle_id);

    // Always carry the raw last-seen position so discovery works pre-quorum.
    live.position = Some(Point::new(ping.lat, ping.lng));
    live.speed_kmh = if reported_speed > 0.0 {
        reported_speed
    } else {
        DEFAULT_REPORT_SPEED_KMH
    };
    live.cruise_speed_kmh = live.speed_kmh;
    live.report_count = reports as u32;
    live.last_updated_ms = unix_ms();

    if reports < cfg.quorum {
        return Ok(IngestOutcome::AwaitingQuorum { inside, reports });
    }

    live.push_ping(
        PingSample {
            lat: ping.lat,
            lng: ping.lng,
            speed_kmh: reported_speed,
        },
        cfg.ping_buffer_cap,
    );

    let samples: Vec<PingSample> = live.recent_pings.iter().copied().collect();
    let Some(fix) = cluster::detect_vehicle(&samples, cfg.eps_meters, cfg.min_cluster_points)
    else {
        debug!(
            vehicle = %ping.vehicle_id,
            buffered = samples.len(),
            "{}",
            TrackerError::InsufficientData
        );
        return Ok(IngestOutcome::NoFix { inside, reports });
    };

    let (Some(pickup), Some(drop)) = (route.stops.first(), route.stops.last()) else {
        return Ok(IngestOutcome::NoFix { inside, reports });
    };

    let fix_point = Point::new(fix.lat, fix.lng);
    let eta_to_pickup =
        projector::eta_minutes(&route.polyline, fix_point, pickup.point(), fix.speed_kmh);
    let eta_to_dest =
        projector::eta_minutes(&route.polyline, fix_point, drop.point(), fix.speed_kmh);
    let nearest = route.nearest_stop(fix.lat, fix.lng);

    // Crowd derives from distinct reports within the window, not raw pings.
    let passengers = (reports as u32 * cfg.passengers_per_report).min(cfg.capacity);
    let crowd_percent = (passengers * 100 / cfg.capacity).min(100);
    let seats_remaining = cfg.capacity.saturating_sub(passengers);
    let (trust_level, trust_confidence) = registry::trust_from_reports(reports);

    let crowd_count = fix.crowd_count;
    live.position = Some(fix_point);
    live.speed_kmh = fix.speed_kmh;
    live.cruise_speed_kmh = fix.speed_kmh;
    live.crowd_percent = crowd_percent;
    live.seats_remaining = seats_remaining;
    live.eta_to_pickup_min = eta_to_pickup;
    live.eta_to_dest_min = eta_to_dest;
    live.trust_level = trust_level;
    live.trust_confidence = trust_confidence;
    live.nearest_stop = nearest.map(|s| s.name.clone());
    live.nearest_stop_id = nearest.map(|s| s.id.clone());
    live.has_fix = true;
    live.last_fix = Some(fix);
    live.last_updated_ms = unix_ms();
    std::mem::drop(live);

    // Best-effort broadcast of the whole route's current snapshots.
    let vehicles = state.registry.snapshot_route(&route_id).await;
    state.publisher.publish(RouteUpdate { route_id, vehicles });

    Ok(IngestOutcome::Resolved {
        inside,
        reports,
        crowd_count,
    })
}
