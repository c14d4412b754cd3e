use crate::tracker::registry::{TrustLevel, VehicleStatus};
use serde::Serialize;
use std::cmp::Reverse;

/// Weighted score: ETA 35%, reliability 25%, crowd 20%, motion 10%,
/// freshness 10%.
const W_ETA: f64 = 0.35;
const W_RELIABILITY: f64 = 0.25;
const W_CROWD: f64 = 0.20;
const W_MOTION: f64 = 0.10;
const W_FRESHNESS: f64 = 0.10;

const ETA_CAP_MIN: f64 = 30.0;
const STATIONARY_MOTION_FLOOR: f64 = 40.0;

/// Sentinel for vehicles that have already passed the rider's pickup: they
/// always sort last, whatever their other inputs.
const PASSED_SENTINEL: i32 = -9999;

/// One vehicle as presented to a rider for a pickup/drop pair.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub vehicle_id: String,
    pub route_id: String,
    pub lat: f64,
    pub lng: f64,
    pub speed_kmh: f64,
    pub crowd_percent: u32,
    pub seats_remaining: u32,
    pub reliability: u32,
    pub eta_to_pickup_min: f64,
    pub eta_to_dest_min: f64,
    pub distance_to_pickup_km: f64,
    pub has_passed: bool,
    pub status: VehicleStatus,
    pub trust_level: TrustLevel,
    pub trust_confidence: u32,
    pub nearest_stop: Option<String>,
    pub nearest_stop_id: Option<String>,
    pub last_updated_ms: u64,
    pub score: i32,
    pub rank: u32,
    pub label: String,
}

/// Step function of update age, shared with the simulator's reliability
/// model.
pub fn freshness_score(age_ms: u64) -> f64 {
    if age_ms < 5_000 {
        100.0
    } else if age_ms < 15_000 {
        80.0
    } else if age_ms < 30_000 {
        50.0
    } else {
        20.0
    }
}

fn score(candidate: &Candidate, now_ms: u64) -> i32 {
    if candidate.has_passed || candidate.status == VehicleStatus::Passed {
        return PASSED_SENTINEL;
    }

    let eta = candidate.eta_to_pickup_min.min(ETA_CAP_MIN);
    let eta_norm = (100.0 - eta / ETA_CAP_MIN * 100.0).max(0.0);

    let reliability_norm = candidate.reliability as f64;

    let crowd_norm = (100.0 - candidate.crowd_percent as f64).max(0.0);

    let motion_norm = if candidate.speed_kmh > 0.0 {
        (candidate.speed_kmh * 3.0).min(100.0)
    } else {
        STATIONARY_MOTION_FLOOR
    };

    let age_ms = now_ms.saturating_sub(candidate.last_updated_ms);
    let freshness_norm = freshness_score(age_ms);

    (eta_norm * W_ETA
        + reliability_norm * W_RELIABILITY
        + crowd_norm * W_CROWD
        + motion_norm * W_MOTION
        + freshness_norm * W_FRESHNESS)
        .round() as i32
}

/// Score, order and label candidates for a rider.
///
/// Sort is stable and descending, so equal scores keep their input order.
/// Every vehicle ends up with exactly one label.
pub fn rank(mut candidates: Vec<Candidate>, now_ms: u64) -> Vec<Candidate> {
    if candidates.is_empty() {
        return candidates;
    }

    for c in &mut candidates {
        c.score = score(c, now_ms);
    }
    candidates.sort_by_key(|c| Reverse(c.score));

    let fastest = arg_best(&candidates, |c| c.eta_to_pickup_min, f64::lt);
    let least_crowded = arg_best(&candidates, |c| c.crowd_percent as f64, f64::lt);
    let most_seats = arg_best(&candidates, |c| c.seats_remaining as f64, f64::gt);

    for (i, c) in candidates.iter_mut().enumerate() {
        c.rank = i as u32 + 1;
        c.label = if i == 0 {
            "BEST CHOICE"
        } else if i == fastest {
            "FASTEST"
        } else if i == least_crowded {
            "LESS CROWDED"
        } else if i == most_seats {
            "MOST SEATS"
        } else if c.status == VehicleStatus::OnTime {
            "ON TIME"
        } else {
            "AVAILABLE"
        }
        .to_string();
    }

    candidates
}

/// Index of the best candidate under `better`; first index wins ties.
fn arg_best(
    candidates: &[Candidate],
    key: impl Fn(&Candidate) -> f64,
    better: impl Fn(&f64, &f64) -> bool,
) -> usize {
    let mut best = 0;
    for i in 1..candidates.len() {
        if better(&key(&candidates[i]), &key(&candidates[best])) {
            best = i;
        }
    }
    best
}
