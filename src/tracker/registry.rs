use crate::geo::Point;
use crate::tracker::cluster::{PingSample, ResolvedFix};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleStatus {
    OnTime,
    Slow,
    Delayed,
    AtStop,
    Arriving,
    Passed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrustLevel {
    High,
    Medium,
    Low,
}

/// The one authoritative live record per vehicle.
///
/// Created on the first accepted ping (or simulator tick), mutated in place
/// on every update, never explicitly destroyed — stale entries just score
/// poorly on freshness and fall out of ranking.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleLiveState {
    pub vehicle_id: String,
    pub route_id: String,
    pub position: Option<Point>,
    pub speed_kmh: f64,
    /// Stable cruising speed used for ETA math, less jittery than the
    /// instantaneous speed.
    pub cruise_speed_kmh: f64,
    pub heading_deg: f64,
    pub crowd_percent: u32,
    pub seats_remaining: u32,
    pub reliability: u32,
    pub trust_level: TrustLevel,
    pub trust_confidence: u32,
    pub status: VehicleStatus,
    pub eta_to_pickup_min: f64,
    pub eta_to_dest_min: f64,
    pub distance_to_pickup_km: f64,
    pub nearest_stop: Option<String>,
    pub nearest_stop_id: Option<String>,
    /// Whether the position is a clustering-derived fix. Below quorum only
    /// the raw last-seen coordinates are held.
    pub has_fix: bool,
    pub last_fix: Option<ResolvedFix>,
    pub report_count: u32,
    pub last_updated_ms: u64,
    #[serde(skip)]
    pub recent_pings: VecDeque<PingSample>,
}

impl VehicleLiveState {
    pub fn new(vehicle_id: &str, route_id: &str) -> Self {
        Self {
            vehicle_id: vehicle_id.to_string(),
            route_id: route_id.to_string(),
            position: None,
            speed_kmh: 0.0,
            cruise_speed_kmh: 0.0,
            heading_deg: 0.0,
            crowd_percent: 0,
            seats_remaining: 0,
            reliability: 50,
            trust_level: TrustLevel::Low,
            trust_confidence: 20,
            status: VehicleStatus::OnTime,
            eta_to_pickup_min: 0.0,
            eta_to_dest_min: 0.0,
            distance_to_pickup_km: 0.0,
            nearest_stop: None,
            nearest_stop_id: None,
            has_fix: false,
            last_fix: None,
            report_count: 0,
            last_updated_ms: 0,
            recent_pings: VecDeque::new(),
        }
    }

    /// Append to the bounded recent-ping buffer; strict FIFO eviction.
    pub fn push_ping(&mut self, sample: PingSample, cap: usize) {
        self.recent_pings.push_back(sample);
        while self.recent_pings.len() > cap {
            self.recent_pings.pop_front();
        }
    }
}

/// Trust tier derived from report volume.
pub fn trust_from_reports(report_count: usize) -> (TrustLevel, u32) {
    let n = report_count as u32;
    if report_count >= 10 {
        (TrustLevel::High, 95.min(50 + n * 5))
    } else if report_count >= 5 {
        (TrustLevel::Medium, 70.min(40 + n * 4))
    } else {
        (TrustLevel::Low, 20)
    }
}

pub fn unix_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Process-wide registry owning one live record per vehicle.
///
/// The outer map lock is held only long enough to fetch the per-vehicle
/// handle; all mutation goes through the vehicle's own mutex, so updates for
/// different vehicles never contend and updates for the same vehicle are
/// serialized.
#[derive(Default)]
pub struct LiveRegistry {
    vehicles: RwLock<HashMap<String, Arc<Mutex<VehicleLiveState>>>>,
}

impl LiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entry(&self, vehicle_id: &str, route_id: &str) -> Arc<Mutex<VehicleLiveState>> {
        if let Some(existing) = self.vehicles.read().await.get(vehicle_id) {
            return existing.clone();
        }
        let mut map = self.vehicles.write().await;
        map.entry(vehicle_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(VehicleLiveState::new(vehicle_id, route_id))))
            .clone()
    }

    pub async fn get(&self, vehicle_id: &str) -> Option<Arc<Mutex<VehicleLiveState>>> {
        self.vehicles.read().await.get(vehicle_id).cloned()
    }

    /// Clone the current state of every vehicle on a route. The clones are a
    /// consistent-enough snapshot for read-only scoring; no lock is held
    /// while callers work on them.
    pub async fn snapshot_route(&self, route_id: &str) -> Vec<VehicleLiveState> {
        let handles: Vec<Arc<Mutex<VehicleLiveState>>> = {
            let map = self.vehicles.read().await;
            map.values().cloned().collect()
        };

        let mut out = Vec::new();
        for handle in handles {
            let state = handle.lock().await;
            if state.route_id == route_id {
                out.push(state.clone());
            }
        }
        out.sort_by(|a, b| a.vehicle_id.cmp(&b.vehicle_id));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_buffer_is_bounded_fifo() {
        let mut state = VehicleLiveState::new("BUS-01", "R1");
        for i in 0..60 {
            state.push_ping(
                PingSample { lat: i as f64, lng: 0.0, speed_kmh: 0.0 },
                50,
            );
        }
        assert_eq!(state.recent_pings.len(), 50);
        // oldest ten evicted
        assert_eq!(state.recent_pings.front().unwrap().lat, 10.0);
        assert_eq!(state.recent_pings.back().unwrap().lat, 59.0);
    }

    #[test]
    fn trust_tiers_by_report_volume() {
        assert_eq!(trust_from_reports(2), (TrustLevel::Low, 20));
        assert_eq!(trust_from_reports(5), (TrustLevel::Medium, 60));
        assert_eq!(trust_from_reports(10), (TrustLevel::High, 95));
        assert_eq!(trust_from_reports(50), (TrustLevel::High, 95));
    }

    #[tokio::test]
    async fn snapshot_filters_by_route() {
        let registry = LiveRegistry::new();
        registry.entry("BUS-01", "R1").await;
        registry.entry("BUS-02", "R2").await;
        registry.entry("BUS-03", "R1").await;

        let snap = registry.snapshot_route("R1").await;
        let ids: Vec<&str> = snap.iter().map(|s| s.vehicle_id.as_str()).collect();
        assert_eq!(ids, vec!["BUS-01", "BUS-03"]);
    }

    #[tokio::test]
    async fn entry_returns_the_same_record() {
        let registry = LiveRegistry::new();
        let a = registry.entry("BUS-01", "R1").await;
        let b = registry.entry("BUS-01", "R1").await;
        assert!(Arc::ptr_eq(&a, &b));
    }
}
