use crate::geo::{self, Point};
use crate::routes::{Route, Stop};
use crate::tracker::projector;
use crate::tracker::ranking::freshness_score;
use crate::tracker::registry::{TrustLevel, VehicleLiveState, VehicleStatus};
use rand::Rng;
use std::collections::VecDeque;
use std::time::Instant;

const SPEED_JITTER_KMH: f64 = 4.0;
const SPEED_MIN_KMH: f64 = 10.0;
const SPEED_MAX_KMH: f64 = 55.0;
const SPEED_HISTORY_LEN: usize = 20;

/// Wrap back to the route start when this close to the end.
const LOOP_THRESHOLD_KM: f64 = 0.05;
/// A vehicle this close to a stop begins a dwell.
const DWELL_RADIUS_KM: f64 = 0.05;
/// "Arriving" when within this distance of the pickup.
const ARRIVING_KM: f64 = 0.2;
/// Fraction of the route beyond the pickup that still counts as "at" it.
const PASSED_T_BUFFER: f64 = 0.02;

const W_SPEED_CONSISTENCY: f64 = 0.25;
const W_PUNCTUALITY: f64 = 0.35;
const W_FRESHNESS: f64 = 0.20;
const W_DWELL: f64 = 0.20;

/// Behavioral archetype a simulated vehicle is seeded into. Assignment
/// cycles by fleet index so every route gets a mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayCategory {
    OnTime,
    Slow,
    Delayed,
}

impl DelayCategory {
    pub fn from_index(index: usize) -> Self {
        match index % 3 {
            0 => DelayCategory::OnTime,
            1 => DelayCategory::Slow,
            _ => DelayCategory::Delayed,
        }
    }

    /// speedFactor range start + span, baseReliability range start + span.
    fn profile(self) -> (f64, f64, f64, f64) {
        match self {
            DelayCategory::OnTime => (0.95, 0.10, 80.0, 20.0),
            DelayCategory::Slow => (0.70, 0.15, 55.0, 25.0),
            DelayCategory::Delayed => (0.45, 0.20, 40.0, 20.0),
        }
    }

    pub fn punctuality_score(self) -> f64 {
        match self {
            DelayCategory::OnTime => 100.0,
            DelayCategory::Slow => 70.0,
            DelayCategory::Delayed => 40.0,
        }
    }

    fn dwell_secs(self, rng: &mut impl Rng) -> f64 {
        match self {
            DelayCategory::OnTime => rng.gen_range(4.0..8.0),
            DelayCategory::Slow => rng.gen_range(7.0..12.0),
            DelayCategory::Delayed => rng.gen_range(10.0..20.0),
        }
    }

    fn default_status(self) -> VehicleStatus {
        match self {
            DelayCategory::OnTime => VehicleStatus::OnTime,
            DelayCategory::Slow => VehicleStatus::Slow,
            DelayCategory::Delayed => VehicleStatus::Delayed,
        }
    }
}

/// FNV-1a over the seed string: the same identity always gets the same
/// attributes, across restarts.
pub fn stable_hash(seed: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in seed.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Map a hash onto [0, 1).
pub fn unit_from_hash(hash: u64) -> f64 {
    (hash >> 11) as f64 / (1u64 << 53) as f64
}

fn seeded_unit(kind: &str, vehicle_id: &str) -> f64 {
    unit_from_hash(stable_hash(&format!("{kind}_{vehicle_id}")))
}

/// One simulated vehicle: a Moving/Dwelling state machine advanced by wall
/// clock time, producing the same live-state stream a real fleet would.
#[derive(Debug)]
pub struct SimVehicle {
    pub vehicle_id: String,
    pub route_id: String,
    pub category: DelayCategory,

    pub total_route_km: f64,
    pub remaining_km: f64,
    /// Fractional position along the route, 0..1.
    pub t: f64,

    pub speed_kmh: f64,
    pub target_speed_kmh: f64,
    pub delay_factor: f64,

    pub base_reliability: u32,
    pub reliability: u32,
    pub passengers: u32,
    pub crowd_percent: u32,
    pub capacity: u32,

    pub position: Point,
    prev_position: Option<Point>,
    pub heading_deg: f64,

    pub dwell_until: Option<Instant>,
    pub last_dwell_stop: Option<usize>,
    pub dwell_count: u32,
    speed_history: VecDeque<f64>,

    pub nearest_stop: Option<(String, String)>,
    pub eta_to_pickup_min: f64,
    pub eta_to_dest_min: f64,
    pub distance_to_pickup_km: f64,
    pub status: VehicleStatus,

    last_stepped: Instant,
    last_updated: Instant,
}

impl SimVehicle {
    /// Seed a vehicle's attributes from its identity and stagger it along
    /// the first 60% of the route by fleet index, so the fleet is always
    /// approaching the default pickup/drop pair rather than past it.
    pub fn seeded(vehicle_id: &str, route: &Route, index: usize, capacity: u32) -> Self {
        let r_speed = seeded_unit("speed", vehicle_id);
        let r_crowd = seeded_unit("crowd", vehicle_id);
        let r_reliability = seeded_unit("rel", vehicle_id);
        let r_position = seeded_unit("pos", vehicle_id);

        let total_route_km = projector::polyline_length_km(&route.polyline);

        let segment = 0.15;
        let start_t = (index as f64 * segment + r_position * segment * 0.8).min(0.60);
        let remaining_km = ((1.0 - start_t) * total_route_km).max(0.0);

        let category = DelayCategory::from_index(index);
        let (factor_base, factor_span, rel_base, rel_span) = category.profile();
        let delay_factor = factor_base + r_reliability * factor_span;
        let base_reliability = (rel_base + r_reliability * rel_span).round() as u32;

        let target_speed_kmh = 25.0 + r_speed * 20.0;
        let passengers = 3 + (r_crowd * 25.0) as u32;
        let crowd_percent = (passengers * 100 / capacity).min(100);

        let now = Instant::now();
        let position = projector::interpolate(&route.polyline, start_t);

        Self {
            vehicle_id: vehicle_id.to_string(),
            route_id: route.id.clone(),
            category,
            total_route_km,
            remaining_km,
            t: start_t,
            speed_kmh: target_speed_kmh,
            target_speed_kmh,
            delay_factor,
            base_reliability,
            reliability: base_reliability,
            passengers,
            crowd_percent,
            capacity,
            position,
            prev_position: None,
            heading_deg: 0.0,
            dwell_until: None,
            last_dwell_stop: None,
            dwell_count: 0,
            speed_history: VecDeque::with_capacity(SPEED_HISTORY_LEN),
            nearest_stop: None,
            eta_to_pickup_min: 0.0,
            eta_to_dest_min: 0.0,
            distance_to_pickup_km: 0.0,
            status: category.default_status(),
            last_stepped: now,
            last_updated: now,
        }
    }

    pub fn is_dwelling(&self, now: Instant) -> bool {
        self.dwell_until.map_or(false, |until| now < until)
    }

    /// Advance the vehicle by the wall-clock time since the last step.
    pub fn step(&mut self, route: &Route, now: Instant) {
        let delta_secs = now.duration_since(self.last_stepped).as_secs_f64();
        if delta_secs <= 0.0 {
            return;
        }

        if self.is_dwelling(now) {
            self.speed_kmh = 0.0;
            self.last_stepped = now;
            self.last_updated = now;
            return;
        }
        self.dwell_until = None;

        let mut rng = rand::thread_rng();

        let jitter = (rng.gen::<f64>() - 0.5) * SPEED_JITTER_KMH;
        self.speed_kmh = (self.target_speed_kmh * self.delay_factor + jitter)
            .clamp(SPEED_MIN_KMH, SPEED_MAX_KMH);

        self.speed_history.push_back(self.speed_kmh);
        while self.speed_history.len() > SPEED_HISTORY_LEN {
            self.speed_history.pop_front();
        }

        let travelled_km = self.speed_kmh / 3600.0 * delta_secs;
        self.remaining_km = (self.remaining_km - travelled_km).max(0.0);

        self.t = if self.total_route_km > 0.0 {
            1.0 - self.remaining_km / self.total_route_km
        } else {
            0.0
        };

        // loop back to the start of the route
        if self.remaining_km <= LOOP_THRESHOLD_KM {
            self.remaining_km = self.total_route_km;
            self.t = 0.0;
            self.last_dwell_stop = None;
            self.dwell_count = 0;
        }

        let position = projector::interpolate(&route.polyline, self.t);
        if let Some(prev) = self.prev_position {
            if prev != position {
                self.heading_deg = geo::bearing_deg(prev, position);
            }
        }
        self.prev_position = Some(position);
        self.position = position;

        if let Some(stop) = route.nearest_stop(position.lat, position.lng) {
            let dist_km = geo::haversine_km(position, stop.point());
            self.nearest_stop = Some((stop.id.clone(), stop.name.clone()));

            if dist_km < DWELL_RADIUS_KM {
                if let Some(stop_index) = route.stop_index(&stop.id) {
                    if self.last_dwell_stop != Some(stop_index) {
                        self.begin_dwell(stop_index, now, &mut rng);
                    }
                }
            }
        }

        self.last_stepped = now;
        self.last_updated = now;
    }

    fn begin_dwell(&mut self, stop_index: usize, now: Instant, rng: &mut impl Rng) {
        self.last_dwell_stop = Some(stop_index);
        self.dwell_count += 1;
        self.dwell_until =
            Some(now + std::time::Duration::from_secs_f64(self.category.dwell_secs(rng)));
        self.speed_kmh = 0.0;

        let delta = ((rng.gen::<f64>() - 0.4) * 8.0).floor() as i64;
        self.passengers = perturb_passengers(self.passengers, self.capacity, delta);
        self.crowd_percent = (self.passengers * 100 / self.capacity).min(100);
    }

    /// Recompute ETAs, status, and reliability against the route's default
    /// pickup/drop pair.
    pub fn compute_intelligence(&mut self, route: &Route, pickup: &Stop, now: Instant) {
        let total = self.total_route_km;

        let dist_to_dest_km = self.remaining_km;

        let pickup_proj = projector::project(&route.polyline, pickup.point());
        let pickup_t = if total > 0.0 {
            pickup_proj.distance_from_start_km / total
        } else {
            0.0
        };
        let dist_to_pickup_km = ((pickup_t - self.t) * total).max(0.0);

        // ETAs use the stable cruising speed, not the jittery tick speed.
        let cruise = self.cruise_speed_kmh();
        self.eta_to_pickup_min = dist_to_pickup_km / cruise * 60.0;
        self.eta_to_dest_min = dist_to_dest_km / cruise * 60.0;
        self.distance_to_pickup_km = dist_to_pickup_km;

        self.status = if self.is_dwelling(now) {
            VehicleStatus::AtStop
        } else if dist_to_pickup_km > 0.0 && dist_to_pickup_km < ARRIVING_KM {
            VehicleStatus::Arriving
        } else if dist_to_pickup_km == 0.0 && self.t > pickup_t + PASSED_T_BUFFER {
            VehicleStatus::Passed
        } else {
            self.category.default_status()
        };

        let age_ms = now.duration_since(self.last_updated).as_millis() as u64;
        self.reliability = self.reliability_score(age_ms);
    }

    pub fn cruise_speed_kmh(&self) -> f64 {
        (self.target_speed_kmh * self.delay_factor).max(SPEED_MIN_KMH)
    }

    /// Weighted reliability: speed consistency 25%, punctuality 35%,
    /// freshness 20%, dwell behavior 20%.
    pub fn reliability_score(&self, age_ms: u64) -> u32 {
        let speed_consistency = if self.speed_history.len() > 5 {
            let n = self.speed_history.len() as f64;
            let mean = self.speed_history.iter().sum::<f64>() / n;
            let variance = self
                .speed_history
                .iter()
                .map(|s| (s - mean).powi(2))
                .sum::<f64>()
                / n;
            (100.0 - variance.sqrt() * 5.0).max(0.0)
        } else {
            100.0
        };

        let punctuality = self.category.punctuality_score();
        let freshness = freshness_score(age_ms);
        let dwell = (self.dwell_count as f64 * 20.0).min(100.0);

        (speed_consistency * W_SPEED_CONSISTENCY
            + punctuality * W_PUNCTUALITY
            + freshness * W_FRESHNESS
            + dwell * W_DWELL)
            .round() as u32
    }

    /// Age-based trust: a vehicle we just heard from is trustworthy.
    pub fn trust(&self, now: Instant) -> (TrustLevel, u32) {
        let age_ms = now.duration_since(self.last_updated).as_millis() as u64;
        if age_ms < 10_000 {
            (TrustLevel::High, 95)
        } else if age_ms < 30_000 {
            (TrustLevel::Medium, 70)
        } else {
            (TrustLevel::Low, 40)
        }
    }

    /// Project this vehicle into its public live record. The simulator is
    /// authoritative for vehicles it drives.
    pub fn write_live(&self, live: &mut VehicleLiveState, now: Instant, now_ms: u64) {
        let (trust_level, trust_confidence) = self.trust(now);

        live.position = Some(self.position);
        live.speed_kmh = self.speed_kmh.round();
        live.cruise_speed_kmh = self.cruise_speed_kmh();
        live.heading_deg = self.heading_deg;
        live.crowd_percent = self.crowd_percent;
        live.seats_remaining = self.capacity.saturating_sub(self.passengers);
        live.reliability = self.reliability;
        live.trust_level = trust_level;
        live.trust_confidence = trust_confidence;
        live.status = self.status;
        live.eta_to_pickup_min = round1(self.eta_to_pickup_min);
        live.eta_to_dest_min = round1(self.eta_to_dest_min);
        live.distance_to_pickup_km = round2(self.distance_to_pickup_km);
        live.nearest_stop = self.nearest_stop.as_ref().map(|(_, name)| name.clone());
        live.nearest_stop_id = self.nearest_stop.as_ref().map(|(id, _)| id.clone());
        live.last_updated_ms = now_ms;
    }
}

/// Crowd change at a stop, bounded so the vehicle is never empty and never
/// packed solid.
pub fn perturb_passengers(passengers: u32, capacity: u32, delta: i64) -> u32 {
    let upper = capacity.saturating_sub(5).max(2) as i64;
    (passengers as i64 + delta).clamp(2, upper) as u32
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
