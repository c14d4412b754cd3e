//! Synthetic fleet driver. Until enough real passenger reports flow in,
//! simulated vehicles keep every route populated with plausible motion,
//! crowding and reliability data.

pub mod vehicle;

use crate::live::RouteUpdate;
use crate::state::AppState;
use crate::tracker::registry::{unix_ms, VehicleLiveState};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use vehicle::SimVehicle;

/// A crowd-resolved fix older than this no longer outranks simulation; the
/// matching freshness tier has already decayed to its floor by then.
const FIX_STALE_MS: u64 = 30_000;

/// Build the fleet from the catalog's assignment table. Vehicles are
/// indexed per route so each route independently gets the stagger spread
/// and the delay-category mix.
pub fn build_fleet(state: &AppState) -> Vec<SimVehicle> {
    let mut per_route_index: std::collections::HashMap<&str, usize> =
        std::collections::HashMap::new();
    let mut fleet = Vec::new();

    for (vehicle_id, route_id) in state.catalog.fleet() {
        let Some(route) = state.catalog.get(route_id) else {
            continue;
        };
        let index = per_route_index.entry(route_id.as_str()).or_insert(0);
        fleet.push(SimVehicle::seeded(
            vehicle_id,
            route,
            *index,
            state.config.capacity,
        ));
        *index += 1;
    }

    info!(vehicles = fleet.len(), "simulated fleet initialized");
    fleet
}

/// Drive the fleet on the configured tick until the process exits. Each
/// tick advances every vehicle, refreshes its live record, and publishes
/// one snapshot per touched route.
pub async fn run_simulator(state: Arc<AppState>) {
    let mut fleet = build_fleet(&state);
    let mut ticker = tokio::time::interval(state.config.tick_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let now = Instant::now();
        let now_ms = unix_ms();
        let mut touched_routes: HashSet<String> = HashSet::new();

        for sim in &mut fleet {
            let Some(route) = state.catalog.get(&sim.route_id) else {
                continue;
            };
            let Some(pickup) = route.stops.first() else {
                continue;
            };

            sim.step(route, now);
            sim.compute_intelligence(route, pickup, now);

            let entry = state.registry.entry(&sim.vehicle_id, &sim.route_id).await;
            let mut live = entry.lock().await;
            // Fresh crowd-sourced fixes outrank simulation for position data;
            // once reports dry up, the simulator reclaims the vehicle so its
            // record keeps moving.
            reclaim_if_stale(&mut live, now_ms);
            if !live.has_fix {
                sim.write_live(&mut live, now, now_ms);
            }
            drop(live);

            touched_routes.insert(sim.route_id.clone());
        }

        for route_id in touched_routes {
            let vehicles = state.registry.snapshot_route(&route_id).await;
            debug!(route = %route_id, vehicles = vehicles.len(), "simulator tick published");
            state.publisher.publish(RouteUpdate { route_id, vehicles });
        }
    }
}

/// Drop a crowd-resolved fix whose last update is past the staleness
/// horizon, handing the vehicle back to the simulator.
fn reclaim_if_stale(live: &mut VehicleLiveState, now_ms: u64) {
    if live.has_fix && now_ms.saturating_sub(live.last_updated_ms) > FIX_STALE_MS {
        live.has_fix = false;
        live.last_fix = None;
    }
}
