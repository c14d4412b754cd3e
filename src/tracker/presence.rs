use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Tracks which reporters are currently inside each vehicle and which have
/// contributed a report within the current window.
///
/// Membership is TTL-based: entries expire silently and are pruned lazily on
/// access, so a stale entry can only ever undercount, never crash. The two
/// sets have independent lifecycles — "inside" is short-lived presence,
/// "reported" is the longer window that stops one reporter from dominating
/// quorum.
pub struct PresenceLedger {
    inside_ttl: Duration,
    report_ttl: Duration,
    inner: Mutex<Sets>,
}

#[derive(Default)]
struct Sets {
    /// vehicle_id -> reporter_id -> expiry
    inside: HashMap<String, HashMap<String, Instant>>,
    /// vehicle_id -> reporter_id -> expiry
    reported: HashMap<String, HashMap<String, Instant>>,
    /// reporter_id -> vehicle they were last marked inside. A reporter can
    /// only occupy one vehicle at a time.
    occupant: HashMap<String, String>,
}

fn prune(set: &mut HashMap<String, Instant>, now: Instant) {
    set.retain(|_, expiry| *expiry > now);
}

impl PresenceLedger {
    pub fn new(inside_ttl: Duration, report_ttl: Duration) -> Self {
        Self {
            inside_ttl,
            report_ttl,
            inner: Mutex::new(Sets::default()),
        }
    }

    /// Idempotently add the reporter to the vehicle's inside-set with a
    /// refreshed expiry. Moves the reporter out of any previous vehicle.
    pub fn mark_inside(&self, vehicle_id: &str, reporter_id: &str) {
        let now = Instant::now();
        let mut sets = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(prev) = sets
            .occupant
            .insert(reporter_id.to_string(), vehicle_id.to_string())
        {
            if prev != vehicle_id {
                if let Some(set) = sets.inside.get_mut(&prev) {
                    set.remove(reporter_id);
                }
            }
        }

        let set = sets.inside.entry(vehicle_id.to_string()).or_default();
        set.insert(reporter_id.to_string(), now + self.inside_ttl);
        prune(set, now);
    }

    /// Idempotently record that the reporter contributed a report for this
    /// vehicle within the report window.
    pub fn mark_reported(&self, vehicle_id: &str, reporter_id: &str) {
        let now = Instant::now();
        let mut sets = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let set = sets.reported.entry(vehicle_id.to_string()).or_default();
        set.insert(reporter_id.to_string(), now + self.report_ttl);
        prune(set, now);
    }

    pub fn inside_count(&self, vehicle_id: &str) -> usize {
        let now = Instant::now();
        let mut sets = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match sets.inside.get_mut(vehicle_id) {
            Some(set) => {
                prune(set, now);
                set.len()
            }
            None => 0,
        }
    }

    pub fn report_count(&self, vehicle_id: &str) -> usize {
        let now = Instant::now();
        let mut sets = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match sets.reported.get_mut(vehicle_id) {
            Some(set) => {
                prune(set, now);
                set.len()
            }
            None => 0,
        }
    }

    pub fn has_reported(&self, vehicle_id: &str, reporter_id: &str) -> bool {
        let now = Instant::now();
        let sets = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        sets.reported
            .get(vehicle_id)
            .and_then(|set| set.get(reporter_id))
            .map(|expiry| *expiry > now)
            .unwrap_or(false)
    }

    pub fn is_inside(&self, vehicle_id: &str, reporter_id: &str) -> bool {
        let now = Instant::now();
        let sets = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        sets.inside
            .get(vehicle_id)
            .and_then(|set| set.get(reporter_id))
            .map(|expiry| *expiry > now)
            .unwrap_or(false)
    }
}
