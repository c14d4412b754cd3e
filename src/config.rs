use std::time::Duration;

/// Process-wide tuning knobs, set once at startup.
///
/// The clustering radius, quorum and spread thresholds are domain-tuned
/// values carried over from field testing; they are kept as configuration
/// rather than re-derived.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Max distance between two passenger pings in the same cluster (meters).
    pub eps_meters: f64,
    /// Minimum pings required to form a cluster (and to attempt detection).
    pub min_cluster_points: usize,
    /// Distinct reporters required inside the report window before a
    /// clustering-derived fix is trusted.
    pub quorum: usize,
    /// How long a reporter counts as "inside" a vehicle after a ping.
    pub inside_ttl: Duration,
    /// How long a reporter's report counts toward quorum.
    pub report_ttl: Duration,
    /// Seated capacity per vehicle.
    pub capacity: u32,
    /// Passengers inferred per distinct reporter when deriving crowd level.
    pub passengers_per_report: u32,
    /// Simulator tick interval.
    pub tick_interval: Duration,
    /// Cap on the per-vehicle recent-ping buffer (FIFO).
    pub ping_buffer_cap: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            eps_meters: 25.0,
            min_cluster_points: 5,
            quorum: 5,
            inside_ttl: Duration::from_secs(120),
            report_ttl: Duration::from_secs(600),
            capacity: 60,
            passengers_per_report: 2,
            tick_interval: Duration::from_millis(2000),
            ping_buffer_cap: 50,
        }
    }
}
