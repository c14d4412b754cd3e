use crate::config::TrackerConfig;
use crate::live::LivePublisher;
use crate::routes::RouteCatalog;
use crate::tracker::presence::PresenceLedger;
use crate::tracker::registry::LiveRegistry;

/// Shared state for the ingest path, the simulator and the API handlers.
pub struct AppState {
    pub catalog: RouteCatalog,
    pub registry: LiveRegistry,
    pub presence: PresenceLedger,
    pub publisher: LivePublisher,
    pub config: TrackerConfig,
}

impl AppState {
    pub fn new(catalog: RouteCatalog, config: TrackerConfig) -> Self {
        Self {
            catalog,
            registry: LiveRegistry::new(),
            presence: PresenceLedger::new(config.inside_ttl, config.report_ttl),
            publisher: LivePublisher::new(64),
            config,
        }
    }
}
