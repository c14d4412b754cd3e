use crate::tracker::registry::VehicleLiveState;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

/// One keyed broadcast: the full set of a route's current vehicle snapshots.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteUpdate {
    pub route_id: String,
    pub vehicles: Vec<VehicleLiveState>,
}

/// Push seam for live updates. Subscribers get per-route snapshots; a
/// publish with nobody listening is dropped silently. Publishing never
/// blocks and never fails the caller.
pub struct LivePublisher {
    tx: broadcast::Sender<RouteUpdate>,
}

impl LivePublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RouteUpdate> {
        self.tx.subscribe()
    }

    pub fn publish(&self, update: RouteUpdate) {
        let route_id = update.route_id.clone();
        if let Err(e) = self.tx.send(update) {
            debug!(%route_id, "no live subscribers for update: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_without_subscribers_is_swallowed() {
        let publisher = LivePublisher::new(8);
        publisher.publish(RouteUpdate {
            route_id: "R1".to_string(),
            vehicles: vec![],
        });
    }

    #[tokio::test]
    async fn subscriber_receives_keyed_update() {
        let publisher = LivePublisher::new(8);
        let mut rx = publisher.subscribe();
        publisher.publish(RouteUpdate {
            route_id: "R1".to_string(),
            vehicles: vec![],
        });
        let update = rx.recv().await.unwrap();
        assert_eq!(update.route_id, "R1");
    }
}
