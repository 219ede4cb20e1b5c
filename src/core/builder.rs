use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    core::TowerConfig,
    events::Bus,
    ledger::Ledger,
    runway::RunwayPool,
    subscribers::{Subscribe, SubscriberSet},
};
use super::{registry::Registry, tower::Tower};

/// Builder for constructing a [`Tower`].
pub struct TowerBuilder {
    cfg: TowerConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl TowerBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: TowerConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (admission, runway claims, completions,
    /// publishing, shutdown) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the tower and starts its background listeners.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Arc<Tower> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
        let runtime_token = CancellationToken::new();

        let ledger = Arc::new(Ledger::new());
        let pool = RunwayPool::new(self.cfg.runway_capacity());
        let registry = Registry::new(bus.clone(), Arc::clone(&ledger), runtime_token.clone());

        let tower = Arc::new(Tower::new_internal(
            self.cfg,
            bus,
            subs,
            ledger,
            pool,
            Arc::clone(&registry),
            runtime_token,
        ));

        tower.subscriber_listener();
        registry.spawn_listener();
        tower
    }
}
