//! `Broadcaster` — fans classified events out to downstream connections.
//!
//! Delivery never waits on a connection: each event is pushed onto the
//! connection's bounded outbound queue with `try_send`. A connection whose
//! queue is full or closed is evicted so it cannot hold up the others.

use crate::config::{DownstreamFormat, FanoutMode, HubConfig};
use crate::error::DeliveryError;
use crate::registry::{ConnectionHandle, SubscriptionRegistry};
use pumprelay_core::ClassifiedEvent;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Result of fanning out a single event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub delivered: usize,
    pub evicted: usize,
}

/// Cumulative fan-out counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastMetrics {
    pub events: u64,
    pub deliveries: u64,
    pub evictions: u64,
    /// Events that matched no connection
    pub unrouted: u64,
}

pub struct Broadcaster {
    registry: SubscriptionRegistry,
    config: HubConfig,
    metrics: Mutex<BroadcastMetrics>,
}

impl Broadcaster {
    pub fn new(registry: SubscriptionRegistry, config: HubConfig) -> Self {
        Self {
            registry,
            config,
            metrics: Mutex::new(BroadcastMetrics::default()),
        }
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> BroadcastMetrics {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drain `events` until the queue closes or shutdown is signalled.
    pub async fn run(
        &self,
        mut events: mpsc::Receiver<ClassifiedEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(fanout = ?self.config.fanout, format = ?self.config.format, "broadcaster started");
        loop {
            let event = tokio::select! {
                event = events.recv() => event,
                _ = shutdown.changed() => break,
            };
            let Some(event) = event else {
                break;
            };
            self.broadcast(&event);
        }
        info!("broadcaster stopped");
    }

    /// Queue `event` for every matching connection.
    pub fn broadcast(&self, event: &ClassifiedEvent) -> FanoutReport {
        let targets = self.targets(event);
        let mut report = FanoutReport::default();

        if targets.is_empty() {
            debug!(signature = %event.signature, kind = %event.kind, "no downstream subscribers");
            self.record(&report, true);
            return report;
        }

        let Some(message) = self.render(event) else {
            self.record(&report, false);
            return report;
        };

        for handle in targets {
            match handle.try_deliver(Arc::clone(&message)) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    self.evict(&handle, e);
                    report.evicted += 1;
                }
            }
        }

        debug!(
            signature = %event.signature,
            kind = %event.kind,
            delivered = report.delivered,
            evicted = report.evicted,
            "event fanned out"
        );
        self.record(&report, false);
        report
    }

    fn targets(&self, event: &ClassifiedEvent) -> Vec<ConnectionHandle> {
        match self.config.fanout {
            FanoutMode::Topic => self.registry.snapshot_for_addresses(&event.addresses()),
            FanoutMode::All => self.registry.snapshot_all(),
        }
    }

    fn render(&self, event: &ClassifiedEvent) -> Option<Arc<str>> {
        match self.config.format {
            DownstreamFormat::Raw => Some(Arc::clone(&event.raw)),
            DownstreamFormat::Classified => match serde_json::to_string(&event.to_message()) {
                Ok(json) => Some(json.into()),
                Err(e) => {
                    warn!(error = %e, signature = %event.signature, "failed to encode classified event");
                    None
                }
            },
        }
    }

    fn evict(&self, handle: &ConnectionHandle, reason: DeliveryError) {
        warn!(connection = %handle.id(), reason = %reason, "evicting downstream connection");
        self.registry.remove_connection(handle.id());
    }

    fn record(&self, report: &FanoutReport, unrouted: bool) {
        let mut m = self.metrics.lock().unwrap_or_else(PoisonError::into_inner);
        m.events += 1;
        m.deliveries += report.delivered as u64;
        m.evictions += report.evicted as u64;
        if unrouted {
            m.unrouted += 1;
        }
    }
}
