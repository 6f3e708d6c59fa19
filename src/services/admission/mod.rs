//! Admission control
//!
//! Two independent limiters share one ephemeral counter store:
//! - [`ApiBudget`]: fixed-window call budget per session
//! - [`StreamSlots`]: concurrent playback-issuance slots per subscriber
//!
//! Both fail open. Which store backs them is decided once at startup; the
//! limiters never check whether a store is present.

pub mod api_budget;
pub mod counter_store;
pub mod redis_store;
pub mod stream_slots;

use std::sync::Arc;
use tracing::info;

pub use api_budget::{ApiBudget, RateLimitInfo};
pub use counter_store::{CounterStore, MemoryCounterStore, NullCounterStore};
pub use redis_store::RedisCounterStore;
pub use stream_slots::{SlotReservation, StreamSlots};

use crate::config::{LimiterBackend, LimiterConfig};
use crate::utils::SharedClock;

#[derive(Clone)]
pub struct AdmissionController {
    store: Arc<dyn CounterStore>,
    api: ApiBudget,
    slots: StreamSlots,
}

impl AdmissionController {
    pub fn new(store: Arc<dyn CounterStore>, config: &LimiterConfig, clock: SharedClock) -> Self {
        let api = ApiBudget::new(
            store.clone(),
            clock,
            config.api_requests_per_window,
            config.api_window,
            config.window_margin,
            config.operation_timeout,
        );
        let slots = StreamSlots::new(store.clone(), config.slot_ttl, config.operation_timeout);
        Self { store, api, slots }
    }

    /// Build the controller with the store selected by configuration
    pub async fn from_config(config: &LimiterConfig, clock: SharedClock) -> anyhow::Result<Self> {
        let store: Arc<dyn CounterStore> = match config.effective_backend() {
            LimiterBackend::Redis => {
                let url = config.redis_url.as_deref().unwrap_or_default();
                let store = RedisCounterStore::new(url)
                    .map_err(|e| anyhow::anyhow!("Invalid limiter.redis_url: {e}"))?;
                store.warm_up(config.operation_timeout * 10).await;
                Arc::new(store)
            }
            LimiterBackend::Memory => Arc::new(MemoryCounterStore::new()),
            LimiterBackend::Disabled => Arc::new(NullCounterStore),
        };

        info!(
            backend = store.backend_name(),
            api_limit = config.api_requests_per_window,
            api_window_secs = config.api_window.as_secs(),
            "Admission controller initialised"
        );

        Ok(Self::new(store, config, clock))
    }

    pub fn api(&self) -> &ApiBudget {
        &self.api
    }

    pub fn slots(&self) -> &StreamSlots {
        &self.slots
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }
}
