//! Concurrent stream-slot budget per subscriber
//!
//! A slot is held only while a capability URL is being issued: the gateway
//! never learns when playback ends, so this throttles issuance rather than
//! metering viewing. The counter carries a TTL longer than any capability so
//! a slot abandoned by a crashed request reclaims itself.
//!
//! Reservation increments first and checks second. Concurrent reservations
//! therefore cannot over-admit; the loser of a race sees a count above the
//! limit and rolls its increment back. The TTL is set by a separate call after
//! the first increment; if that call fails the key lives on without expiry
//! until an explicit release brings it back to zero.
//!
//! Every counted increment is owned by a [`SlotReservation`] from the moment
//! `INCR` returns, and releases run on their own task, so a request cancelled
//! at any later await still gives its slot back. An `INCR` that times out
//! after the store applied it cannot be told apart from one that never ran;
//! it is left untracked and a follow-up `EXPIRE` bounds its lifetime by the
//! slot TTL.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::counter_store::{CounterStore, with_timeout};
use crate::errors::{AppError, AppResult};
use crate::models::Entitlement;

#[derive(Clone)]
pub struct StreamSlots {
    store: Arc<dyn CounterStore>,
    slot_ttl: Duration,
    operation_timeout: Duration,
}

impl StreamSlots {
    pub fn new(store: Arc<dyn CounterStore>, slot_ttl: Duration, operation_timeout: Duration) -> Self {
        Self {
            store,
            slot_ttl,
            operation_timeout,
        }
    }

    fn key(subscriber_id: &str) -> String {
        format!("slots:{subscriber_id}")
    }

    /// Slots currently held by a subscriber. Zero when the store is unavailable.
    pub async fn active(&self, subscriber_id: &str) -> u32 {
        let key = Self::key(subscriber_id);
        match with_timeout("get", self.operation_timeout, self.store.get(&key)).await {
            Ok(count) => u32::try_from(count.max(0)).unwrap_or(u32::MAX),
            Err(e) => {
                warn!(subscriber_id = %subscriber_id, "Stream slot counter unavailable: {}", e);
                0
            }
        }
    }

    /// Best-effort TTL on a key whose increment may have landed unobserved
    fn spawn_bound_ttl(&self, key: String) {
        let store = self.store.clone();
        let ttl = self.slot_ttl;
        let timeout = self.operation_timeout;
        tokio::spawn(async move {
            if let Err(e) = with_timeout("expire", timeout, store.expire(&key, ttl)).await {
                debug!(key = %key, "Could not bound stream slot key after failed increment: {}", e);
            }
        });
    }

    /// Take a slot if the subscriber is below their plan's limit.
    ///
    /// Returns [`AppError::AdmissionDenied`] with the active count when the
    /// budget is exhausted. Store failures admit the request with an
    /// untracked reservation.
    pub async fn check_and_reserve(
        &self,
        subscriber_id: &str,
        entitlement: &Entitlement,
    ) -> AppResult<SlotReservation> {
        let key = Self::key(subscriber_id);
        let limit = entitlement.max_concurrent_streams;

        let count = match with_timeout("incr", self.operation_timeout, self.store.incr(&key)).await
        {
            Ok(count) => count,
            Err(e) => {
                warn!(
                    subscriber_id = %subscriber_id,
                    "Stream slot limiter unavailable, admitting request: {}",
                    e
                );
                self.spawn_bound_ttl(key);
                return Ok(SlotReservation::untracked());
            }
        };

        // Stores that do not track counts report zero
        if count <= 0 {
            return Ok(SlotReservation::untracked());
        }

        let reservation = SlotReservation {
            release: Some(SlotRelease {
                store: self.store.clone(),
                key: key.clone(),
                timeout: self.operation_timeout,
            }),
        };

        if count == 1
            && let Err(e) = with_timeout(
                "expire",
                self.operation_timeout,
                self.store.expire(&key, self.slot_ttl),
            )
            .await
        {
            warn!(
                subscriber_id = %subscriber_id,
                "Failed to set stream slot expiry, key persists until released: {}",
                e
            );
        }

        if count > i64::from(limit) {
            reservation.close().await;
            let active = u32::try_from(count - 1).unwrap_or(u32::MAX);
            debug!(
                subscriber_id = %subscriber_id,
                active,
                limit,
                plan = %entitlement.plan_slug,
                "Stream slot budget exhausted"
            );
            return Err(AppError::AdmissionDenied {
                active,
                limit,
                plan: entitlement.plan_slug.clone(),
            });
        }

        debug!(subscriber_id = %subscriber_id, active = count, limit, "Stream slot reserved");
        Ok(reservation)
    }
}

struct SlotRelease {
    store: Arc<dyn CounterStore>,
    key: String,
    timeout: Duration,
}

impl SlotRelease {
    /// Decrement, deleting the key once it reaches zero so it never goes negative
    async fn run(self) {
        match with_timeout("decr", self.timeout, self.store.decr(&self.key)).await {
            Ok(remaining) if remaining <= 0 => {
                if let Err(e) = with_timeout("del", self.timeout, self.store.del(&self.key)).await {
                    warn!(key = %self.key, "Failed to delete drained stream slot key: {}", e);
                }
            }
            Ok(_) => {}
            Err(e) => warn!(key = %self.key, "Failed to release stream slot: {}", e),
        }
    }
}

/// A held stream slot.
///
/// Call [`close`](Self::close) once the capability has been issued. Dropping
/// without closing (early return, error, cancelled request) releases the
/// slot from a spawned task instead.
#[must_use = "a reservation should be closed once the capability is issued"]
pub struct SlotReservation {
    release: Option<SlotRelease>,
}

impl SlotReservation {
    fn untracked() -> Self {
        Self { release: None }
    }

    /// Whether this reservation is counted in the store
    pub fn is_tracked(&self) -> bool {
        self.release.is_some()
    }

    /// Release the slot and wait for the store to confirm.
    ///
    /// The release runs on its own task, so it completes even if the caller
    /// is cancelled while waiting.
    pub async fn close(mut self) {
        if let Some(release) = self.release.take() {
            let key = release.key.clone();
            if let Err(e) = tokio::spawn(release.run()).await {
                warn!(key = %key, "Stream slot release task failed: {}", e);
            }
        }
    }
}

impl Drop for SlotReservation {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(release.run());
                }
                Err(_) => warn!(
                    key = %release.key,
                    "No runtime to release stream slot; it will expire with its TTL"
                ),
            }
        }
    }
}
