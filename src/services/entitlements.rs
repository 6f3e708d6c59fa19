//! Entitlement resolution
//!
//! [`EntitlementResolver`] is a pure lookup from plan slug to limits and
//! features. [`EntitlementService`] puts a bounded TTL cache of
//! subscriber -> plan in front of the subscription table, since the lookup sits
//! on every playback request.

use chrono::Duration as ChronoDuration;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

use crate::database::repositories::CredentialSeaOrmRepository;
use crate::errors::AppResult;
use crate::models::{Entitlement, Feature};
use crate::utils::SharedClock;

/// Plan used for unknown or empty slugs. It is also the most restrictive tier.
pub const DEFAULT_PLAN: &str = "basic";

struct PlanTier {
    slug: &'static str,
    max_concurrent_streams: u32,
    features: &'static [Feature],
}

const PLAN_TIERS: &[PlanTier] = &[
    PlanTier {
        slug: "basic",
        max_concurrent_streams: 1,
        features: &[Feature::Live],
    },
    PlanTier {
        slug: "standard",
        max_concurrent_streams: 2,
        features: &[Feature::Live, Feature::Epg, Feature::Hd],
    },
    PlanTier {
        slug: "premium",
        max_concurrent_streams: 4,
        features: &[Feature::Live, Feature::Epg, Feature::Hd, Feature::Uhd],
    },
];

/// Stateless plan lookup. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntitlementResolver;

impl EntitlementResolver {
    pub fn resolve(&self, plan_slug: &str) -> Entitlement {
        let wanted = plan_slug.trim();
        let tier = PLAN_TIERS
            .iter()
            .find(|tier| tier.slug.eq_ignore_ascii_case(wanted))
            .unwrap_or_else(|| {
                if !wanted.is_empty() {
                    debug!("Unknown plan '{}', using '{}'", wanted, DEFAULT_PLAN);
                }
                Self::default_tier()
            });

        Entitlement {
            plan_slug: tier.slug.to_string(),
            max_concurrent_streams: tier.max_concurrent_streams,
            features: tier.features.to_vec(),
        }
    }

    pub fn default_entitlement(&self) -> Entitlement {
        self.resolve(DEFAULT_PLAN)
    }

    fn default_tier() -> &'static PlanTier {
        &PLAN_TIERS[0]
    }
}

struct CachedPlan {
    plan_slug: String,
    cached_at: chrono::DateTime<chrono::Utc>,
}

/// Bounded subscriber -> plan slug cache with a fixed TTL.
///
/// The lock is a std mutex and is never held across an await.
pub struct PlanCache {
    entries: Mutex<LruCache<String, CachedPlan>>,
    ttl: ChronoDuration,
    clock: SharedClock,
}

impl PlanCache {
    pub fn new(capacity: usize, ttl: Duration, clock: SharedClock) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl: ChronoDuration::from_std(ttl).unwrap_or(ChronoDuration::zero()),
            clock,
        }
    }

    pub fn get(&self, subscriber_id: &str) -> Option<String> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().ok()?;
        let fresh = entries
            .get(subscriber_id)
            .filter(|entry| now - entry.cached_at < self.ttl)
            .map(|entry| entry.plan_slug.clone());
        if fresh.is_none() {
            entries.pop(subscriber_id);
        }
        fresh
    }

    pub fn insert(&self, subscriber_id: &str, plan_slug: &str) {
        let now = self.clock.now();
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(
                subscriber_id.to_string(),
                CachedPlan {
                    plan_slug: plan_slug.to_string(),
                    cached_at: now,
                },
            );
        }
    }

    pub fn invalidate(&self, subscriber_id: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.pop(subscriber_id);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Entitlements for subscribers, read through the plan cache
#[derive(Clone)]
pub struct EntitlementService {
    resolver: EntitlementResolver,
    credentials: CredentialSeaOrmRepository,
    cache: Arc<PlanCache>,
    clock: SharedClock,
}

impl EntitlementService {
    pub fn new(
        credentials: CredentialSeaOrmRepository,
        cache: Arc<PlanCache>,
        clock: SharedClock,
    ) -> Self {
        Self {
            resolver: EntitlementResolver,
            credentials,
            cache,
            clock,
        }
    }

    pub fn resolver(&self) -> EntitlementResolver {
        self.resolver
    }

    /// Current entitlement for a subscriber.
    ///
    /// A missing or lapsed subscription resolves to the default plan rather
    /// than an error; only a database failure is surfaced.
    pub async fn for_subscriber(&self, subscriber_id: &str) -> AppResult<Entitlement> {
        if let Some(plan_slug) = self.cache.get(subscriber_id) {
            return Ok(self.resolver.resolve(&plan_slug));
        }

        let now = self.clock.now();
        let plan_slug = match self.credentials.find_subscription(subscriber_id).await? {
            Some(subscription) if subscription.is_active_at(now) => subscription.plan_slug,
            Some(subscription) => {
                warn!(
                    subscriber_id = %subscriber_id,
                    status = %subscription.status,
                    "Subscription not active, applying default plan"
                );
                DEFAULT_PLAN.to_string()
            }
            None => DEFAULT_PLAN.to_string(),
        };

        self.cache.insert(subscriber_id, &plan_slug);
        Ok(self.resolver.resolve(&plan_slug))
    }

    /// Drop a cached plan after a known billing change
    pub fn invalidate(&self, subscriber_id: &str) {
        self.cache.invalidate(subscriber_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::models::Subscription;
    use crate::utils::ManualClock;
    use chrono::Utc;
    use rstest::rstest;

    #[rstest]
    #[case("basic", 1, false)]
    #[case("standard", 2, true)]
    #[case("PREMIUM", 4, true)]
    #[case("", 1, false)]
    #[case("enterprise-gold", 1, false)]
    fn resolves_plans(#[case] slug: &str, #[case] streams: u32, #[case] epg: bool) {
        let entitlement = EntitlementResolver.resolve(slug);
        assert_eq!(entitlement.max_concurrent_streams, streams);
        assert_eq!(entitlement.allows(Feature::Epg), epg);
        assert!(entitlement.allows(Feature::Live));
    }

    #[test]
    fn default_is_most_restrictive() {
        let default = EntitlementResolver.default_entitlement();
        for tier in PLAN_TIERS {
            assert!(default.max_concurrent_streams <= tier.max_concurrent_streams);
            assert!(default.features.len() <= tier.features.len());
        }
    }

    #[test]
    fn plan_cache_expires_entries() {
        let clock = ManualClock::new(Utc::now());
        let cache = PlanCache::new(10, Duration::from_secs(60), Arc::new(clock.clone()));

        cache.insert("sub-1", "premium");
        assert_eq!(cache.get("sub-1").as_deref(), Some("premium"));

        clock.advance(ChronoDuration::seconds(61));
        assert!(cache.get("sub-1").is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn lapsed_subscription_falls_back_to_default_plan() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = CredentialSeaOrmRepository::new(db.connection());
        let clock = ManualClock::new(Utc::now());
        let shared: SharedClock = Arc::new(clock.clone());
        let service = EntitlementService::new(
            repo.clone(),
            Arc::new(PlanCache::new(10, Duration::from_secs(60), shared.clone())),
            shared,
        );

        repo.upsert_subscription(
            &Subscription {
                subscriber_id: "sub-1".into(),
                plan_slug: "premium".into(),
                status: "past_due".into(),
                current_period_end: None,
            },
            Utc::now(),
        )
        .await
        .unwrap();

        let entitlement = service.for_subscriber("sub-1").await.unwrap();
        assert_eq!(entitlement.plan_slug, DEFAULT_PLAN);

        let unknown = service.for_subscriber("nobody").await.unwrap();
        assert_eq!(unknown.plan_slug, DEFAULT_PLAN);
    }
}
