//! In-process TTL cache for hot reads.
//!
//! Entries expire after `ttl` without access (sliding expiry). Suppliers are
//! remembered per key so entries can be refreshed, and entries registered with
//! `auto_refresh` are re-supplied by [`CacheProvider::refresh_all`] once evicted.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::metrics::{CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL};
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt};
use moka::{future::Cache, Expiry};
use tracing::{debug, warn};

use crate::errors::ServiceError;

type AnyValue = Arc<dyn Any + Send + Sync>;
type Supplier = Arc<dyn Fn() -> BoxFuture<'static, Result<AnyValue, ServiceError>> + Send + Sync>;

#[derive(Clone)]
struct CachedValue {
    value: AnyValue,
    ttl: Duration,
}

#[derive(Clone)]
struct Registration {
    ttl: Duration,
    supplier: Supplier,
    auto_refresh: bool,
}

struct SlidingExpiry;

impl Expiry<String, CachedValue> for SlidingExpiry {
    fn expire_after_create(&self, _key: &String, value: &CachedValue, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_read(
        &self,
        _key: &String,
        value: &CachedValue,
        _read_at: Instant,
        _duration_until_expiry: Option<Duration>,
        _last_modified_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEntryType {
    Default,
    Announcement,
    Award,
    AwardAssignment,
    Claims,
    Enrollment,
    Hackathon,
    HackathonAdmin,
    Judge,
    Organizer,
    Questionnaire,
    RatingKind,
    Team,
    TeamMember,
    TeamWork,
    Token,
    User,
}

impl CacheEntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "Default",
            Self::Announcement => "Announcement",
            Self::Award => "Award",
            Self::AwardAssignment => "AwardAssignment",
            Self::Claims => "Claims",
            Self::Enrollment => "Enrollment",
            Self::Hackathon => "Hackathon",
            Self::HackathonAdmin => "HackathonAdmin",
            Self::Judge => "Judge",
            Self::Organizer => "Organizer",
            Self::Questionnaire => "Questionnaire",
            Self::RatingKind => "RatingKind",
            Self::Team => "Team",
            Self::TeamMember => "TeamMember",
            Self::TeamWork => "TeamWork",
            Self::Token => "Token",
            Self::User => "User",
        }
    }
}

pub fn cache_key(entry_type: CacheEntryType, sub_key: &str) -> String {
    format!("{}-{}", entry_type.as_str(), sub_key)
}

pub struct CacheProvider {
    cache: Cache<String, CachedValue>,
    registry: DashMap<String, Registration>,
    enabled: bool,
}

impl Default for CacheProvider {
    fn default() -> Self { Self::new(true) }
}

impl CacheProvider {
    pub fn new(enabled: bool) -> Self {
        let cache = Cache::builder().max_capacity(100_000).expire_after(SlidingExpiry).build();
        Self { cache, registry: DashMap::new(), enabled }
    }

    pub fn from_config(cfg: &configs::CacheConfig) -> Self { Self::new(cfg.enabled) }

    pub fn is_enabled(&self) -> bool { self.enabled }

    /// Cached value for `key`, or the supplier's value which is then cached.
    ///
    /// # Examples
    /// ```
    /// use std::time::Duration;
    /// use service::cache::CacheProvider;
    /// let cache = CacheProvider::new(true);
    /// let v: i32 = tokio_test::block_on(cache.get_or_add("k", Duration::from_secs(60), || async { Ok(7) }, false)).unwrap();
    /// assert_eq!(v, 7);
    /// ```
    pub async fn get_or_add<T, F, Fut>(&self, key: &str, ttl: Duration, supplier: F, auto_refresh: bool) -> Result<T, ServiceError>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ServiceError>> + Send + 'static,
    {
        if !self.enabled {
            return supplier().await;
        }
        if let Some(hit) = self.lookup::<T>(key).await {
            return Ok(hit);
        }
        CACHE_MISSES_TOTAL.inc();
        let supplier = Arc::new(supplier);
        let value = supplier().await?;
        let erased: Supplier = Arc::new(move || {
            let supplier = Arc::clone(&supplier);
            async move { supplier().await.map(|v| Arc::new(v) as AnyValue) }.boxed()
        });
        self.registry.insert(key.to_string(), Registration { ttl, supplier: erased, auto_refresh });
        self.cache.insert(key.to_string(), CachedValue { value: Arc::new(value.clone()), ttl }).await;
        Ok(value)
    }

    /// Like [`get_or_add`](Self::get_or_add) but only `Some` values are cached.
    pub async fn get_or_add_opt<T, F, Fut>(&self, key: &str, ttl: Duration, supplier: F) -> Result<Option<T>, ServiceError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<Option<T>, ServiceError>> + Send,
    {
        if !self.enabled {
            return supplier().await;
        }
        if let Some(hit) = self.lookup::<T>(key).await {
            return Ok(Some(hit));
        }
        CACHE_MISSES_TOTAL.inc();
        let value = supplier().await?;
        if let Some(v) = &value {
            self.cache.insert(key.to_string(), CachedValue { value: Arc::new(v.clone()), ttl }).await;
        }
        Ok(value)
    }

    async fn lookup<T: Clone + 'static>(&self, key: &str) -> Option<T> {
        let hit = self.cache.get(key).await?;
        match hit.value.downcast_ref::<T>() {
            Some(v) => {
                CACHE_HITS_TOTAL.inc();
                Some(v.clone())
            }
            None => {
                warn!(key = %key, "cache_type_mismatch");
                None
            }
        }
    }

    pub async fn remove(&self, key: &str) {
        self.cache.invalidate(key).await;
    }

    /// Re-run the registered supplier of `key`. Unknown keys are ignored.
    pub async fn refresh(&self, key: &str) -> Result<(), ServiceError> {
        let Some(reg) = self.registry.get(key).map(|r| r.clone()) else {
            return Ok(());
        };
        self.supply(key, reg).await
    }

    /// Re-supply every auto-refresh entry that is no longer cached.
    pub async fn refresh_all(&self) -> Result<usize, ServiceError> {
        let pending: Vec<(String, Registration)> = self
            .registry
            .iter()
            .filter(|r| r.auto_refresh && !self.cache.contains_key(r.key()))
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();
        let count = pending.len();
        for (key, reg) in pending {
            self.supply(&key, reg).await?;
        }
        debug!(count, "cache_refreshed");
        Ok(count)
    }

    async fn supply(&self, key: &str, reg: Registration) -> Result<(), ServiceError> {
        let value = (reg.supplier)().await?;
        self.cache.insert(key.to_string(), CachedValue { value, ttl: reg.ttl }).await;
        Ok(())
    }

    pub async fn count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_supplier(calls: Arc<AtomicUsize>) -> impl Fn() -> BoxFuture<'static, Result<usize, ServiceError>> + Send + Sync {
        move || {
            let calls = Arc::clone(&calls);
            async move { Ok(calls.fetch_add(1, Ordering::SeqCst) + 1) }.boxed()
        }
    }

    #[tokio::test]
    async fn caches_supplied_values() -> anyhow::Result<()> {
        let cache = CacheProvider::new(true);
        let calls = Arc::new(AtomicUsize::new(0));
        let ttl = Duration::from_secs(60);
        let a = cache.get_or_add("k", ttl, counting_supplier(calls.clone()), false).await?;
        let b = cache.get_or_add("k", ttl, counting_supplier(calls.clone()), false).await?;
        assert_eq!((a, b), (1, 1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.count().await, 1);

        cache.remove("k").await;
        let c = cache.get_or_add("k", ttl, counting_supplier(calls.clone()), false).await?;
        assert_eq!(c, 2);
        Ok(())
    }

    #[tokio::test]
    async fn disabled_cache_always_supplies() -> anyhow::Result<()> {
        let cache = CacheProvider::new(false);
        let calls = Arc::new(AtomicUsize::new(0));
        let ttl = Duration::from_secs(60);
        cache.get_or_add("k", ttl, counting_supplier(calls.clone()), false).await?;
        cache.get_or_add("k", ttl, counting_supplier(calls.clone()), false).await?;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.count().await, 0);
        Ok(())
    }

    #[tokio::test]
    async fn supplier_errors_are_not_cached() -> anyhow::Result<()> {
        let cache = CacheProvider::new(true);
        let res: Result<i32, _> = cache
            .get_or_add("bad", Duration::from_secs(60), || async { Err(ServiceError::Upstream("down".into())) }, true)
            .await;
        assert!(res.is_err());
        assert_eq!(cache.count().await, 0);
        Ok(())
    }

    #[tokio::test]
    async fn optional_values_cache_only_some() -> anyhow::Result<()> {
        let cache = CacheProvider::new(true);
        let ttl = Duration::from_secs(60);
        let none: Option<String> = cache.get_or_add_opt("o", ttl, || async { Ok(None) }).await?;
        assert!(none.is_none());
        assert_eq!(cache.count().await, 0);
        let some = cache.get_or_add_opt("o", ttl, || async { Ok(Some("v".to_string())) }).await?;
        assert_eq!(some.as_deref(), Some("v"));
        let again: Option<String> = cache.get_or_add_opt("o", ttl, || async { Ok(None) }).await?;
        assert_eq!(again.as_deref(), Some("v"));
        Ok(())
    }

    #[tokio::test]
    async fn refresh_reruns_registered_supplier() -> anyhow::Result<()> {
        let cache = CacheProvider::new(true);
        let calls = Arc::new(AtomicUsize::new(0));
        let ttl = Duration::from_secs(60);
        cache.get_or_add("auto", ttl, counting_supplier(calls.clone()), true).await?;
        cache.refresh("auto").await?;
        let v: usize = cache.get_or_add("auto", ttl, counting_supplier(calls.clone()), true).await?;
        assert_eq!(v, 2);

        cache.remove("auto").await;
        assert_eq!(cache.refresh_all().await?, 1);
        let v: usize = cache.get_or_add("auto", ttl, counting_supplier(calls.clone()), true).await?;
        assert_eq!(v, 3);
        Ok(())
    }

    #[test]
    fn keys_are_prefixed_by_type() {
        assert_eq!(cache_key(CacheEntryType::HackathonAdmin, "hack"), "HackathonAdmin-hack");
    }
}
