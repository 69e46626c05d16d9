use moka::future::Cache;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use strum_macros::{AsRefStr, Display};

/// Cached collections. Each mutation names the resources it invalidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Resource {
    Registrations,
    SubAdmins,
    Dashboard,
}

impl Resource {
    const COUNT: usize = 3;

    fn slot(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub resource: Resource,
    /// Normalised query parameters of the request.
    pub query: String,
}

impl CacheKey {
    pub fn new(resource: Resource, query: impl Into<String>) -> Self {
        Self {
            resource,
            query: query.into(),
        }
    }
}

/// Read-through cache for list and dashboard responses.
///
/// Entries expire after the TTL; writes invalidate every entry of the
/// affected resources before the response is sent.
///
/// Each resource carries a generation that every invalidation bumps. A
/// reader snapshots it before querying and hands it back to [`insert`],
/// so a result computed before a write is never stored after it.
///
/// [`insert`]: QueryCache::insert
#[derive(Clone)]
pub struct QueryCache {
    inner: Cache<CacheKey, Arc<Value>>,
    generations: Arc<[AtomicU64; Resource::COUNT]>,
}

impl QueryCache {
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(ttl)
                .support_invalidation_closures()
                .build(),
            generations: Arc::default(),
        }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Arc<Value>> {
        self.inner.get(key).await
    }

    /// Current generation of `resource`; take it before reading the database.
    pub fn generation(&self, resource: Resource) -> u64 {
        self.generations[resource.slot()].load(Ordering::SeqCst)
    }

    /// Stores `value` unless `resource` was invalidated since `seen` was taken.
    /// The value is returned either way so the caller can still respond with it.
    pub async fn insert(&self, key: CacheKey, value: Value, seen: u64) -> Arc<Value> {
        let value = Arc::new(value);
        let resource = key.resource;

        if self.generation(resource) != seen {
            tracing::debug!(resource = %resource, "Skipping cache fill after invalidation");
            return value;
        }

        self.inner.insert(key.clone(), value.clone()).await;

        // a write may have landed between the check and the insert
        if self.generation(resource) != seen {
            self.inner.invalidate(&key).await;
        }
        value
    }

    pub fn invalidate(&self, resources: &[Resource]) {
        for resource in resources {
            self.generations[resource.slot()].fetch_add(1, Ordering::SeqCst);
        }

        let resources = resources.to_vec();
        let names: Vec<&str> = resources.iter().map(|r| r.as_ref()).collect();
        tracing::debug!(resources = ?names, "Invalidating cached queries");

        if let Err(e) = self
            .inner
            .invalidate_entries_if(move |key, _| resources.contains(&key.resource))
        {
            // closures are enabled in the builder; fall back to a full flush anyway
            tracing::warn!(error = %e, "Predicate invalidation rejected, flushing cache");
            self.inner.invalidate_all();
        }
    }

    #[cfg(test)]
    async fn settle(&self) {
        self.inner.run_pending_tasks().await;
    }
}

/// Registration writes change the list and the dashboard figures.
pub const REGISTRATION_WRITE: &[Resource] = &[Resource::Registrations, Resource::Dashboard];
/// Staff writes change the sub-admin list and the active employee KPI.
pub const SUB_ADMIN_WRITE: &[Resource] = &[Resource::SubAdmins, Resource::Dashboard];
/// A login moves the "logins today" KPI.
pub const LOGIN_EVENT: &[Resource] = &[Resource::Dashboard];

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cache() -> QueryCache {
        QueryCache::new(100, Duration::from_secs(60))
    }

    #[actix_web::test]
    async fn returns_what_was_inserted() {
        let cache = cache();
        let key = CacheKey::new(Resource::Registrations, "page=1");

        assert!(cache.get(&key).await.is_none());
        let seen = cache.generation(Resource::Registrations);
        cache.insert(key.clone(), json!({"total": 3}), seen).await;

        assert_eq!(*cache.get(&key).await.unwrap(), json!({"total": 3}));
    }

    #[actix_web::test]
    async fn invalidation_only_touches_named_resources() {
        let cache = cache();
        let list = CacheKey::new(Resource::Registrations, "page=1");
        let dashboard = CacheKey::new(Resource::Dashboard, "");
        let staff = CacheKey::new(Resource::SubAdmins, "");

        for key in [&list, &dashboard, &staff] {
            let seen = cache.generation(key.resource);
            cache.insert(key.clone(), json!([]), seen).await;
        }

        cache.invalidate(REGISTRATION_WRITE);
        cache.settle().await;

        assert!(cache.get(&list).await.is_none());
        assert!(cache.get(&dashboard).await.is_none());
        assert!(cache.get(&staff).await.is_some());
    }

    #[actix_web::test]
    async fn result_read_before_a_write_is_not_stored_after_it() {
        let cache = cache();
        let key = CacheKey::new(Resource::Registrations, "page=1");

        // reader misses and starts its query
        let seen = cache.generation(Resource::Registrations);
        // a registration is created while the query is in flight
        cache.invalidate(REGISTRATION_WRITE);
        cache.settle().await;

        let stale = cache.insert(key.clone(), json!({"total": 3}), seen).await;
        cache.settle().await;

        assert_eq!(*stale, json!({"total": 3}));
        assert!(cache.get(&key).await.is_none());

        // the next reader repopulates normally
        let fresh = cache.generation(Resource::Registrations);
        assert_ne!(fresh, seen);
        cache.insert(key.clone(), json!({"total": 4}), fresh).await;
        assert_eq!(*cache.get(&key).await.unwrap(), json!({"total": 4}));
    }

    #[actix_web::test]
    async fn unrelated_writes_do_not_block_fills() {
        let cache = cache();
        let key = CacheKey::new(Resource::SubAdmins, "all");

        let seen = cache.generation(Resource::SubAdmins);
        cache.invalidate(REGISTRATION_WRITE);
        cache.insert(key.clone(), json!([]), seen).await;

        assert!(cache.get(&key).await.is_some());
    }

    #[test]
    fn resource_names_are_snake_case() {
        assert_eq!(Resource::SubAdmins.as_ref(), "sub_admins");
    }
}
