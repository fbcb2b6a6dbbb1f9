//! Cached aggregate views with generation-based invalidation.
//!
//! Each cached view depends on one or more data [`Dimension`]s. Every
//! committed mutation bumps the generation counter of the dimensions it
//! touched; a cached entry remembers the generations it was computed under
//! and is only served while all of its dependencies are unchanged.
//!
//! # Freshness
//!
//! | Step | Order |
//! |------|-------|
//! | Writer | commit to store → bump generation → drop matching entries |
//! | Reader | snapshot generations → compute from store → insert stamped entry |
//!
//! A reader that races a writer may insert an entry stamped with the old
//! generation, but that entry fails the freshness check on the next lookup,
//! so no view is served stale once the mutation has returned. Dropping the
//! matching entries only reclaims memory early; TTL and capacity bounds
//! still apply.

use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Data dimension a cached view can depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Locations,
    Sensors,
    Readings,
    Alerts,
}

impl Dimension {
    pub const ALL: [Self; 4] = [Self::Locations, Self::Sensors, Self::Readings, Self::Alerts];

    fn index(self) -> usize {
        match self {
            Self::Locations => 0,
            Self::Sensors => 1,
            Self::Readings => 2,
            Self::Alerts => 3,
        }
    }

    fn mask(dims: &[Self]) -> u8 {
        dims.iter().fold(0, |acc, d| acc | (1 << d.index()))
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Locations => "locations",
            Self::Sensors => "sensors",
            Self::Readings => "readings",
            Self::Alerts => "alerts",
        }
    }
}

type Generations = [u64; 4];

#[derive(Clone)]
struct CachedView<V> {
    value: V,
    deps: u8,
    stamp: Generations,
}

impl<V> CachedView<V> {
    fn is_fresh(&self, current: &Generations) -> bool {
        Dimension::ALL
            .iter()
            .filter(|d| self.deps & (1 << d.index()) != 0)
            .all(|d| self.stamp[d.index()] == current[d.index()])
    }
}

/// Build a cache key from a prefix and components.
///
/// Components are joined with `:` separator. Empty components are included
/// to ensure different queries produce different keys.
pub fn cache_key(prefix: &str, components: &[&str]) -> String {
    let mut key = prefix.to_string();
    for c in components {
        key.push(':');
        key.push_str(c);
    }
    key
}

#[derive(Clone)]
pub struct ViewCache<V> {
    entries: Cache<String, CachedView<V>>,
    generations: Arc<[AtomicU64; 4]>,
}

impl<V> ViewCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .support_invalidation_closures()
            .build();

        Self {
            entries,
            generations: Arc::new([
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
            ]),
        }
    }

    fn snapshot(&self) -> Generations {
        [
            self.generations[0].load(Ordering::SeqCst),
            self.generations[1].load(Ordering::SeqCst),
            self.generations[2].load(Ordering::SeqCst),
            self.generations[3].load(Ordering::SeqCst),
        ]
    }

    #[must_use]
    pub fn generation(&self, dim: Dimension) -> u64 {
        self.generations[dim.index()].load(Ordering::SeqCst)
    }

    /// Serve `key` from cache if none of `deps` changed since it was stored,
    /// otherwise recompute it with `compute` and cache the result.
    pub async fn get_or_compute<F>(&self, key: String, deps: &[Dimension], compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        let current = self.snapshot();
        if let Some(cached) = self.entries.get(&key).await {
            if cached.is_fresh(&current) {
                tracing::debug!(cache_key = %key, "cache_hit");
                return cached.value;
            }
            tracing::debug!(cache_key = %key, "cache_stale");
        }

        let value = compute();
        self.entries
            .insert(
                key.clone(),
                CachedView {
                    value: value.clone(),
                    deps: Dimension::mask(deps),
                    stamp: current,
                },
            )
            .await;
        tracing::debug!(cache_key = %key, "cache_stored");
        value
    }

    /// Mark every view depending on any of `dims` as stale.
    pub fn invalidate(&self, dims: &[Dimension]) {
        if dims.is_empty() {
            return;
        }
        for dim in dims {
            self.generations[dim.index()].fetch_add(1, Ordering::SeqCst);
        }

        let mask = Dimension::mask(dims);
        if let Err(e) = self
            .entries
            .invalidate_entries_if(move |_key, view| view.deps & mask != 0)
        {
            tracing::warn!(error = %e, "cache_invalidation_predicate_rejected");
        }
        tracing::debug!(
            dimensions = ?dims.iter().map(|d| d.as_str()).collect::<Vec<_>>(),
            "cache_invalidated"
        );
    }

    /// Drop a single cached view.
    pub async fn invalidate_key(&self, key: &str) {
        self.entries.invalidate(key).await;
        tracing::debug!(cache_key = %key, "cache_invalidated");
    }
}
