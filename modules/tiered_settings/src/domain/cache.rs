//! Per-group resolver cache
//!
//! Resolves a group from the live snapshot once per generation and hands out
//! the cached `Arc` until the snapshot is replaced.

use crate::contract::{SettingsError, SettingsGroup};
use crate::domain::live::{ChangeSignal, Generation, LiveSettings};
use crate::domain::tree::{AnyGroup, SettingsTree};
use parking_lot::RwLock;
use std::any::type_name;
use std::sync::Arc;

struct CachedGroup {
    generation: u64,
    value: AnyGroup,
}

/// A resolved group together with the signal of the snapshot it came from.
#[derive(Debug)]
pub struct WatchedGroup<C> {
    pub value: Arc<C>,
    pub signal: ChangeSignal,
}

impl<C> WatchedGroup<C> {
    /// `true` once a newer snapshot replaced the one `value` came from.
    pub fn is_stale(&self) -> bool {
        self.signal.has_changed()
    }
}

pub struct GroupResolverCache<S: SettingsGroup> {
    live: Arc<LiveSettings<S>>,
    tree: Arc<SettingsTree<S>>,
    slots: Vec<RwLock<Option<CachedGroup>>>,
}

impl<S: SettingsGroup> GroupResolverCache<S> {
    pub fn new(live: Arc<LiveSettings<S>>, tree: Arc<SettingsTree<S>>) -> Self {
        let slots = (0..tree.group_count()).map(|_| RwLock::new(None)).collect();
        Self { live, tree, slots }
    }

    /// Current instance of the only `C` in the tree.
    pub fn get<C: SettingsGroup>(&self) -> Result<Arc<C>, SettingsError> {
        self.watch::<C>().map(|watched| watched.value)
    }

    /// Current instance of the `C` at a dotted path.
    pub fn get_at<C: SettingsGroup>(&self, path: &str) -> Result<Arc<C>, SettingsError> {
        self.watch_at::<C>(path).map(|watched| watched.value)
    }

    pub fn watch<C: SettingsGroup>(&self) -> Result<WatchedGroup<C>, SettingsError> {
        let node = self.tree.node_of::<C>()?;
        self.resolve(node)
    }

    pub fn watch_at<C: SettingsGroup>(&self, path: &str) -> Result<WatchedGroup<C>, SettingsError> {
        let node = self.tree.node_at::<C>(path)?;
        self.resolve(node)
    }

    /// Drop cached instances older than the current generation.
    pub fn evict_stale(&self) {
        let current = self.live.generation();
        for slot in &self.slots {
            let mut cached = slot.write();
            if cached.as_ref().is_some_and(|c| c.generation < current) {
                *cached = None;
            }
        }
    }

    fn resolve<C: SettingsGroup>(&self, node: usize) -> Result<WatchedGroup<C>, SettingsError> {
        let snapshot = self.live.snapshot();
        let value = self
            .cached_or_resolve(node, &snapshot)?
            .downcast::<C>()
            .map_err(|_| SettingsError::internal(format!("cached group is not a `{}`", type_name::<C>())))?;
        Ok(WatchedGroup {
            value,
            signal: snapshot.signal().clone(),
        })
    }

    fn cached_or_resolve(&self, node: usize, snapshot: &Generation<S>) -> Result<AnyGroup, SettingsError> {
        let generation = snapshot.generation();
        let slot = &self.slots[node];

        if let Some(cached) = slot.read().as_ref().filter(|c| c.generation == generation) {
            return Ok(Arc::clone(&cached.value));
        }

        let mut cached = slot.write();
        if let Some(hit) = cached.as_ref().filter(|c| c.generation == generation) {
            return Ok(Arc::clone(&hit.value));
        }

        let value = self
            .tree
            .project(node, snapshot.settings().root())
            .ok_or_else(|| SettingsError::internal("group position missing from resolved settings"))?;
        if cached.as_ref().map_or(true, |c| c.generation < generation) {
            *cached = Some(CachedGroup {
                generation,
                value: Arc::clone(&value),
            });
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{Coordinate, ResolvedSettings};
    use crate::domain::{GroupBuilder, Setting, SettingsFactory};

    crate::dimension! {
        enum Tier { Local }
    }

    crate::dimension! {
        enum DataCenter { Local }
    }

    #[derive(Default)]
    struct Pool {
        size: u32,
    }

    impl SettingsGroup for Pool {
        type Tier = Tier;
        type DataCenter = DataCenter;

        fn describe(group: &mut GroupBuilder<Self>) {
            group.setting("Size", |p| &mut p.size, Setting::new(4));
        }
    }

    #[derive(Default)]
    struct Service {
        pool: Arc<Pool>,
    }

    impl SettingsGroup for Service {
        type Tier = Tier;
        type DataCenter = DataCenter;

        fn describe(group: &mut GroupBuilder<Self>) {
            group.group("Pool", |s| &s.pool, |s| &mut s.pool);
        }
    }

    fn resolved(factory: &SettingsFactory<Service>, commit: &str) -> ResolvedSettings<Service> {
        factory
            .materialize(&Coordinate::new("Tests", Tier::Local, DataCenter::Local), commit, &[])
            .unwrap()
    }

    fn cache_for(factory: &SettingsFactory<Service>) -> (Arc<LiveSettings<Service>>, GroupResolverCache<Service>) {
        let live = Arc::new(LiveSettings::new(resolved(factory, "c0")));
        let cache = GroupResolverCache::new(Arc::clone(&live), Arc::clone(factory.tree()));
        (live, cache)
    }

    fn get_from_threads(cache: &GroupResolverCache<Service>) -> Vec<Arc<Pool>> {
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| (0..50).map(|_| cache.get::<Pool>().unwrap()).collect::<Vec<_>>()))
                .collect();
            handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
        })
    }

    #[test]
    fn test_concurrent_gets_share_one_instance() {
        let factory = SettingsFactory::<Service>::new().unwrap();
        let (live, cache) = cache_for(&factory);

        let seen = get_from_threads(&cache);
        assert_eq!(seen.len(), 400);
        let current = live.current();
        assert!(seen.iter().all(|pool| Arc::ptr_eq(pool, &current.pool)));
        assert_eq!(seen[0].size, 4);
    }

    #[test]
    fn test_new_generation_replaces_cached_instance() {
        let factory = SettingsFactory::<Service>::new().unwrap();
        let (live, cache) = cache_for(&factory);
        let watched = cache.watch::<Pool>().unwrap();
        assert!(!watched.is_stale());

        live.update(resolved(&factory, "c1"));
        cache.evict_stale();
        assert!(watched.is_stale());

        let seen = get_from_threads(&cache);
        let current = live.current();
        assert!(seen.iter().all(|pool| Arc::ptr_eq(pool, &current.pool)));
        assert!(!Arc::ptr_eq(&seen[0], &watched.value));
    }
}
