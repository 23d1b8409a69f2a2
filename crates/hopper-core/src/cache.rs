//! Location-keyed cache of loaded hoppers, backed by a durable store.
//!
//! All mutation goes through [`HopperCache::put`], [`HopperCache::update`],
//! and [`HopperCache::remove`], each of which takes the write lock once, so
//! readers on other threads never observe a half-applied change.

use crate::error::HopperError;
use crate::fixed::Millis;
use crate::hopper::HopperEntity;
use crate::id::{Location, RegionId};
use crate::persist::Codec;
use crate::store::HopperStore;
use parking_lot::RwLock;
use std::collections::BTreeMap;

#[derive(Debug)]
pub struct HopperCache {
    entries: RwLock<BTreeMap<Location, HopperEntity>>,
    store: Box<dyn HopperStore>,
}

impl HopperCache {
    pub fn new(store: impl HopperStore + 'static) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            store: Box::new(store),
        }
    }

    pub fn store(&self) -> &dyn HopperStore {
        self.store.as_ref()
    }

    // -- in-memory access ---------------------------------------------------

    /// A snapshot of the hopper at `location`.
    pub fn get(&self, location: Location) -> Option<HopperEntity> {
        self.entries.read().get(&location).cloned()
    }

    /// Read the hopper at `location` without cloning it.
    pub fn with<R>(&self, location: Location, f: impl FnOnce(&HopperEntity) -> R) -> Option<R> {
        self.entries.read().get(&location).map(f)
    }

    /// Mutate the hopper at `location` in place under the write lock.
    pub fn update<R>(
        &self,
        location: Location,
        f: impl FnOnce(&mut HopperEntity) -> R,
    ) -> Option<R> {
        self.entries.write().get_mut(&location).map(f)
    }

    /// Insert or replace, keyed by the entity's own location.
    pub fn put(&self, hopper: HopperEntity) -> Option<HopperEntity> {
        self.entries.write().insert(hopper.location(), hopper)
    }

    pub fn remove(&self, location: Location) -> Option<HopperEntity> {
        self.entries.write().remove(&location)
    }

    pub fn contains(&self, location: Location) -> bool {
        self.entries.read().contains_key(&location)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Every cached location, in location order.
    pub fn locations(&self) -> Vec<Location> {
        self.entries.read().keys().copied().collect()
    }

    pub fn locations_in_region(&self, region: RegionId) -> Vec<Location> {
        self.entries
            .read()
            .keys()
            .copied()
            .filter(|loc| loc.region() == region)
            .collect()
    }

    /// A consistent copy of every cached hopper.
    pub fn snapshot(&self) -> Vec<HopperEntity> {
        self.entries.read().values().cloned().collect()
    }

    // -- store-backed lifecycle ---------------------------------------------

    /// Write the cached hopper at `location` through to the store.
    pub fn save(&self, location: Location, codec: &Codec<'_>) -> Result<(), HopperError> {
        let record = {
            let entries = self.entries.read();
            let hopper = entries.get(&location).ok_or(HopperError::EntityNotFound(location))?;
            codec.encode_bytes(hopper).map_err(crate::store::StoreError::from)?
        };
        self.store.save(location, &record).inspect_err(|error| {
            tracing::warn!(%location, %error, "failed to save hopper");
        })?;
        Ok(())
    }

    /// Remove a hopper from both the cache and the store.
    pub fn delete(&self, location: Location) -> Result<Option<HopperEntity>, HopperError> {
        self.store.delete(location).inspect_err(|error| {
            tracing::warn!(%location, %error, "failed to delete hopper record");
        })?;
        Ok(self.remove(location))
    }

    /// Load every stored hopper in `region`. Undecodable records fail the
    /// whole load. Returns how many hoppers were cached.
    pub fn load_region(
        &self,
        region: RegionId,
        codec: &Codec<'_>,
        now: Millis,
    ) -> Result<usize, HopperError> {
        let records = self.store.load_region(region).inspect_err(|error| {
            tracing::warn!(?region, %error, "failed to load region");
        })?;

        let mut loaded = Vec::with_capacity(records.len());
        for bytes in &records {
            let decoded = codec
                .decode_bytes(bytes, now)
                .map_err(crate::store::StoreError::from)?;
            if let Some(hopper) = decoded {
                loaded.push(hopper);
            }
        }

        let count = loaded.len();
        let mut entries = self.entries.write();
        for hopper in loaded {
            entries.insert(hopper.location(), hopper);
        }
        tracing::debug!(?region, count, "region hoppers loaded");
        Ok(count)
    }

    /// Save and evict every cached hopper in `region`. If any save fails,
    /// nothing is evicted. Returns how many hoppers were evicted.
    pub fn unload_region(&self, region: RegionId, codec: &Codec<'_>) -> Result<usize, HopperError> {
        let locations = self.locations_in_region(region);
        for location in &locations {
            self.save(*location, codec)?;
        }
        let mut entries = self.entries.write();
        for location in &locations {
            entries.remove(location);
        }
        tracing::debug!(?region, count = locations.len(), "region hoppers unloaded");
        Ok(locations.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::test_utils::*;
    use std::sync::Arc;

    #[test]
    fn put_get_remove() {
        let cache = HopperCache::new(MemoryStore::new());
        let hopper = HopperEntity::new(loc(0, 64, 0), None, &test_starting(), 0);
        assert!(cache.put(hopper.clone()).is_none());
        assert_eq!(cache.get(loc(0, 64, 0)), Some(hopper));
        assert_eq!(cache.update(loc(0, 64, 0), |h| h.toggle_enabled()), Some(false));
        assert_eq!(cache.with(loc(0, 64, 0), |h| h.is_enabled()), Some(false));
        assert!(cache.remove(loc(0, 64, 0)).is_some());
        assert!(cache.is_empty());
        assert!(cache.update(loc(0, 64, 0), |h| h.toggle_enabled()).is_none());
    }

    #[test]
    fn unload_then_load_restores_configuration() {
        let registry = test_registry();
        let starting = test_starting();
        let codec = Codec::new(&registry, &starting);
        let store = Arc::new(MemoryStore::new());
        let cache = HopperCache::new(Arc::clone(&store));

        let mut hopper = HopperEntity::new(loc(0, 64, 0), Some(player(1).id), &starting, 0);
        hopper.cycle_input_filter();
        hopper.add_input_filter_item(coal());
        cache.put(hopper.clone());
        cache.put(HopperEntity::new(loc(500, 64, 0), None, &starting, 0));

        let region = loc(0, 64, 0).region();
        assert_eq!(cache.unload_region(region, &codec).unwrap(), 1);
        assert!(!cache.contains(loc(0, 64, 0)));
        assert!(cache.contains(loc(500, 64, 0)));
        assert_eq!(store.len(), 1);

        assert_eq!(cache.load_region(region, &codec, 0).unwrap(), 1);
        let restored = cache.get(loc(0, 64, 0)).unwrap();
        assert_eq!(restored.input_filter(), hopper.input_filter());
        assert_eq!(restored.owner(), hopper.owner());
        assert_eq!(restored.upgrades(), hopper.upgrades());
    }

    #[test]
    fn failed_save_evicts_nothing() {
        let registry = test_registry();
        let starting = test_starting();
        let codec = Codec::new(&registry, &starting);
        let cache = HopperCache::new(FailingStore);
        cache.put(HopperEntity::new(loc(0, 64, 0), None, &starting, 0));

        let err = cache.unload_region(loc(0, 64, 0).region(), &codec).unwrap_err();
        assert!(matches!(err, HopperError::PersistenceFailure(_)));
        assert!(cache.contains(loc(0, 64, 0)));
    }

    #[test]
    fn save_of_unknown_location_is_not_found() {
        let registry = test_registry();
        let starting = test_starting();
        let codec = Codec::new(&registry, &starting);
        let cache = HopperCache::new(MemoryStore::new());
        assert!(matches!(
            cache.save(loc(0, 0, 0), &codec),
            Err(HopperError::EntityNotFound(_))
        ));
    }
}
