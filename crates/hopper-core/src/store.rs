//! The durable store seam.
//!
//! The engine never performs I/O itself. Hosts implement [`HopperStore`]
//! over files or a database; [`MemoryStore`] keeps records in process.

use crate::id::{Location, RegionId};
use crate::persist::{CodecError, EncodedRecord};
use parking_lot::Mutex;
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store i/o failed: {0}")]
    Io(String),
    #[error("store unavailable")]
    Unavailable,
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Durable storage of encoded hopper records, keyed by location.
pub trait HopperStore: std::fmt::Debug + Send + Sync {
    /// Every record stored for hoppers inside `region`.
    fn load_region(&self, region: RegionId) -> Result<Vec<EncodedRecord>, StoreError>;

    fn save(&self, location: Location, record: &EncodedRecord) -> Result<(), StoreError>;

    /// Deleting a location with no record is not an error.
    fn delete(&self, location: Location) -> Result<(), StoreError>;
}

/// An in-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<Location, EncodedRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, location: Location) -> Option<EncodedRecord> {
        self.records.lock().get(&location).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl HopperStore for MemoryStore {
    fn load_region(&self, region: RegionId) -> Result<Vec<EncodedRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .iter()
            .filter(|(loc, _)| loc.region() == region)
            .map(|(_, record)| record.clone())
            .collect())
    }

    fn save(&self, location: Location, record: &EncodedRecord) -> Result<(), StoreError> {
        self.records.lock().insert(location, record.clone());
        Ok(())
    }

    fn delete(&self, location: Location) -> Result<(), StoreError> {
        self.records.lock().remove(&location);
        Ok(())
    }
}

impl<S: HopperStore + ?Sized> HopperStore for std::sync::Arc<S> {
    fn load_region(&self, region: RegionId) -> Result<Vec<EncodedRecord>, StoreError> {
        (**self).load_region(region)
    }

    fn save(&self, location: Location, record: &EncodedRecord) -> Result<(), StoreError> {
        (**self).save(location, record)
    }

    fn delete(&self, location: Location) -> Result<(), StoreError> {
        (**self).delete(location)
    }
}
