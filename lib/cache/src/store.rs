use std::time::SystemTime;

use ahash::AHashMap;
use equitx_core::ParcelId;
use parking_lot::RwLock;

use crate::entry::{CacheEntry, Capability, CapabilityPayload};

/// In-memory cache storage: per parcel, per capability, one payload blob
/// plus its fetch timestamp. Absence means "never fetched".
///
/// Entries are replaced as a unit under the write lock, so a reader never
/// observes a fresh timestamp paired with an old payload.
#[derive(Default)]
pub struct CacheStore {
    subjects: RwLock<AHashMap<ParcelId, AHashMap<Capability, CacheEntry>>>,
}

impl CacheStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, subject: &ParcelId, capability: Capability) -> Option<CacheEntry> {
        self.subjects
            .read()
            .get(subject)
            .and_then(|caps| caps.get(&capability))
            .cloned()
    }

    /// Store a freshly fetched payload, stamped now.
    pub fn put(&self, subject: &ParcelId, payload: CapabilityPayload) {
        self.put_at(subject, payload, SystemTime::now());
    }

    /// Store a payload with an explicit timestamp. Used by backfills and by
    /// tests exercising TTL boundaries.
    pub fn put_at(&self, subject: &ParcelId, payload: CapabilityPayload, fetched_at: SystemTime) {
        let capability = payload.capability();
        let entry = CacheEntry { payload, fetched_at };
        self.subjects
            .write()
            .entry(subject.clone())
            .or_default()
            .insert(capability, entry);
    }

    /// Bulk invalidation: drop every capability entry for the given
    /// subjects in one critical section, so no reader sees a half-cleared
    /// subject.
    pub fn reset_subjects(&self, subjects: &[ParcelId]) {
        let mut map = self.subjects.write();
        for subject in subjects {
            map.remove(subject);
        }
    }

    /// Number of subjects with at least one cached capability.
    #[must_use]
    pub fn subject_count(&self) -> usize {
        self.subjects.read().len()
    }
}
