//! Per-location climatology cache keyed on the store watermark

use clima_core::{Climatology, LocationId, Watermark};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct CachedProfile {
    watermark: Watermark,
    profile: Arc<Climatology>,
}

/// A cached profile is served only while the location's watermark is unchanged
#[derive(Debug, Default)]
pub struct ProfileCache {
    entries: Mutex<HashMap<LocationId, CachedProfile>>,
}

impl ProfileCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<LocationId, CachedProfile>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, location_id: LocationId, watermark: &Watermark) -> Option<Arc<Climatology>> {
        self.entries()
            .get(&location_id)
            .filter(|cached| cached.watermark == *watermark)
            .map(|cached| Arc::clone(&cached.profile))
    }

    pub fn insert(&self, location_id: LocationId, watermark: Watermark, profile: Arc<Climatology>) {
        self.entries()
            .insert(location_id, CachedProfile { watermark, profile });
    }

    pub fn invalidate(&self, location_id: LocationId) {
        self.entries().remove(&location_id);
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
