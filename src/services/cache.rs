use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use mongodb::bson::oid::ObjectId;

use crate::models::FormResponse;

struct CacheEntry {
    forms: Vec<FormResponse>,
    inserted: Instant,
}

/// Per-owner form list cache. Bounded, expiring, and invalidated by every
/// write to the owner's forms.
pub struct FormCache {
    capacity: usize,
    ttl: Duration,
    entries: Mutex<HashMap<ObjectId, CacheEntry>>,
}

impl FormCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        FormCache {
            capacity,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ObjectId, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, owner: &ObjectId) -> Option<Vec<FormResponse>> {
        let mut entries = self.lock();
        match entries.get(owner) {
            Some(entry) if entry.inserted.elapsed() < self.ttl => Some(entry.forms.clone()),
            Some(_) => {
                entries.remove(owner);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, owner: ObjectId, forms: Vec<FormResponse>) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.lock();
        if !entries.contains_key(&owner) && entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted)
                .map(|(key, _)| *key);
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }
        entries.insert(
            owner,
            CacheEntry {
                forms,
                inserted: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, owner: &ObjectId) {
        self.lock().remove(owner);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().len()
    }
}
