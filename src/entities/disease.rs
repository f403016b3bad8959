// 🦠 Disease + DiseaseCase
//
// Disease: business key = name. Normally preloaded once per run.
// DiseaseCase: one time-series observation for a (disease, location, date).
// Cases are never cached; they flow straight from mapper to store.

use super::{shared, LocationRef, Shared};
use crate::cache::EntityCache;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type DiseaseRef = Shared<Disease>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disease {
    pub id: Option<i64>,
    pub name: String,
}

impl Disease {
    pub fn new(name: impl Into<String>) -> Self {
        Disease {
            id: None,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiseaseCase {
    pub id: Option<i64>,
    pub disease: DiseaseRef,
    pub location: LocationRef,
    pub date: NaiveDate,
    pub confirmed: i64,
    pub deaths: i64,
    pub recovered: i64,
    pub active: i64,
}

pub struct DiseaseCache {
    cache: EntityCache<String, DiseaseRef>,
}

impl DiseaseCache {
    pub fn new() -> Self {
        DiseaseCache {
            cache: EntityCache::new("disease"),
        }
    }

    pub fn get_or_create(&mut self, raw_name: &str) -> Option<DiseaseRef> {
        let name = raw_name.trim();
        if name.is_empty() {
            return None;
        }
        if let Some(existing) = self.cache.get(name) {
            return Some(existing);
        }

        let disease = shared(Disease::new(name));
        self.cache.put(name.to_string(), disease.clone());
        Some(disease)
    }

    /// Register an instance that is already managed
    pub fn insert(&mut self, disease: DiseaseRef) {
        let key = disease.borrow().name.clone();
        self.cache.put(key, disease);
    }

    pub fn get(&self, name: &str) -> Option<DiseaseRef> {
        self.cache.get(name)
    }

    pub fn update_cache<I: IntoIterator<Item = DiseaseRef>>(&mut self, saved: I) {
        self.cache.clear();
        for disease in saved {
            self.insert(disease);
        }
    }

    pub fn snapshot(&self) -> BTreeMap<String, DiseaseRef> {
        self.cache.snapshot()
    }

    pub fn size(&self) -> usize {
        self.cache.size()
    }
}

impl Default for DiseaseCache {
    fn default() -> Self {
        Self::new()
    }
}
