// 🗺️ Region Entity - first subdivision of a Country
//
// Business key: "<country>|<region>". A source region literally named
// "standard" becomes "<Country> - region standard" so each country owns
// a distinct catch-all region.

use super::{is_standard, shared, CountryRef, Shared};
use crate::cache::EntityCache;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

pub type RegionRef = Shared<Region>;

/// Composite cache key for a region
pub fn region_key(country_name: &str, region_name: &str) -> String {
    format!("{}|{}", country_name, region_name)
}

#[derive(Debug, Clone)]
pub struct Region {
    pub id: Option<i64>,
    pub name: String,
    pub country: CountryRef,
}

impl Region {
    pub fn new(name: impl Into<String>, country: CountryRef) -> Self {
        Region {
            id: None,
            name: name.into(),
            country,
        }
    }

    pub fn country_name(&self) -> String {
        self.country.borrow().name.clone()
    }

    pub fn country_id(&self) -> Option<i64> {
        self.country.borrow().id
    }

    pub fn key(&self) -> String {
        region_key(&self.country.borrow().name, &self.name)
    }
}

/// Regions are equal when their business keys are
impl PartialEq for Region {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.country.borrow().name)
    }
}

pub struct RegionCache {
    cache: EntityCache<String, RegionRef>,
}

impl RegionCache {
    pub fn new() -> Self {
        RegionCache {
            cache: EntityCache::new("region"),
        }
    }

    pub fn get_or_create(&mut self, country: &CountryRef, raw_name: &str) -> Option<RegionRef> {
        let trimmed = raw_name.trim();
        if trimmed.is_empty() {
            return None;
        }

        let country_name = country.borrow().name.clone();
        let name = if is_standard(trimmed) {
            format!("{} - region standard", country_name)
        } else {
            trimmed.to_string()
        };

        let key = region_key(&country_name, &name);
        if let Some(existing) = self.cache.get(&key) {
            return Some(existing);
        }

        debug!(region = %name, country = %country_name, "region created");
        let region = shared(Region::new(name, country.clone()));
        self.cache.put(key, region.clone());
        Some(region)
    }

    /// Absent, blank and "standard" all resolve to the country's standard region
    pub fn get_or_create_with_empty_handling(
        &mut self,
        country: &CountryRef,
        raw_name: Option<&str>,
    ) -> Option<RegionRef> {
        match raw_name.map(str::trim) {
            Some(name) if !name.is_empty() => self.get_or_create(country, name),
            _ => self.get_or_create(country, super::STANDARD),
        }
    }

    pub fn get(&self, key: &str) -> Option<RegionRef> {
        self.cache.get(key)
    }

    pub fn update_cache<I: IntoIterator<Item = RegionRef>>(&mut self, saved: I) {
        self.cache.clear();
        for region in saved {
            let key = region.borrow().key();
            self.cache.put(key, region);
        }
    }

    pub fn snapshot(&self) -> BTreeMap<String, RegionRef> {
        self.cache.snapshot()
    }

    pub fn size(&self) -> usize {
        self.cache.size()
    }
}

impl Default for RegionCache {
    fn default() -> Self {
        Self::new()
    }
}
