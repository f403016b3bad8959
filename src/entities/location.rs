// 📍 Location Entity - leaf of the geography hierarchy
//
// Business key: "<country>|<region>|<location>".
//
// Location names must be unique system-wide for display, but sources reuse
// names ("Washington", "Georgia") across unrelated regions. A secondary
// index keyed by bare name detects a request for a name already owned by a
// different region; the newcomer is then created as "<Region> - <name>".

use super::{is_standard, region_key, shared, RegionRef, Shared};
use crate::cache::EntityCache;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::debug;

pub type LocationRef = Shared<Location>;

pub fn location_key(country_name: &str, region_name: &str, location_name: &str) -> String {
    format!("{}|{}|{}", country_name, region_name, location_name)
}

#[derive(Debug, Clone)]
pub struct Location {
    pub id: Option<i64>,
    pub name: String,
    pub region: RegionRef,
}

impl Location {
    pub fn new(name: impl Into<String>, region: RegionRef) -> Self {
        Location {
            id: None,
            name: name.into(),
            region,
        }
    }

    pub fn region_key(&self) -> String {
        self.region.borrow().key()
    }

    pub fn region_id(&self) -> Option<i64> {
        self.region.borrow().id
    }

    pub fn key(&self) -> String {
        let region = self.region.borrow();
        location_key(&region.country_name(), &region.name, &self.name)
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.region.borrow())
    }
}

// ============================================================================
// LOCATION CACHE
// ============================================================================

pub struct LocationCache {
    cache: EntityCache<String, LocationRef>,
    /// Bare location name → the location that first claimed it
    by_name: HashMap<String, LocationRef>,
}

impl LocationCache {
    pub fn new() -> Self {
        LocationCache {
            cache: EntityCache::new("location"),
            by_name: HashMap::new(),
        }
    }

    pub fn get_or_create(&mut self, region: &RegionRef, raw_name: &str) -> Option<LocationRef> {
        let trimmed = raw_name.trim();
        if trimmed.is_empty() {
            return None;
        }

        let (country_name, region_name) = {
            let r = region.borrow();
            (r.country_name(), r.name.clone())
        };

        let name = if is_standard(trimmed) {
            format!("{} - location standard", region_name)
        } else {
            trimmed.to_string()
        };

        let key = location_key(&country_name, &region_name, &name);
        if let Some(existing) = self.cache.get(&key) {
            return Some(existing);
        }

        let requested_region = region_key(&country_name, &region_name);
        let claimed_elsewhere = self
            .by_name
            .get(&name)
            .map(|owner| owner.borrow().region_key() != requested_region)
            .unwrap_or(false);

        if claimed_elsewhere {
            let disambiguated = format!("{} - {}", region_name, name);
            let disambiguated_key = location_key(&country_name, &region_name, &disambiguated);

            if let Some(existing) = self.cache.get(&disambiguated_key) {
                return Some(existing);
            }

            debug!(location = %name, region = %region_name, renamed = %disambiguated, "location name collision");
            let location = shared(Location::new(disambiguated.clone(), region.clone()));
            self.cache.put(disambiguated_key, location.clone());
            self.by_name.entry(disambiguated).or_insert_with(|| location.clone());
            return Some(location);
        }

        debug!(location = %name, region = %region_name, "location created");
        let location = shared(Location::new(name.clone(), region.clone()));
        self.cache.put(key, location.clone());
        self.by_name.entry(name).or_insert_with(|| location.clone());
        Some(location)
    }

    /// Absent, blank and "standard" all resolve to the region's standard location
    pub fn get_or_create_with_empty_handling(
        &mut self,
        region: &RegionRef,
        raw_name: Option<&str>,
    ) -> Option<LocationRef> {
        match raw_name.map(str::trim) {
            Some(name) if !name.is_empty() => self.get_or_create(region, name),
            _ => self.get_or_create(region, super::STANDARD),
        }
    }

    pub fn get(&self, key: &str) -> Option<LocationRef> {
        self.cache.get(key)
    }

    /// Rebuild both indices from managed instances
    pub fn update_cache<I: IntoIterator<Item = LocationRef>>(&mut self, saved: I) {
        self.cache.clear();
        self.by_name.clear();
        for location in saved {
            let (key, name) = {
                let l = location.borrow();
                (l.key(), l.name.clone())
            };
            self.by_name.entry(name).or_insert_with(|| location.clone());
            self.cache.put(key, location);
        }
    }

    pub fn snapshot(&self) -> BTreeMap<String, LocationRef> {
        self.cache.snapshot()
    }

    pub fn size(&self) -> usize {
        self.cache.size()
    }
}

impl Default for LocationCache {
    fn default() -> Self {
        Self::new()
    }
}
