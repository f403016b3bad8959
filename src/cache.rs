// 🗃️ Entity caches - generic container + the facade mappers talk to
//
// EntityCache<K, E> is the shared get/put/clear/size primitive.
// CacheManager composes the four typed caches and is created once per
// import run (never a global), then passed by reference to every mapper.

use crate::entities::{
    CountryCache, CountryRef, Disease, DiseaseCache, DiseaseRef, Location,
    LocationCache, LocationRef, Region, RegionCache, RegionRef,
};
use crate::normalizer::NameNormalizer;
use std::collections::BTreeMap;
use tracing::debug;

// ============================================================================
// GENERIC ENTITY CACHE
// ============================================================================

/// Map-backed cache keyed by business key. Ordered so snapshots (and
/// therefore bulk saves) are deterministic.
#[derive(Debug, Clone)]
pub struct EntityCache<K, E> {
    label: &'static str,
    entries: BTreeMap<K, E>,
}

impl<K: Ord, E: Clone> EntityCache<K, E> {
    pub fn new(label: &'static str) -> Self {
        EntityCache {
            label,
            entries: BTreeMap::new(),
        }
    }

    pub fn get<Q>(&self, key: &Q) -> Option<E>
    where
        K: std::borrow::Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.entries.get(key).cloned()
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: std::borrow::Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.entries.contains_key(key)
    }

    pub fn put(&mut self, key: K, entity: E) {
        self.entries.insert(key, entity);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        debug!(cache = self.label, "cache cleared");
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn values(&self) -> Vec<E> {
        self.entries.values().cloned().collect()
    }

    /// Copy of the key → entity map; the handles still point at the live entities
    pub fn snapshot(&self) -> BTreeMap<K, E>
    where
        K: Clone,
    {
        self.entries.clone()
    }
}

// ============================================================================
// CACHE MANAGER (facade)
// ============================================================================

/// The only entry point mapper code uses to resolve reference data
pub struct CacheManager {
    normalizer: NameNormalizer,
    countries: CountryCache,
    regions: RegionCache,
    locations: LocationCache,
    diseases: DiseaseCache,
}

impl CacheManager {
    pub fn new() -> Self {
        let normalizer = NameNormalizer::new();
        CacheManager {
            countries: CountryCache::new(normalizer.clone()),
            normalizer,
            regions: RegionCache::new(),
            locations: LocationCache::new(),
            diseases: DiseaseCache::new(),
        }
    }

    // ------------------------------------------------------------------------
    // get-or-create
    // ------------------------------------------------------------------------

    pub fn get_or_create_country(&mut self, name: &str) -> Option<CountryRef> {
        self.countries.get_or_create(name, None, None)
    }

    pub fn get_or_create_country_with_details(
        &mut self,
        name: &str,
        continent: Option<&str>,
        who_region: Option<&str>,
    ) -> Option<CountryRef> {
        self.countries.get_or_create(name, continent, who_region)
    }

    pub fn get_or_create_region(&mut self, country: &CountryRef, name: &str) -> Option<RegionRef> {
        self.regions.get_or_create(country, name)
    }

    pub fn get_or_create_region_with_empty_handling(
        &mut self,
        country: &CountryRef,
        name: Option<&str>,
    ) -> Option<RegionRef> {
        self.regions.get_or_create_with_empty_handling(country, name)
    }

    pub fn get_or_create_location(&mut self, region: &RegionRef, name: &str) -> Option<LocationRef> {
        self.locations.get_or_create(region, name)
    }

    pub fn get_or_create_location_with_empty_handling(
        &mut self,
        region: &RegionRef,
        name: Option<&str>,
    ) -> Option<LocationRef> {
        self.locations.get_or_create_with_empty_handling(region, name)
    }

    pub fn get_or_create_disease(&mut self, name: &str) -> Option<DiseaseRef> {
        self.diseases.get_or_create(name)
    }

    /// Register an already-managed disease (preloaded from the store)
    pub fn add_disease(&mut self, disease: DiseaseRef) {
        self.diseases.insert(disease);
    }

    // ------------------------------------------------------------------------
    // normalization passthrough
    // ------------------------------------------------------------------------

    pub fn is_in_skip_list(&self, name: &str) -> bool {
        self.normalizer.is_in_skip_list(name)
    }

    pub fn clean_country_name(&self, raw: &str) -> String {
        self.normalizer.clean_country_name(raw)
    }

    pub fn clean_region_name(&self, raw: &str) -> String {
        self.normalizer.clean_region_name(raw)
    }

    pub fn clean_location_name(&self, raw: &str) -> String {
        self.normalizer.clean_location_name(raw)
    }

    // ------------------------------------------------------------------------
    // lookups by business key
    // ------------------------------------------------------------------------

    pub fn find_country(&self, name: &str) -> Option<CountryRef> {
        self.countries.get(name)
    }

    pub fn find_region(&self, key: &str) -> Option<RegionRef> {
        self.regions.get(key)
    }

    pub fn find_location(&self, key: &str) -> Option<LocationRef> {
        self.locations.get(key)
    }

    pub fn find_disease(&self, name: &str) -> Option<DiseaseRef> {
        self.diseases.get(name)
    }

    pub fn location_key(&self, country: &str, region: &str, location: &str) -> Option<String> {
        if country.is_empty() || region.is_empty() || location.is_empty() {
            return None;
        }
        Some(crate::entities::location_key(country, region, location))
    }

    // ------------------------------------------------------------------------
    // snapshots (persistence phase + reporting)
    // ------------------------------------------------------------------------

    pub fn countries(&self) -> BTreeMap<String, CountryRef> {
        self.countries.snapshot()
    }

    pub fn regions(&self) -> BTreeMap<String, RegionRef> {
        self.regions.snapshot()
    }

    pub fn locations(&self) -> BTreeMap<String, LocationRef> {
        self.locations.snapshot()
    }

    pub fn diseases(&self) -> BTreeMap<String, DiseaseRef> {
        self.diseases.snapshot()
    }

    pub fn counts(&self) -> CacheCounts {
        CacheCounts {
            countries: self.countries.size(),
            regions: self.regions.size(),
            locations: self.locations.size(),
            diseases: self.diseases.size(),
        }
    }

    // ------------------------------------------------------------------------
    // reconciliation (clear + rebuild from managed entities)
    // ------------------------------------------------------------------------

    pub fn set_countries<I: IntoIterator<Item = CountryRef>>(&mut self, saved: I) {
        self.countries.update_cache(saved);
    }

    pub fn set_regions<I: IntoIterator<Item = RegionRef>>(&mut self, saved: I) {
        self.regions.update_cache(saved);
    }

    pub fn set_locations<I: IntoIterator<Item = LocationRef>>(&mut self, saved: I) {
        self.locations.update_cache(saved);
    }

    pub fn set_diseases<I: IntoIterator<Item = DiseaseRef>>(&mut self, saved: I) {
        self.diseases.update_cache(saved);
    }

    /// Managed country for a (possibly transient) region's parent
    pub(crate) fn managed_country_for(&self, region: &Region) -> Option<CountryRef> {
        self.countries.get(&region.country_name())
    }

    /// Managed region for a (possibly transient) location's parent
    pub(crate) fn managed_region_for(&self, location: &Location) -> Option<RegionRef> {
        self.regions.get(&location.region_key())
    }

    pub(crate) fn managed_disease_for(&self, disease: &Disease) -> Option<DiseaseRef> {
        self.diseases.get(&disease.name)
    }

    pub(crate) fn managed_location_for(&self, location: &Location) -> Option<LocationRef> {
        self.locations.get(&location.key())
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheCounts {
    pub countries: usize,
    pub regions: usize,
    pub locations: usize,
    pub diseases: usize,
}

// ============================================================================
// TESTS
// ============================================================================
