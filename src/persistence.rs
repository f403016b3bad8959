// 🔁 Persistence phase - bulk save + cache reconciliation
//
// After a source pass has filled the caches with transient entities:
//   1. save each cache in parent-before-child order
//   2. replace the cache contents with the returned managed instances
// Children are relinked to the managed parent (looked up by business key)
// before they are saved, so foreign keys always point at real rows.

use crate::cache::CacheManager;
use crate::db::EntityStore;
use crate::error::{EtlError, EtlResult};
use tracing::{debug, info};

pub struct PersistenceHelper;

impl PersistenceHelper {
    /// Save Country, Region, Location then Disease; empty caches are skipped
    pub fn persist_cached_entities(
        cache: &mut CacheManager,
        store: &mut dyn EntityStore,
    ) -> EtlResult<()> {
        Self::persist_countries(cache, store)?;
        Self::persist_regions(cache, store)?;
        Self::persist_locations(cache, store)?;
        Self::persist_diseases(cache, store)?;

        let counts = cache.counts();
        info!(
            countries = counts.countries,
            regions = counts.regions,
            locations = counts.locations,
            diseases = counts.diseases,
            "cache reconciled with store"
        );
        Ok(())
    }

    fn persist_countries(cache: &mut CacheManager, store: &mut dyn EntityStore) -> EtlResult<()> {
        let countries: Vec<_> = cache.countries().into_values().collect();
        if countries.is_empty() {
            return Ok(());
        }

        let saved = store
            .save_countries(&countries)
            .map_err(|e| EtlError::persistence("saving countries", e))?;
        cache.set_countries(saved);
        debug!(count = countries.len(), "countries persisted");
        Ok(())
    }

    fn persist_regions(cache: &mut CacheManager, store: &mut dyn EntityStore) -> EtlResult<()> {
        let regions: Vec<_> = cache.regions().into_values().collect();
        if regions.is_empty() {
            return Ok(());
        }

        for region in &regions {
            let managed = cache.managed_country_for(&region.borrow());
            if let Some(country) = managed {
                region.borrow_mut().country = country;
            }
        }

        let saved = store
            .save_regions(&regions)
            .map_err(|e| EtlError::persistence("saving regions", e))?;
        cache.set_regions(saved);
        debug!(count = regions.len(), "regions persisted");
        Ok(())
    }

    fn persist_locations(cache: &mut CacheManager, store: &mut dyn EntityStore) -> EtlResult<()> {
        let locations: Vec<_> = cache.locations().into_values().collect();
        if locations.is_empty() {
            return Ok(());
        }

        for location in &locations {
            let managed = cache.managed_region_for(&location.borrow());
            if let Some(region) = managed {
                location.borrow_mut().region = region;
            }
        }

        let saved = store
            .save_locations(&locations)
            .map_err(|e| EtlError::persistence("saving locations", e))?;
        cache.set_locations(saved);
        debug!(count = locations.len(), "locations persisted");
        Ok(())
    }

    fn persist_diseases(cache: &mut CacheManager, store: &mut dyn EntityStore) -> EtlResult<()> {
        let diseases: Vec<_> = cache.diseases().into_values().collect();
        if diseases.is_empty() {
            return Ok(());
        }

        let saved = store
            .save_diseases(&diseases)
            .map_err(|e| EtlError::persistence("saving diseases", e))?;
        cache.set_diseases(saved);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::EntityCounts;
    use crate::entities::{
        shared, Country, CountryRef, Disease, DiseaseCase, DiseaseRef, Location, LocationRef,
        Region, RegionRef,
    };
    use anyhow::{anyhow, Result};
    use std::rc::Rc;

    /// In-memory store handing out sequential ids; remembers what it saw
    #[derive(Default)]
    struct SequentialStore {
        next_id: i64,
        region_parent_ids: Vec<Option<i64>>,
        location_parent_ids: Vec<Option<i64>>,
        save_calls: Vec<&'static str>,
        fail_regions: bool,
    }

    impl SequentialStore {
        fn next(&mut self) -> i64 {
            self.next_id += 1;
            self.next_id
        }
    }

    impl EntityStore for SequentialStore {
        fn save_countries(&mut self, countries: &[CountryRef]) -> Result<Vec<CountryRef>> {
            self.save_calls.push("country");
            Ok(countries
                .iter()
                .map(|c| {
                    let id = c.borrow().id.unwrap_or_else(|| self.next());
                    shared(Country {
                        id: Some(id),
                        ..c.borrow().clone()
                    })
                })
                .collect())
        }

        fn save_regions(&mut self, regions: &[RegionRef]) -> Result<Vec<RegionRef>> {
            self.save_calls.push("region");
            if self.fail_regions {
                return Err(anyhow!("constraint violation"));
            }
            let mut out = Vec::new();
            for r in regions {
                self.region_parent_ids.push(r.borrow().country_id());
                let id = r.borrow().id.unwrap_or_else(|| self.next());
                out.push(shared(Region {
                    id: Some(id),
                    ..r.borrow().clone()
                }));
            }
            Ok(out)
        }

        fn save_locations(&mut self, locations: &[LocationRef]) -> Result<Vec<LocationRef>> {
            self.save_calls.push("location");
            let mut out = Vec::new();
            for l in locations {
                self.location_parent_ids.push(l.borrow().region_id());
                let id = l.borrow().id.unwrap_or_else(|| self.next());
                out.push(shared(Location {
                    id: Some(id),
                    ..l.borrow().clone()
                }));
            }
            Ok(out)
        }

        fn save_diseases(&mut self, diseases: &[DiseaseRef]) -> Result<Vec<DiseaseRef>> {
            self.save_calls.push("disease");
            Ok(diseases
                .iter()
                .map(|d| {
                    let id = d.borrow().id.unwrap_or_else(|| self.next());
                    shared(Disease {
                        id: Some(id),
                        name: d.borrow().name.clone(),
                    })
                })
                .collect())
        }

        fn find_disease_by_name(&mut self, _name: &str) -> Result<Option<DiseaseRef>> {
            Ok(None)
        }

        fn save_disease_cases(&mut self, cases: &[DiseaseCase]) -> Result<usize> {
            Ok(cases.len())
        }

        fn delete_all(&mut self) -> Result<()> {
            Ok(())
        }

        fn counts(&mut self) -> Result<EntityCounts> {
            Ok(EntityCounts::default())
        }
    }

    #[test]
    fn test_reconciliation_round_trip() {
        let mut cache = CacheManager::new();
        let mut store = SequentialStore::default();

        let before = cache.get_or_create_country("Spain").unwrap();
        let madrid = cache.get_or_create_region(&before, "Madrid").unwrap();
        cache.get_or_create_location(&madrid, "Madrid").unwrap();
        cache.get_or_create_location(&madrid, "standard").unwrap();
        cache.get_or_create_disease("COVID-19").unwrap();
        assert!(before.borrow().id.is_none());

        let keys_before: Vec<String> = cache.locations().into_keys().collect();

        PersistenceHelper::persist_cached_entities(&mut cache, &mut store).unwrap();

        assert!(cache.countries().values().all(|c| c.borrow().id.is_some()));
        assert!(cache.regions().values().all(|r| r.borrow().id.is_some()));
        assert!(cache.locations().values().all(|l| l.borrow().id.is_some()));
        assert!(cache.diseases().values().all(|d| d.borrow().id.is_some()));

        // same business keys still resolve
        let keys_after: Vec<String> = cache.locations().into_keys().collect();
        assert_eq!(keys_before, keys_after);
        for key in &keys_before {
            assert!(cache.find_location(key).unwrap().borrow().id.is_some());
        }
        assert!(cache.find_disease("COVID-19").is_some());

        let after = cache.get_or_create_country("Spain").unwrap();
        assert!(after.borrow().id.is_some());
        assert!(!Rc::ptr_eq(&before, &after));

        // every child was saved pointing at a saved parent
        assert!(store.region_parent_ids.iter().all(Option::is_some));
        assert!(store.location_parent_ids.iter().all(Option::is_some));

        // the cached region now points at the managed country
        let region = cache.find_region("Spain|Madrid").unwrap();
        assert!(Rc::ptr_eq(&region.borrow().country, &after));

        println!("✅ Reconciliation round-trip test PASSED");
    }

    #[test]
    fn test_save_order_and_empty_caches_skipped() {
        let mut cache = CacheManager::new();
        let mut store = SequentialStore::default();

        cache.get_or_create_country("Chile").unwrap();
        PersistenceHelper::persist_cached_entities(&mut cache, &mut store).unwrap();
        assert_eq!(store.save_calls, vec!["country"]);

        let chile = cache.get_or_create_country("Chile").unwrap();
        let region = cache.get_or_create_region(&chile, "standard").unwrap();
        cache.get_or_create_location(&region, "standard").unwrap();
        cache.get_or_create_disease("COVID-19").unwrap();

        store.save_calls.clear();
        PersistenceHelper::persist_cached_entities(&mut cache, &mut store).unwrap();
        assert_eq!(store.save_calls, vec!["country", "region", "location", "disease"]);
    }

    #[test]
    fn test_second_pass_keeps_identities() {
        let mut cache = CacheManager::new();
        let mut store = SequentialStore::default();

        let peru = cache.get_or_create_country("Peru").unwrap();
        cache.get_or_create_region(&peru, "Lima").unwrap();
        PersistenceHelper::persist_cached_entities(&mut cache, &mut store).unwrap();

        let first_id = cache.find_region("Peru|Lima").unwrap().borrow().id;

        // next pass: resolves to managed instances, adds one new region
        let peru = cache.get_or_create_country("Peru").unwrap();
        cache.get_or_create_region(&peru, "Lima").unwrap();
        cache.get_or_create_region(&peru, "Cusco").unwrap();
        PersistenceHelper::persist_cached_entities(&mut cache, &mut store).unwrap();

        assert_eq!(cache.find_region("Peru|Lima").unwrap().borrow().id, first_id);
        assert!(cache.find_region("Peru|Cusco").unwrap().borrow().id.is_some());
        assert_eq!(cache.counts().regions, 2);
    }

    #[test]
    fn test_store_failure_is_wrapped() {
        let mut cache = CacheManager::new();
        let mut store = SequentialStore {
            fail_regions: true,
            ..SequentialStore::default()
        };

        let peru = cache.get_or_create_country("Peru").unwrap();
        cache.get_or_create_region(&peru, "Lima").unwrap();

        let err = PersistenceHelper::persist_cached_entities(&mut cache, &mut store).unwrap_err();
        assert!(matches!(err, EtlError::Persistence { .. }));
        assert!(err.to_string().contains("regions"));
    }
}
