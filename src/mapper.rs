// 🧭 Source Mappers - parsed rows → entities, through the CacheManager
//
// A mapper never creates entities directly: every Country/Region/Location
// comes from the cache so the same name resolves to the same instance
// across rows and sources. Skip-listed names produce nothing at all.

use crate::cache::CacheManager;
use crate::entities::{DiseaseCase, DiseaseRef, LocationRef, STANDARD};
use crate::error::{EtlError, EtlResult};
use crate::parser::{CovidCompleteRow, FullGroupedRow, UsaCountyRow, WorldometerRow};
use chrono::NaiveDate;
use tracing::debug;

pub trait RowMapper {
    type Row;

    /// `Ok(None)` means the row was skipped (skip-list, empty name) or
    /// only contributed reference data
    fn map(&self, row: &Self::Row, cache: &mut CacheManager) -> EtlResult<Option<DiseaseCase>>;
}

/// Counters shared by every case-producing row
struct CaseCounts {
    date: NaiveDate,
    confirmed: i64,
    deaths: i64,
    recovered: i64,
    active: i64,
}

fn preloaded_disease(cache: &CacheManager, name: &str) -> EtlResult<DiseaseRef> {
    cache
        .find_disease(name)
        .ok_or_else(|| EtlError::MissingDisease(name.to_string()))
}

fn build_case(disease: DiseaseRef, location: LocationRef, counts: CaseCounts) -> DiseaseCase {
    DiseaseCase {
        id: None,
        disease,
        location,
        date: counts.date,
        confirmed: counts.confirmed,
        deaths: counts.deaths,
        recovered: counts.recovered,
        active: counts.active,
    }
}

fn skipped(cache: &CacheManager, country: &str, province: Option<&str>) -> bool {
    let hit = cache.is_in_skip_list(country) || province.map_or(false, |p| cache.is_in_skip_list(p));
    if hit {
        debug!(country, province, "skip-listed row ignored");
    }
    hit
}

// ============================================================================
// WORLDOMETER (reference data only)
// ============================================================================

pub struct WorldometerMapper;

impl RowMapper for WorldometerMapper {
    type Row = WorldometerRow;

    fn map(&self, row: &WorldometerRow, cache: &mut CacheManager) -> EtlResult<Option<DiseaseCase>> {
        if skipped(cache, &row.country, None) {
            return Ok(None);
        }

        let Some(country) = cache.get_or_create_country_with_details(
            &row.country,
            row.continent.as_deref(),
            row.who_region.as_deref(),
        ) else {
            return Ok(None);
        };

        if let Some(population) = row.population {
            country.borrow_mut().population = Some(population);
        }

        if let Some(region) = cache.get_or_create_region(&country, STANDARD) {
            cache.get_or_create_location(&region, STANDARD);
        }

        Ok(None)
    }
}

// ============================================================================
// COVID-19 CLEAN COMPLETE
// ============================================================================

pub struct CovidCompleteMapper {
    pub disease_name: String,
}

impl RowMapper for CovidCompleteMapper {
    type Row = CovidCompleteRow;

    fn map(&self, row: &CovidCompleteRow, cache: &mut CacheManager) -> EtlResult<Option<DiseaseCase>> {
        if skipped(cache, &row.country, row.province.as_deref()) {
            return Ok(None);
        }

        let Some(country) =
            cache.get_or_create_country_with_details(&row.country, None, row.who_region.as_deref())
        else {
            return Ok(None);
        };

        // Province doubles as location name; absent → standard region + location
        let province = row.province.as_deref().map(|p| cache.clean_region_name(p));
        let Some(region) = cache.get_or_create_region_with_empty_handling(&country, province.as_deref())
        else {
            return Ok(None);
        };
        let Some(location) = cache.get_or_create_location_with_empty_handling(&region, province.as_deref())
        else {
            return Ok(None);
        };

        let disease = preloaded_disease(cache, &self.disease_name)?;
        Ok(Some(build_case(
            disease,
            location,
            CaseCounts {
                date: row.date,
                confirmed: row.confirmed,
                deaths: row.deaths,
                recovered: row.recovered,
                active: row.active,
            },
        )))
    }
}

// ============================================================================
// FULL GROUPED (country level only)
// ============================================================================

pub struct FullGroupedMapper {
    pub disease_name: String,
}

impl RowMapper for FullGroupedMapper {
    type Row = FullGroupedRow;

    fn map(&self, row: &FullGroupedRow, cache: &mut CacheManager) -> EtlResult<Option<DiseaseCase>> {
        if skipped(cache, &row.country, None) {
            return Ok(None);
        }

        let Some(country) =
            cache.get_or_create_country_with_details(&row.country, None, row.who_region.as_deref())
        else {
            return Ok(None);
        };

        let Some(location) = cache
            .get_or_create_region(&country, STANDARD)
            .and_then(|region| cache.get_or_create_location(&region, STANDARD))
        else {
            return Ok(None);
        };

        let disease = preloaded_disease(cache, &self.disease_name)?;
        Ok(Some(build_case(
            disease,
            location,
            CaseCounts {
                date: row.date,
                confirmed: row.confirmed,
                deaths: row.deaths,
                recovered: row.recovered,
                active: row.active,
            },
        )))
    }
}

// ============================================================================
// USA COUNTY
// ============================================================================

pub struct UsaCountyMapper {
    pub disease_name: String,
}

impl RowMapper for UsaCountyMapper {
    type Row = UsaCountyRow;

    fn map(&self, row: &UsaCountyRow, cache: &mut CacheManager) -> EtlResult<Option<DiseaseCase>> {
        if skipped(cache, &row.country, row.province.as_deref()) {
            return Ok(None);
        }

        let Some(country) =
            cache.get_or_create_country_with_details(&row.country, Some("North America"), Some("Americas"))
        else {
            return Ok(None);
        };

        let Some(region) = cache.get_or_create_region_with_empty_handling(&country, row.province.as_deref())
        else {
            return Ok(None);
        };
        let Some(location) = cache.get_or_create_location_with_empty_handling(&region, row.county.as_deref())
        else {
            return Ok(None);
        };

        let disease = preloaded_disease(cache, &self.disease_name)?;
        Ok(Some(build_case(
            disease,
            location,
            CaseCounts {
                date: row.date,
                confirmed: row.confirmed,
                deaths: row.deaths,
                recovered: 0,
                active: 0,
            },
        )))
    }
}
