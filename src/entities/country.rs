// 🌍 Country Entity - root of the geography hierarchy
//
// Business key: cleaned country name.
// Continent and WHO region are optional enums; a hardcoded special-case
// table beats anything a source says, and a WHO region can be deduced
// from the continent when neither provides it.

use super::{shared, Shared};
use crate::cache::EntityCache;
use crate::normalizer::NameNormalizer;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

pub type CountryRef = Shared<Country>;

// ============================================================================
// ENUMS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Continent {
    Africa,
    Asia,
    Europe,
    NorthAmerica,
    SouthAmerica,
    Oceania,
    Antarctica,
}

impl Continent {
    pub const ALL: [Continent; 7] = [
        Continent::Africa,
        Continent::Asia,
        Continent::Europe,
        Continent::NorthAmerica,
        Continent::SouthAmerica,
        Continent::Oceania,
        Continent::Antarctica,
    ];

    /// Canonical token, also the stored database value
    pub fn as_str(&self) -> &'static str {
        match self {
            Continent::Africa => "AFRICA",
            Continent::Asia => "ASIA",
            Continent::Europe => "EUROPE",
            Continent::NorthAmerica => "NORTH_AMERICA",
            Continent::SouthAmerica => "SOUTH_AMERICA",
            Continent::Oceania => "OCEANIA",
            Continent::Antarctica => "ANTARCTICA",
        }
    }

    /// Case-insensitive match against the canonical tokens
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(token))
    }
}

impl fmt::Display for Continent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WhoRegion {
    Americas,
    Africa,
    WesternPacific,
    EasternMediterranean,
    Europe,
    SouthEastAsia,
}

impl WhoRegion {
    pub const ALL: [WhoRegion; 6] = [
        WhoRegion::Americas,
        WhoRegion::Africa,
        WhoRegion::WesternPacific,
        WhoRegion::EasternMediterranean,
        WhoRegion::Europe,
        WhoRegion::SouthEastAsia,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WhoRegion::Americas => "Americas",
            WhoRegion::Africa => "Africa",
            WhoRegion::WesternPacific => "Western_Pacific",
            WhoRegion::EasternMediterranean => "Eastern_Mediterranean",
            WhoRegion::Europe => "Europe",
            WhoRegion::SouthEastAsia => "South_East_Asia",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(token))
    }

    /// Only continents that map onto exactly one WHO region deduce one
    pub fn deduce_from_continent(continent: Continent) -> Option<Self> {
        match continent {
            Continent::NorthAmerica | Continent::SouthAmerica => Some(WhoRegion::Americas),
            Continent::Africa => Some(WhoRegion::Africa),
            Continent::Europe => Some(WhoRegion::Europe),
            Continent::Asia | Continent::Oceania | Continent::Antarctica => None,
        }
    }
}

impl fmt::Display for WhoRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// COUNTRY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Country {
    pub id: Option<i64>,
    pub name: String,
    pub continent: Option<Continent>,
    pub who_region: Option<WhoRegion>,
    pub population: Option<i64>,
}

impl Country {
    pub fn new(name: impl Into<String>) -> Self {
        Country {
            id: None,
            name: name.into(),
            continent: None,
            who_region: None,
            population: None,
        }
    }

    pub fn with_continent(mut self, continent: Option<Continent>) -> Self {
        self.continent = continent;
        self
    }

    pub fn with_who_region(mut self, who_region: Option<WhoRegion>) -> Self {
        self.who_region = who_region;
        self
    }

    /// Fill a missing WHO region from the continent, if it is unambiguous
    fn deduce_who_region(&mut self) {
        if self.who_region.is_none() {
            if let Some(continent) = self.continent {
                self.who_region = WhoRegion::deduce_from_continent(continent);
            }
        }
    }
}

// ============================================================================
// COUNTRY CACHE
// ============================================================================

pub struct CountryCache {
    cache: EntityCache<String, CountryRef>,
    normalizer: NameNormalizer,
}

impl CountryCache {
    pub fn new(normalizer: NameNormalizer) -> Self {
        CountryCache {
            cache: EntityCache::new("country"),
            normalizer,
        }
    }

    /// Resolve (or create) the one Country for a raw source name.
    ///
    /// Precedence for continent and WHO region: special-case table, then
    /// the parsed inputs, then deduction from the continent. An existing
    /// entry only ever has missing fields filled in, never overwritten.
    pub fn get_or_create(
        &mut self,
        raw_name: &str,
        continent: Option<&str>,
        who_region: Option<&str>,
    ) -> Option<CountryRef> {
        let name = self.normalizer.clean_country_name(raw_name);
        if name.is_empty() {
            return None;
        }

        let parsed_continent = continent.and_then(|c| self.normalizer.clean_continent(c));
        let parsed_who_region = who_region.and_then(|w| self.normalizer.clean_who_region(w));

        if let Some(existing) = self.cache.get(&name) {
            self.complete_existing(&existing, parsed_continent, parsed_who_region);
            return Some(existing);
        }

        let mut country = Country::new(name.clone())
            .with_continent(self.normalizer.special_case_continent(&name).or(parsed_continent))
            .with_who_region(self.normalizer.special_case_who_region(&name).or(parsed_who_region));
        country.deduce_who_region();

        debug!(country = %name, continent = ?country.continent, who_region = ?country.who_region, "country created");

        let country = shared(country);
        self.cache.put(name, country.clone());
        Some(country)
    }

    fn complete_existing(
        &self,
        existing: &CountryRef,
        parsed_continent: Option<Continent>,
        parsed_who_region: Option<WhoRegion>,
    ) {
        let mut country = existing.borrow_mut();

        if country.continent.is_none() {
            country.continent = self
                .normalizer
                .special_case_continent(&country.name)
                .or(parsed_continent);
        }
        if country.who_region.is_none() {
            country.who_region = self
                .normalizer
                .special_case_who_region(&country.name)
                .or(parsed_who_region);
        }
        country.deduce_who_region();
    }

    pub fn get(&self, name: &str) -> Option<CountryRef> {
        self.cache.get(name)
    }

    /// Replace contents with managed (saved) instances, keyed by their names
    pub fn update_cache<I: IntoIterator<Item = CountryRef>>(&mut self, saved: I) {
        self.cache.clear();
        for country in saved {
            let key = country.borrow().name.clone();
            self.cache.put(key, country);
        }
    }

    pub fn snapshot(&self) -> std::collections::BTreeMap<String, CountryRef> {
        self.cache.snapshot()
    }

    pub fn size(&self) -> usize {
        self.cache.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn cache() -> CountryCache {
        CountryCache::new(NameNormalizer::new())
    }

    #[test]
    fn test_token_round_trip() {
        for continent in Continent::ALL {
            assert_eq!(Continent::from_token(continent.as_str()), Some(continent));
        }
        assert_eq!(Continent::from_token("north_america"), Some(Continent::NorthAmerica));
        assert_eq!(WhoRegion::from_token("south_east_asia"), Some(WhoRegion::SouthEastAsia));
        assert_eq!(WhoRegion::from_token("Nowhere"), None);
    }

    #[test]
    fn test_who_region_deduction_table() {
        assert_eq!(WhoRegion::deduce_from_continent(Continent::NorthAmerica), Some(WhoRegion::Americas));
        assert_eq!(WhoRegion::deduce_from_continent(Continent::SouthAmerica), Some(WhoRegion::Americas));
        assert_eq!(WhoRegion::deduce_from_continent(Continent::Africa), Some(WhoRegion::Africa));
        assert_eq!(WhoRegion::deduce_from_continent(Continent::Europe), Some(WhoRegion::Europe));
        assert_eq!(WhoRegion::deduce_from_continent(Continent::Asia), None);
        assert_eq!(WhoRegion::deduce_from_continent(Continent::Oceania), None);
    }

    #[test]
    fn test_empty_name_yields_nothing() {
        let mut countries = cache();

        assert!(countries.get_or_create("", None, None).is_none());
        assert!(countries.get_or_create("   ", Some("Europe"), None).is_none());
        assert_eq!(countries.size(), 0);
    }

    #[test]
    fn test_special_case_beats_source_values() {
        let mut countries = cache();

        let china = countries
            .get_or_create("China", Some("Europe"), Some("Africa"))
            .unwrap();

        assert_eq!(china.borrow().continent, Some(Continent::Asia));
        assert_eq!(china.borrow().who_region, Some(WhoRegion::WesternPacific));
    }

    #[test]
    fn test_parsed_values_and_deduction() {
        let mut countries = cache();

        let brazil = countries.get_or_create("Brazil", Some("South America"), None).unwrap();
        assert_eq!(brazil.borrow().continent, Some(Continent::SouthAmerica));
        assert_eq!(brazil.borrow().who_region, Some(WhoRegion::Americas));

        let thailand = countries.get_or_create("Thailand", Some("Asia"), None).unwrap();
        assert_eq!(thailand.borrow().continent, Some(Continent::Asia));
        assert_eq!(thailand.borrow().who_region, None);
    }

    #[test]
    fn test_existing_country_is_completed_not_overwritten() {
        let mut countries = cache();

        let first = countries.get_or_create("Spain", None, None).unwrap();
        assert_eq!(first.borrow().continent, None);

        let second = countries.get_or_create("Spain", Some("Europe"), None).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(first.borrow().continent, Some(Continent::Europe));
        assert_eq!(first.borrow().who_region, Some(WhoRegion::Europe));

        // later conflicting input does not overwrite
        countries.get_or_create("Spain", Some("Asia"), Some("Africa"));
        assert_eq!(first.borrow().continent, Some(Continent::Europe));
        assert_eq!(first.borrow().who_region, Some(WhoRegion::Europe));
    }

    #[test]
    fn test_update_cache_rekeys_by_name() {
        let mut countries = cache();
        countries.get_or_create("Peru", None, None);

        let saved = shared(Country {
            id: Some(3),
            ..Country::new("Peru")
        });
        countries.update_cache(vec![saved.clone()]);

        let resolved = countries.get_or_create("Peru", None, None).unwrap();
        assert!(Rc::ptr_eq(&resolved, &saved));
        assert_eq!(resolved.borrow().id, Some(3));
        assert_eq!(countries.size(), 1);
    }
}
