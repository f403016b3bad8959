// 🧹 Name Normalizer - make heterogeneous source strings converge
//
// Problem solved:
// - "United States", "US" → "USA" (same Country key in every source)
// - "WesternPacific", "Western Pacific" → WhoRegion::WesternPacific
// - Cruise ships ("Diamond Princess") are not geography → skipped entirely
// - Countries whose continent/WHO region the sources never provide get
//   hardcoded overrides

use crate::entities::{Continent, WhoRegion};
use std::collections::{HashMap, HashSet};
use tracing::warn;

// ============================================================================
// STATIC TABLES
// ============================================================================

const COUNTRY_ALIASES: &[(&str, &str)] = &[
    ("United States", "USA"),
    ("United States of America", "USA"),
    ("US", "USA"),
    ("United Kingdom", "UK"),
    ("South Korea", "Korea, South"),
    ("North Korea", "Korea, North"),
    ("Czech Republic", "Czechia"),
    ("Ivory Coast", "Côte d'Ivoire"),
    ("Cote d'Ivoire", "Côte d'Ivoire"),
    ("Republic of the Congo", "Congo"),
    ("Democratic Republic of the Congo", "Congo, Democratic Republic of the"),
];

const CONTINENT_SYNONYMS: &[(&str, Continent)] = &[
    ("Africa", Continent::Africa),
    ("Asia", Continent::Asia),
    ("Europe", Continent::Europe),
    ("Australia/Oceania", Continent::Oceania),
    ("Australia", Continent::Oceania),
    ("North America", Continent::NorthAmerica),
    ("South America", Continent::SouthAmerica),
];

const WHO_REGION_SYNONYMS: &[(&str, WhoRegion)] = &[
    ("Africa", WhoRegion::Africa),
    ("Americas", WhoRegion::Americas),
    ("EasternMediterranean", WhoRegion::EasternMediterranean),
    ("Europe", WhoRegion::Europe),
    ("South-EastAsia", WhoRegion::SouthEastAsia),
    ("SouthEastAsia", WhoRegion::SouthEastAsia),
    ("WesternPacific", WhoRegion::WesternPacific),
];

/// Pseudo-locations that must never enter the geography hierarchy
const SKIP_LIST: &[&str] = &["Diamond Princess", "Grand Princess", "MS Zaandam"];

/// Countries whose continent/WHO region cannot be derived from source data
const SPECIAL_CASES: &[(&str, Continent, WhoRegion)] = &[
    ("China", Continent::Asia, WhoRegion::WesternPacific),
    ("Taiwan*", Continent::Asia, WhoRegion::WesternPacific),
    ("Korea, South", Continent::Asia, WhoRegion::WesternPacific),
    ("Japan", Continent::Asia, WhoRegion::WesternPacific),
    ("Australia", Continent::Oceania, WhoRegion::WesternPacific),
    ("New Zealand", Continent::Oceania, WhoRegion::WesternPacific),
    ("India", Continent::Asia, WhoRegion::SouthEastAsia),
    ("Burma", Continent::Asia, WhoRegion::SouthEastAsia),
    ("West Bank and Gaza", Continent::Asia, WhoRegion::EasternMediterranean),
    ("Kosovo", Continent::Europe, WhoRegion::Europe),
    ("Holy See", Continent::Europe, WhoRegion::Europe),
    ("Western Sahara", Continent::Africa, WhoRegion::Africa),
];

// ============================================================================
// NAME NORMALIZER
// ============================================================================

#[derive(Debug, Clone)]
pub struct NameNormalizer {
    country_aliases: HashMap<String, String>,
    /// Keyed by lowercased synonym
    continent_synonyms: HashMap<String, Continent>,
    /// Keyed by lowercased synonym
    who_region_synonyms: HashMap<String, WhoRegion>,
    skip_list: HashSet<String>,
    special_cases: HashMap<String, (Continent, WhoRegion)>,
}

impl NameNormalizer {
    pub fn new() -> Self {
        NameNormalizer {
            country_aliases: COUNTRY_ALIASES
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            continent_synonyms: CONTINENT_SYNONYMS
                .iter()
                .map(|(name, continent)| (name.to_lowercase(), *continent))
                .collect(),
            who_region_synonyms: WHO_REGION_SYNONYMS
                .iter()
                .map(|(name, region)| (name.to_lowercase(), *region))
                .collect(),
            skip_list: SKIP_LIST.iter().map(|s| s.to_string()).collect(),
            special_cases: SPECIAL_CASES
                .iter()
                .map(|(name, continent, region)| (name.to_string(), (*continent, *region)))
                .collect(),
        }
    }

    /// Trim, then resolve spelling variants to the canonical country name
    pub fn clean_country_name(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        match self.country_aliases.get(trimmed) {
            Some(canonical) => canonical.clone(),
            None => trimmed.to_string(),
        }
    }

    pub fn clean_region_name(&self, raw: &str) -> String {
        raw.trim().to_string()
    }

    pub fn clean_location_name(&self, raw: &str) -> String {
        raw.trim().to_string()
    }

    /// A positive result means: produce no entity for this record
    pub fn is_in_skip_list(&self, name: &str) -> bool {
        self.skip_list.contains(name.trim())
    }

    /// Synonym table first, then the enum's canonical tokens
    pub fn clean_continent(&self, raw: &str) -> Option<Continent> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        if let Some(continent) = self.continent_synonyms.get(&trimmed.to_lowercase()) {
            return Some(*continent);
        }

        let parsed = Continent::from_token(&to_token(trimmed));
        if parsed.is_none() {
            warn!(value = trimmed, "unrecognised continent, leaving it unset");
        }
        parsed
    }

    /// Synonym table first, then the enum's canonical tokens
    pub fn clean_who_region(&self, raw: &str) -> Option<WhoRegion> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        if let Some(region) = self.who_region_synonyms.get(&trimmed.to_lowercase()) {
            return Some(*region);
        }

        let parsed = WhoRegion::from_token(&to_token(trimmed));
        if parsed.is_none() {
            warn!(value = trimmed, "unrecognised WHO region, leaving it unset");
        }
        parsed
    }

    pub fn special_case_continent(&self, country_name: &str) -> Option<Continent> {
        self.special_cases.get(country_name).map(|(continent, _)| *continent)
    }

    pub fn special_case_who_region(&self, country_name: &str) -> Option<WhoRegion> {
        self.special_cases.get(country_name).map(|(_, region)| *region)
    }
}

impl Default for NameNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// "South-East Asia" → "South_East_Asia"
fn to_token(value: &str) -> String {
    value
        .split(|c: char| c == ' ' || c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_country_alias_resolution() {
        let normalizer = NameNormalizer::new();

        assert_eq!(normalizer.clean_country_name("United States"), "USA");
        assert_eq!(normalizer.clean_country_name("US"), "USA");
        assert_eq!(normalizer.clean_country_name("Czech Republic"), "Czechia");
        assert_eq!(normalizer.clean_country_name("Ivory Coast"), "Côte d'Ivoire");
        assert_eq!(normalizer.clean_country_name(" United Kingdom "), "UK");
    }

    #[test]
    fn test_unmapped_country_is_trimmed() {
        let normalizer = NameNormalizer::new();

        assert_eq!(normalizer.clean_country_name(" Peru "), "Peru");
        assert_eq!(normalizer.clean_country_name("USA"), "USA");
        assert_eq!(normalizer.clean_region_name("  California "), "California");
        assert_eq!(normalizer.clean_location_name("Kings\t"), "Kings");
    }

    #[test]
    fn test_skip_list() {
        let normalizer = NameNormalizer::new();

        assert!(normalizer.is_in_skip_list("Diamond Princess"));
        assert!(normalizer.is_in_skip_list("Grand Princess"));
        assert!(!normalizer.is_in_skip_list("France"));
        assert!(!normalizer.is_in_skip_list(""));
    }

    #[test]
    fn test_clean_continent() {
        let normalizer = NameNormalizer::new();

        // Synonyms, case-insensitive
        assert_eq!(normalizer.clean_continent("Australia/Oceania"), Some(Continent::Oceania));
        assert_eq!(normalizer.clean_continent("north america"), Some(Continent::NorthAmerica));

        // Canonical tokens
        assert_eq!(normalizer.clean_continent("SOUTH_AMERICA"), Some(Continent::SouthAmerica));
        assert_eq!(normalizer.clean_continent("Antarctica"), Some(Continent::Antarctica));

        // Misses are absent, not errors
        assert_eq!(normalizer.clean_continent("Atlantis"), None);
        assert_eq!(normalizer.clean_continent(""), None);
    }

    #[test]
    fn test_clean_who_region() {
        let normalizer = NameNormalizer::new();

        assert_eq!(normalizer.clean_who_region("WesternPacific"), Some(WhoRegion::WesternPacific));
        assert_eq!(normalizer.clean_who_region("Western Pacific"), Some(WhoRegion::WesternPacific));
        assert_eq!(normalizer.clean_who_region("South-East Asia"), Some(WhoRegion::SouthEastAsia));
        assert_eq!(
            normalizer.clean_who_region("Eastern Mediterranean"),
            Some(WhoRegion::EasternMediterranean)
        );
        assert_eq!(normalizer.clean_who_region("americas"), Some(WhoRegion::Americas));
        assert_eq!(normalizer.clean_who_region("Middle Earth"), None);
    }

    #[test]
    fn test_special_cases() {
        let normalizer = NameNormalizer::new();

        assert_eq!(normalizer.special_case_continent("China"), Some(Continent::Asia));
        assert_eq!(normalizer.special_case_who_region("China"), Some(WhoRegion::WesternPacific));
        assert_eq!(normalizer.special_case_continent("Kosovo"), Some(Continent::Europe));
        assert_eq!(normalizer.special_case_who_region("Kosovo"), Some(WhoRegion::Europe));
        assert_eq!(normalizer.special_case_continent("Peru"), None);
    }
}
