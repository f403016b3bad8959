// 💾 Store layer - SQLite schema + the bulk-save collaborator
//
// `EntityStore` is what the persistence phase talks to. Every save takes
// the cached (possibly transient) handles and returns NEW handles that
// carry database identity; callers must swap them into their caches.

use crate::entities::{
    shared, Continent, Country, CountryRef, Disease, DiseaseCase, DiseaseRef, Location,
    LocationRef, Region, RegionRef, WhoRegion,
};
use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

// ============================================================================
// STORE TRAIT
// ============================================================================

pub trait EntityStore {
    fn save_countries(&mut self, countries: &[CountryRef]) -> Result<Vec<CountryRef>>;

    /// Each region's country must already carry an id
    fn save_regions(&mut self, regions: &[RegionRef]) -> Result<Vec<RegionRef>>;

    /// Each location's region must already carry an id
    fn save_locations(&mut self, locations: &[LocationRef]) -> Result<Vec<LocationRef>>;

    fn save_diseases(&mut self, diseases: &[DiseaseRef]) -> Result<Vec<DiseaseRef>>;

    fn find_disease_by_name(&mut self, name: &str) -> Result<Option<DiseaseRef>>;

    /// One committed transaction per call; returns rows written
    fn save_disease_cases(&mut self, cases: &[DiseaseCase]) -> Result<usize>;

    /// Remove every row, children first
    fn delete_all(&mut self) -> Result<()>;

    fn counts(&mut self) -> Result<EntityCounts>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EntityCounts {
    pub countries: i64,
    pub regions: i64,
    pub locations: i64,
    pub diseases: i64,
    pub disease_cases: i64,
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS country (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            continent TEXT,
            who_region TEXT,
            population INTEGER
        );

        CREATE TABLE IF NOT EXISTS region (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            country_id INTEGER NOT NULL REFERENCES country(id),
            name TEXT NOT NULL,
            UNIQUE(country_id, name)
        );

        CREATE TABLE IF NOT EXISTS location (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            region_id INTEGER NOT NULL REFERENCES region(id),
            name TEXT NOT NULL,
            UNIQUE(region_id, name)
        );

        CREATE TABLE IF NOT EXISTS disease (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL
        );

        CREATE TABLE IF NOT EXISTS disease_case (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            disease_id INTEGER NOT NULL REFERENCES disease(id),
            location_id INTEGER NOT NULL REFERENCES location(id),
            date TEXT NOT NULL,
            confirmed INTEGER NOT NULL DEFAULT 0,
            deaths INTEGER NOT NULL DEFAULT 0,
            recovered INTEGER NOT NULL DEFAULT 0,
            active INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_case_location_date ON disease_case(location_id, date);
        CREATE INDEX IF NOT EXISTS idx_region_country ON region(country_id);
        CREATE INDEX IF NOT EXISTS idx_location_region ON location(region_id);",
    )?;

    Ok(())
}

// ============================================================================
// SQLITE STORE
// ============================================================================

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a database file; WAL journal for crash recovery
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        setup_database(&conn)?;
        info!(db = %path.display(), "database ready");
        Ok(SqliteStore { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(SqliteStore { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn count(&self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table);
        Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
    }
}

impl EntityStore for SqliteStore {
    fn save_countries(&mut self, countries: &[CountryRef]) -> Result<Vec<CountryRef>> {
        let tx = self.conn.transaction()?;
        let mut saved = Vec::with_capacity(countries.len());

        for handle in countries {
            let country = handle.borrow();
            let continent = country.continent.map(|c| c.as_str());
            let who_region = country.who_region.map(|w| w.as_str());

            let id: i64 = match country.id {
                Some(id) => {
                    tx.execute(
                        "UPDATE country SET name = ?1, continent = ?2, who_region = ?3, population = ?4
                         WHERE id = ?5",
                        params![country.name, continent, who_region, country.population, id],
                    )?;
                    id
                }
                None => tx.query_row(
                    "INSERT INTO country (name, continent, who_region, population)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(name) DO UPDATE SET
                        continent = COALESCE(excluded.continent, country.continent),
                        who_region = COALESCE(excluded.who_region, country.who_region),
                        population = COALESCE(excluded.population, country.population)
                     RETURNING id",
                    params![country.name, continent, who_region, country.population],
                    |row| row.get(0),
                )?,
            };

            saved.push(shared(Country {
                id: Some(id),
                ..country.clone()
            }));
        }

        tx.commit()?;
        debug!(count = saved.len(), "countries saved");
        Ok(saved)
    }

    fn save_regions(&mut self, regions: &[RegionRef]) -> Result<Vec<RegionRef>> {
        let tx = self.conn.transaction()?;
        let mut saved = Vec::with_capacity(regions.len());

        for handle in regions {
            let region = handle.borrow();
            let country_id = region
                .country_id()
                .ok_or_else(|| anyhow!("region '{}' references unsaved country '{}'", region.name, region.country_name()))?;

            let id: i64 = match region.id {
                Some(id) => {
                    tx.execute(
                        "UPDATE region SET country_id = ?1, name = ?2 WHERE id = ?3",
                        params![country_id, region.name, id],
                    )?;
                    id
                }
                None => tx.query_row(
                    "INSERT INTO region (country_id, name) VALUES (?1, ?2)
                     ON CONFLICT(country_id, name) DO UPDATE SET name = excluded.name
                     RETURNING id",
                    params![country_id, region.name],
                    |row| row.get(0),
                )?,
            };

            saved.push(shared(Region {
                id: Some(id),
                ..region.clone()
            }));
        }

        tx.commit()?;
        debug!(count = saved.len(), "regions saved");
        Ok(saved)
    }

    fn save_locations(&mut self, locations: &[LocationRef]) -> Result<Vec<LocationRef>> {
        let tx = self.conn.transaction()?;
        let mut saved = Vec::with_capacity(locations.len());

        for handle in locations {
            let location = handle.borrow();
            let region_id = location
                .region_id()
                .ok_or_else(|| anyhow!("location '{}' references unsaved region '{}'", location.name, location.region_key()))?;

            let id: i64 = match location.id {
                Some(id) => {
                    tx.execute(
                        "UPDATE location SET region_id = ?1, name = ?2 WHERE id = ?3",
                        params![region_id, location.name, id],
                    )?;
                    id
                }
                None => tx.query_row(
                    "INSERT INTO location (region_id, name) VALUES (?1, ?2)
                     ON CONFLICT(region_id, name) DO UPDATE SET name = excluded.name
                     RETURNING id",
                    params![region_id, location.name],
                    |row| row.get(0),
                )?,
            };

            saved.push(shared(Location {
                id: Some(id),
                ..location.clone()
            }));
        }

        tx.commit()?;
        debug!(count = saved.len(), "locations saved");
        Ok(saved)
    }

    fn save_diseases(&mut self, diseases: &[DiseaseRef]) -> Result<Vec<DiseaseRef>> {
        let tx = self.conn.transaction()?;
        let mut saved = Vec::with_capacity(diseases.len());

        for handle in diseases {
            let disease = handle.borrow();
            let id: i64 = match disease.id {
                Some(id) => {
                    tx.execute("UPDATE disease SET name = ?1 WHERE id = ?2", params![disease.name, id])?;
                    id
                }
                None => tx.query_row(
                    "INSERT INTO disease (name) VALUES (?1)
                     ON CONFLICT(name) DO UPDATE SET name = excluded.name
                     RETURNING id",
                    params![disease.name],
                    |row| row.get(0),
                )?,
            };

            saved.push(shared(Disease {
                id: Some(id),
                name: disease.name.clone(),
            }));
        }

        tx.commit()?;
        Ok(saved)
    }

    fn find_disease_by_name(&mut self, name: &str) -> Result<Option<DiseaseRef>> {
        let found = self
            .conn
            .query_row(
                "SELECT id, name FROM disease WHERE name = ?1",
                params![name],
                |row| {
                    Ok(Disease {
                        id: Some(row.get(0)?),
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;

        Ok(found.map(shared))
    }

    fn save_disease_cases(&mut self, cases: &[DiseaseCase]) -> Result<usize> {
        let tx = self.conn.transaction()?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO disease_case (disease_id, location_id, date, confirmed, deaths, recovered, active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;

            for case in cases {
                let disease_id = case
                    .disease
                    .borrow()
                    .id
                    .ok_or_else(|| anyhow!("case references unsaved disease '{}'", case.disease.borrow().name))?;
                let location_id = case
                    .location
                    .borrow()
                    .id
                    .ok_or_else(|| anyhow!("case references unsaved location '{}'", case.location.borrow().key()))?;

                stmt.execute(params![
                    disease_id,
                    location_id,
                    case.date.format("%Y-%m-%d").to_string(),
                    case.confirmed,
                    case.deaths,
                    case.recovered,
                    case.active,
                ])?;
            }
        }

        tx.commit()?;
        Ok(cases.len())
    }

    fn delete_all(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            "DELETE FROM disease_case;
             DELETE FROM location;
             DELETE FROM region;
             DELETE FROM country;
             DELETE FROM disease;",
        )?;
        tx.commit()?;
        info!("all tables cleared");
        Ok(())
    }

    fn counts(&mut self) -> Result<EntityCounts> {
        Ok(EntityCounts {
            countries: self.count("country")?,
            regions: self.count("region")?,
            locations: self.count("location")?,
            diseases: self.count("disease")?,
            disease_cases: self.count("disease_case")?,
        })
    }
}

// ============================================================================
// READ HELPERS
// ============================================================================

/// Load a stored country by name
pub fn load_country(conn: &Connection, name: &str) -> Result<Option<Country>> {
    let row = conn
        .query_row(
            "SELECT id, name, continent, who_region, population FROM country WHERE name = ?1",
            params![name],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<i64>>(4)?,
                ))
            },
        )
        .optional()?;

    Ok(row.map(|(id, name, continent, who_region, population)| Country {
        id: Some(id),
        name,
        continent: continent.as_deref().and_then(Continent::from_token),
        who_region: who_region.as_deref().and_then(WhoRegion::from_token),
        population,
    }))
}

/// Location names under a country, ordered
pub fn location_names_for_country(conn: &Connection, country: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT l.name FROM location l
         JOIN region r ON r.id = l.region_id
         JOIN country c ON c.id = r.country_id
         WHERE c.name = ?1
         ORDER BY l.name",
    )?;

    let names = stmt
        .query_map(params![country], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(names)
}
