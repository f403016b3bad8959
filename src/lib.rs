// Epidemic ETL - Core Library
// Reference-data engine for the multi-source epidemic CSV import:
// normalization, get-or-create caches, persistence + reconciliation

pub mod error;
pub mod logging;
pub mod config;
pub mod normalizer;     // Name cleaning, aliases, skip-list, special cases
pub mod entities;       // Country → Region → Location, Disease, DiseaseCase
pub mod cache;          // EntityCache + CacheManager facade
pub mod db;             // SQLite schema + EntityStore
pub mod persistence;    // Bulk save + cache reconciliation
pub mod parser;         // Four source CSV formats
pub mod mapper;         // Parsed rows → entities
pub mod importer;       // Run orchestration

// Re-export commonly used types
pub use error::{EtlError, EtlResult, RowError};
pub use config::ImportConfig;
pub use normalizer::NameNormalizer;
pub use entities::{
    Continent, Country, CountryCache, WhoRegion,
    Region, RegionCache,
    Location, LocationCache,
    Disease, DiseaseCache, DiseaseCase,
};
pub use cache::{CacheCounts, CacheManager, EntityCache};
pub use db::{setup_database, EntityCounts, EntityStore, SqliteStore};
pub use persistence::PersistenceHelper;
pub use parser::{
    detect_source, parse_file, SourceKind, SourceParser,
    WorldometerParser, CovidCompleteParser, FullGroupedParser, UsaCountyParser,
};
pub use mapper::{RowMapper, WorldometerMapper, CovidCompleteMapper, FullGroupedMapper, UsaCountyMapper};
pub use importer::{ImportRunner, PassReport, PassStatus, RunSummary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
