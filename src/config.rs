// ⚙️ Import configuration
//
// Defaults → optional JSON file → environment overrides

use crate::error::{EtlError, EtlResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_DATA_DIR: &str = "EPI_ETL_DATA_DIR";
pub const ENV_DB_PATH: &str = "EPI_ETL_DB_PATH";
pub const ENV_CASE_CHUNK_SIZE: &str = "EPI_ETL_CASE_CHUNK_SIZE";
pub const ENV_RESET: &str = "EPI_ETL_RESET";

pub const DEFAULT_CASE_CHUNK_SIZE: usize = 25_000;
pub const DEFAULT_DISEASE_NAME: &str = "COVID-19";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Directory holding the four source CSV files
    pub data_dir: PathBuf,

    /// SQLite database file
    pub db_path: PathBuf,

    /// DiseaseCase rows committed per transaction
    pub case_chunk_size: usize,

    /// Wipe all tables before the first pass
    pub reset_before_import: bool,

    /// Disease preloaded once per run and attached to every case
    pub disease_name: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        ImportConfig {
            data_dir: PathBuf::from("data"),
            db_path: PathBuf::from("epidemic.db"),
            case_chunk_size: DEFAULT_CASE_CHUNK_SIZE,
            reset_before_import: true,
            disease_name: DEFAULT_DISEASE_NAME.to_string(),
        }
    }
}

impl ImportConfig {
    /// Load from a JSON file; missing keys keep their defaults
    pub fn from_json_file(path: &Path) -> EtlResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;

        serde_json::from_str(&raw)
            .map_err(|e| EtlError::Config(format!("invalid config {}: {}", path.display(), e)))
    }

    /// Resolve the full configuration for the binary
    pub fn load(config_file: Option<&Path>) -> EtlResult<Self> {
        let config = match config_file {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };

        let config = config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from any key lookup (process env in production)
    pub fn apply_overrides<F>(mut self, lookup: F) -> EtlResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }

        if let Some(db) = lookup(ENV_DB_PATH) {
            self.db_path = PathBuf::from(db);
        }

        if let Some(chunk) = lookup(ENV_CASE_CHUNK_SIZE) {
            self.case_chunk_size = chunk.trim().parse().map_err(|_| {
                EtlError::Config(format!("{} must be a positive integer, got '{}'", ENV_CASE_CHUNK_SIZE, chunk))
            })?;
        }

        if let Some(reset) = lookup(ENV_RESET) {
            self.reset_before_import =
                matches!(reset.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }

        Ok(self)
    }

    pub fn validate(&self) -> EtlResult<()> {
        if self.case_chunk_size == 0 {
            return Err(EtlError::Config("case_chunk_size must be greater than 0".to_string()));
        }
        if self.disease_name.trim().is_empty() {
            return Err(EtlError::Config("disease_name must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn source_path(&self, file_name: &str) -> PathBuf {
        self.data_dir.join(file_name)
    }
}
