// ⚙️ Run configuration - optional TOML file, every field defaulted

use crate::db::{validate_table_name, DEFAULT_TABLE};
use crate::error::{EtlError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Looked up in the working directory when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "spending-etl.toml";

/// Years the upload contract accepts
pub const SUPPORTED_YEARS: [i32; 6] = [2020, 2021, 2022, 2023, 2024, 2025];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    /// Directory holding the per-state CSV exports and uploads
    pub csv_dir: PathBuf,
    pub database_path: PathBuf,
    pub table_name: String,
    pub years: Vec<i32>,
    /// Year for files whose name carries none
    pub default_year: i32,
}

impl Default for EtlConfig {
    fn default() -> Self {
        EtlConfig {
            csv_dir: PathBuf::from("csvs"),
            database_path: PathBuf::from("database/despesas_brasil.db"),
            table_name: DEFAULT_TABLE.to_string(),
            years: SUPPORTED_YEARS.to_vec(),
            default_year: 2024,
        }
    }
}

impl EtlConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EtlConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Explicit path must exist; otherwise the default file is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_table_name(&self.table_name)?;

        if self.years.is_empty() {
            return Err(EtlError::InvalidConfig("years must not be empty".to_string()));
        }
        if let Some(year) = self.years.iter().find(|y| !(1900..=2100).contains(*y)) {
            return Err(EtlError::InvalidConfig(format!("year {} is out of range", year)));
        }
        if !(1900..=2100).contains(&self.default_year) {
            return Err(EtlError::InvalidConfig(format!(
                "default_year {} is out of range",
                self.default_year
            )));
        }
        Ok(())
    }

    pub fn is_supported_year(&self, year: i32) -> bool {
        self.years.contains(&year)
    }
}
