use anyhow::Result;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::errors::IngestError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub ingestion: IngestionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// IANA zone the feeds' wall-clock times are interpreted in.
    pub timezone: String,
    /// Events whose local date is older than today minus this many days are purged.
    pub retention_days: i64,
    #[serde(default)]
    pub write_mode: WriteMode,
    /// Character cap for every text column except the description.
    pub max_text_length: usize,
    pub max_description_length: usize,
}

/// How the bucket replacement is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Deletes and inserts of one source share a single transaction.
    #[default]
    PerSource,
    /// Every delete and insert commits on its own.
    PerStatement,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://./epg.db".to_string(),
                max_connections: Some(5),
            },
            ingestion: IngestionConfig::default(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            timezone: "Europe/Minsk".to_string(),
            retention_days: 8,
            write_mode: WriteMode::PerSource,
            max_text_length: 255,
            max_description_length: 4096,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());

        if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(&config_file)?;
            let config: Self = toml::from_str(&contents)?;
            config.ingestion.validate()?;
            Ok(config)
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(&config_file, contents)?;
            Ok(default_config)
        }
    }
}

impl IngestionConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        self.timezone()?;
        if self.retention_days < 0 {
            return Err(IngestError::configuration(format!(
                "retention_days must not be negative, got {}",
                self.retention_days
            )));
        }
        if self.max_text_length == 0 || self.max_description_length == 0 {
            return Err(IngestError::configuration(
                "text length limits must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn timezone(&self) -> Result<Tz, IngestError> {
        self.timezone.parse::<Tz>().map_err(|_| {
            IngestError::configuration(format!("unknown timezone '{}'", self.timezone))
        })
    }
}
