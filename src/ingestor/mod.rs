use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::{IngestionConfig, WriteMode};
use crate::database::Database;
use crate::errors::{IngestError, IngestResult};
use crate::models::*;
use crate::utils::time::utc_offset_seconds;

pub mod bucket_replacer;
pub mod driver;
pub mod mapper;
pub mod normalizer;
pub mod rating;
pub mod xmltv_parser;

pub use bucket_replacer::BucketReplacer;
pub use driver::SourceDriver;
pub use mapper::IdentifierMapper;
pub use normalizer::{EventNormalizer, NormalizedFeed, TextLimits};

#[async_trait]
pub trait SourceIngestor {
    /// Load one source's feed into the store, replacing the buckets it covers.
    async fn ingest(&self, source: &EpgSource) -> IngestResult<SourceReport>;
}

/// Loads sources according to their parse mode.
pub struct EpgIngestor {
    database: Database,
    utc_offset_seconds: i32,
    limits: TextLimits,
    write_mode: WriteMode,
}

impl EpgIngestor {
    /// Resolve the process timezone offset once, for the whole run.
    pub fn new(database: Database, config: &IngestionConfig) -> IngestResult<Self> {
        let tz = config.timezone()?;
        let offset = utc_offset_seconds(&tz, Utc::now());
        info!("Using timezone {} (UTC offset {}s)", tz, offset);
        Ok(Self::with_utc_offset(database, offset, config))
    }

    pub fn with_utc_offset(
        database: Database,
        utc_offset_seconds: i32,
        config: &IngestionConfig,
    ) -> Self {
        Self {
            database,
            utc_offset_seconds,
            limits: TextLimits::from(config),
            write_mode: config.write_mode,
        }
    }

    async fn ingest_xmltv(&self, source: &EpgSource) -> IngestResult<SourceReport> {
        let content = tokio::fs::read(&source.local_file).await.map_err(|e| {
            IngestError::feed_unreadable(
                &source.name,
                format!("cannot read '{}': {}", source.local_file, e),
            )
        })?;
        debug!("Read {} bytes from {}", content.len(), source.local_file);

        let nodes = xmltv_parser::parse_xmltv(&content)
            .map_err(|e| IngestError::feed_unreadable(&source.name, e.to_string()))?;

        let mapper = IdentifierMapper::load(&self.database, source.id).await?;
        if mapper.channels.is_empty() {
            warn!(
                "Source '{}' has no channel mappings; every programme will be dropped",
                source.name
            );
        }
        debug!(
            "Source '{}': {} channel mappings, {} genre mappings",
            source.name,
            mapper.channels.len(),
            mapper.genres.len()
        );

        let feed = EventNormalizer::new(&mapper, self.utc_offset_seconds, self.limits)
            .normalize_all(&nodes);

        let outcome = BucketReplacer::new(&self.database, self.write_mode)
            .replace(&feed)
            .await?;

        info!(
            "Loaded source '{}': {} programmes, {} stored, {} unmapped, {} malformed, {} duplicates, {} buckets, {} streams updated",
            source.name,
            nodes.len(),
            outcome.inserted,
            feed.unmapped,
            feed.malformed,
            feed.duplicates,
            feed.buckets.len(),
            outcome.streams_touched
        );

        Ok(SourceReport {
            source_id: source.id,
            source_name: source.name.clone(),
            parsed: nodes.len(),
            stored: outcome.inserted,
            unmapped: feed.unmapped,
            malformed: feed.malformed,
            duplicates: feed.duplicates,
            buckets: feed.buckets.len(),
            error: None,
        })
    }
}

#[async_trait]
impl SourceIngestor for EpgIngestor {
    async fn ingest(&self, source: &EpgSource) -> IngestResult<SourceReport> {
        match source.parse_mode {
            ParseMode::Xmltv => self.ingest_xmltv(source).await,
            mode @ (ParseMode::A4on | ParseMode::Unknown(_)) => Err(
                IngestError::unsupported_parse_mode(&source.name, mode.to_string()),
            ),
        }
    }
}
