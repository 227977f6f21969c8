//! Per-source identifier mapping tables
//!
//! Built once per source before any event is normalized and owned by the
//! ingestion of that source. Lookups are exact and case-sensitive.

use std::collections::HashMap;

use crate::database::Database;
use crate::errors::IngestResult;

/// External channel code to internal channel id.
#[derive(Debug, Clone, Default)]
pub struct ChannelMap {
    codes: HashMap<String, i64>,
}

impl ChannelMap {
    /// Build from `(code, channel_id)` rows; a later row for the same code wins.
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (String, i64)>,
    {
        Self {
            codes: rows.into_iter().collect(),
        }
    }

    pub fn resolve(&self, external_code: &str) -> Option<i64> {
        self.codes.get(external_code).copied()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Free-text genre label to broadcast genre id.
#[derive(Debug, Clone, Default)]
pub struct GenreMap {
    labels: HashMap<String, i64>,
}

impl GenreMap {
    /// Build from `(label, genre_id)` rows; a later row for the same label wins.
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (String, i64)>,
    {
        Self {
            labels: rows.into_iter().collect(),
        }
    }

    pub fn resolve(&self, external_label: &str) -> Option<i64> {
        self.labels.get(external_label).copied()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }
}

/// Both mapping tables of one source.
#[derive(Debug, Clone, Default)]
pub struct IdentifierMapper {
    pub channels: ChannelMap,
    pub genres: GenreMap,
}

impl IdentifierMapper {
    pub async fn load(database: &Database, source_id: i64) -> IngestResult<Self> {
        let channels = ChannelMap::from_rows(database.get_channel_mapping_rows(source_id).await?);
        let genres = GenreMap::from_rows(database.get_genre_mapping_rows(source_id).await?);
        Ok(Self { channels, genres })
    }

    pub fn resolve_channel(&self, external_code: &str) -> Option<i64> {
        self.channels.resolve(external_code)
    }

    pub fn resolve_genre(&self, external_label: &str) -> Option<i64> {
        self.genres.resolve(external_label)
    }
}
