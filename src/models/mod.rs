use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod epg_source;

/// A configured program-guide feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EpgSource {
    pub id: i64,
    pub name: String,
    pub parse_mode: ParseMode,
    pub local_file: String,
    /// Excluded from automated runs; only loaded when requested by name.
    pub hand_only: bool,
}

/// Feed format a source is declared with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    Xmltv,
    /// Declared by the legacy schema; ingestion rejects it.
    A4on,
    /// Any code the loader does not know; ingestion rejects it.
    Unknown(i64),
}

/// A canonical program event ready to be stored.
///
/// Text fields are already capped and cleaned; `None` is stored as NULL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgramEvent {
    pub channel_id: i64,
    pub title: Option<String>,
    pub description: Option<String>,
    pub local_start: NaiveDateTime,
    pub local_stop: NaiveDateTime,
    pub utc_start: DateTime<Utc>,
    pub utc_stop: DateTime<Utc>,
    pub actors: Option<String>,
    pub country: Option<String>,
    pub create_year: Option<String>,
    pub directed: Option<String>,
    /// Free-text genre as supplied by the feed.
    pub genres: Option<String>,
    /// Broadcast genre code, explicit or mapped from `genres`.
    pub broadcast_genre: Option<String>,
    pub min_age: Option<i32>,
}

impl ProgramEvent {
    pub fn bucket(&self) -> ChannelDateBucket {
        ChannelDateBucket {
            channel_id: self.channel_id,
            date: self.local_start.date(),
        }
    }

    /// Short description used in logs and error messages.
    pub fn summary(&self) -> String {
        format!(
            "channel {} at {} '{}'",
            self.channel_id,
            self.local_start.format("%Y-%m-%d %H:%M:%S"),
            self.title.as_deref().unwrap_or("")
        )
    }
}

/// Unit of replacement: one channel on one local calendar date.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelDateBucket {
    pub channel_id: i64,
    pub date: NaiveDate,
}

/// Stored event as handed to guide exporters.
///
/// Absent values are substituted with empty strings so exporters never
/// have to deal with NULLs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuideEntry {
    pub date_start: NaiveDateTime,
    pub date_stop: NaiveDateTime,
    pub title: String,
    pub description: String,
    pub genres: String,
    pub min_age: String,
    pub create_year: String,
    pub actors: String,
    pub directed: String,
    pub country: String,
}

/// Outcome of loading a single source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceReport {
    pub source_id: i64,
    pub source_name: String,
    pub parsed: usize,
    pub stored: usize,
    pub unmapped: usize,
    pub malformed: usize,
    /// Programmes superseded by a later one on the same channel and start.
    pub duplicates: usize,
    pub buckets: usize,
    pub error: Option<String>,
}

impl SourceReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of a whole loader run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub sources: Vec<SourceReport>,
    pub purged: u64,
}

impl RunSummary {
    pub fn failed_sources(&self) -> usize {
        self.sources.iter().filter(|s| !s.succeeded()).count()
    }
}
