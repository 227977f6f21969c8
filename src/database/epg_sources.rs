use crate::errors::IngestResult;
use crate::models::*;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::debug;

fn source_from_row(row: &SqliteRow) -> EpgSource {
    EpgSource {
        id: row.get("id"),
        name: row.get("name"),
        parse_mode: ParseMode::from(row.get::<i64, _>("parse_mode")),
        local_file: row.get("local_file"),
        hand_only: row.get("hand_only"),
    }
}

impl crate::database::Database {
    /// Sources taking part in unattended runs, ordered by name.
    pub async fn list_scheduled_epg_sources(&self) -> IngestResult<Vec<EpgSource>> {
        let rows = sqlx::query(
            "SELECT id, name, parse_mode, local_file, hand_only
             FROM epg_sources WHERE hand_only = 0 ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        let sources: Vec<EpgSource> = rows.iter().map(source_from_row).collect();
        debug!("Loaded {} scheduled EPG sources", sources.len());
        Ok(sources)
    }

    /// Look a source up by its display name, hand-only sources included.
    pub async fn get_epg_source_by_name(&self, name: &str) -> IngestResult<Option<EpgSource>> {
        let row = sqlx::query(
            "SELECT id, name, parse_mode, local_file, hand_only
             FROM epg_sources WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(source_from_row))
    }
}
