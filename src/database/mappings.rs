use crate::errors::IngestResult;
use sqlx::Row;

impl super::Database {
    /// Channel mapping rows `(epg_code, channel_id)` for a source, in insertion order.
    pub async fn get_channel_mapping_rows(&self, source_id: i64) -> IngestResult<Vec<(String, i64)>> {
        let rows = sqlx::query(
            "SELECT epg_code, channel_id FROM epg_channel_mappings
             WHERE source_id = ? ORDER BY id",
        )
        .bind(source_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| (row.get("epg_code"), row.get("channel_id")))
            .collect())
    }

    /// Genre mapping rows `(source_genre, genre_id)` for a source, in insertion order.
    pub async fn get_genre_mapping_rows(&self, source_id: i64) -> IngestResult<Vec<(String, i64)>> {
        let rows = sqlx::query(
            "SELECT source_genre, genre_id FROM epg_genre_mappings
             WHERE source_id = ? ORDER BY id",
        )
        .bind(source_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| (row.get("source_genre"), row.get("genre_id")))
            .collect())
    }
}
