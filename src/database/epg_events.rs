use crate::errors::IngestResult;
use crate::models::*;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{Executor, QueryBuilder, Row, Sqlite};
use tracing::debug;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Remove every stored event of one channel on one local date.
pub async fn delete_bucket<'e, E>(executor: E, bucket: &ChannelDateBucket) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM epg_events WHERE channel_id = ? AND epg_date = ?")
        .bind(bucket.channel_id)
        .bind(bucket.date.format(DATE_FORMAT).to_string())
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

pub async fn insert_event<'e, E>(executor: E, event: &ProgramEvent) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO epg_events (channel_id, epg_date, title, description, date_start, date_stop,
             utc_start, utc_stop, genres, broadcast_genre, min_age, create_year, actors, directed, country)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(event.channel_id)
    .bind(event.local_start.date().format(DATE_FORMAT).to_string())
    .bind(&event.title)
    .bind(&event.description)
    .bind(event.local_start.format(DATETIME_FORMAT).to_string())
    .bind(event.local_stop.format(DATETIME_FORMAT).to_string())
    .bind(event.utc_start.format(DATETIME_FORMAT).to_string())
    .bind(event.utc_stop.format(DATETIME_FORMAT).to_string())
    .bind(&event.genres)
    .bind(&event.broadcast_genre)
    .bind(event.min_age)
    .bind(&event.create_year)
    .bind(&event.actors)
    .bind(&event.directed)
    .bind(&event.country)
    .execute(executor)
    .await?;

    Ok(())
}

fn parse_stored_datetime(value: &str) -> Result<NaiveDateTime, sqlx::Error> {
    NaiveDateTime::parse_from_str(value, DATETIME_FORMAT).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

impl crate::database::Database {
    /// Stamp every distribution stream carrying one of `channel_ids` as freshly updated.
    pub async fn touch_streams_for_channels(&self, channel_ids: &[i64]) -> Result<u64, sqlx::Error> {
        if channel_ids.is_empty() {
            return Ok(0);
        }

        let mut query = QueryBuilder::<Sqlite>::new(
            "UPDATE dvb_streams SET epg_updated = CURRENT_TIMESTAMP WHERE id IN \
             (SELECT DISTINCT stream_id FROM dvb_stream_channels WHERE channel_id IN (",
        );
        let mut ids = query.separated(", ");
        for channel_id in channel_ids {
            ids.push_bind(*channel_id);
        }
        ids.push_unseparated("))");

        let result = query.build().execute(&self.pool).await?;
        debug!(
            "Marked {} streams updated for {} channels",
            result.rows_affected(),
            channel_ids.len()
        );
        Ok(result.rows_affected())
    }

    /// Delete every event whose local date precedes `cutoff`.
    pub async fn purge_events_before(&self, cutoff: NaiveDate) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM epg_events WHERE epg_date < ?")
            .bind(cutoff.format(DATE_FORMAT).to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Events of a channel starting at or after `from`, ordered by start.
    pub async fn list_guide_entries(
        &self,
        channel_id: i64,
        from: NaiveDateTime,
    ) -> IngestResult<Vec<GuideEntry>> {
        let rows = sqlx::query(
            "SELECT date_start, date_stop, title, description, genres, min_age,
                    create_year, actors, directed, country
             FROM epg_events WHERE channel_id = ? AND date_start >= ?
             ORDER BY date_start",
        )
        .bind(channel_id)
        .bind(from.format(DATETIME_FORMAT).to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let text = |column: &str| row.get::<Option<String>, _>(column).unwrap_or_default();

            entries.push(GuideEntry {
                date_start: parse_stored_datetime(&row.get::<String, _>("date_start"))?,
                date_stop: parse_stored_datetime(&row.get::<String, _>("date_stop"))?,
                title: text("title"),
                description: text("description"),
                genres: text("genres"),
                min_age: row
                    .get::<Option<i32>, _>("min_age")
                    .map(|age| age.to_string())
                    .unwrap_or_default(),
                create_year: text("create_year"),
                actors: text("actors"),
                directed: text("directed"),
                country: text("country"),
            });
        }

        Ok(entries)
    }
}
