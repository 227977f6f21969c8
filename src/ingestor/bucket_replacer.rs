//! Replaces stored events bucket by bucket.
//!
//! Every (channel, date) bucket touched by a feed is emptied and then
//! refilled with exactly the feed's events, so re-running the same feed
//! converges to the same rows. Buckets the feed does not mention are left
//! alone.

use std::collections::BTreeSet;
use tracing::{debug, info};

use super::normalizer::NormalizedFeed;
use crate::config::WriteMode;
use crate::database::epg_events::{delete_bucket, insert_event};
use crate::database::Database;
use crate::errors::{IngestError, IngestResult};
use crate::models::{ChannelDateBucket, ProgramEvent};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaceOutcome {
    pub deleted: u64,
    pub inserted: usize,
    pub streams_touched: u64,
}

pub struct BucketReplacer<'a> {
    database: &'a Database,
    write_mode: WriteMode,
}

fn delete_failed(bucket: &ChannelDateBucket, e: sqlx::Error) -> IngestError {
    IngestError::store_write(
        "delete bucket",
        format!("channel {} on {}: {}", bucket.channel_id, bucket.date, e),
    )
}

fn insert_failed(event: &ProgramEvent, e: sqlx::Error) -> IngestError {
    IngestError::store_write("insert event", format!("{}: {}", event.summary(), e))
}

impl<'a> BucketReplacer<'a> {
    pub fn new(database: &'a Database, write_mode: WriteMode) -> Self {
        Self {
            database,
            write_mode,
        }
    }

    pub async fn replace(&self, feed: &NormalizedFeed) -> IngestResult<ReplaceOutcome> {
        let (deleted, inserted) = match self.write_mode {
            WriteMode::PerSource => self.replace_in_transaction(feed).await?,
            WriteMode::PerStatement => self.replace_per_statement(feed).await?,
        };

        info!("update streams");
        let channel_ids: Vec<i64> = feed
            .buckets
            .iter()
            .map(|bucket| bucket.channel_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let streams_touched = self
            .database
            .touch_streams_for_channels(&channel_ids)
            .await
            .map_err(|e| IngestError::store_write("update streams", e.to_string()))?;

        Ok(ReplaceOutcome {
            deleted,
            inserted,
            streams_touched,
        })
    }

    /// Deletes and inserts share one transaction; any failure leaves the
    /// store exactly as it was before this source.
    async fn replace_in_transaction(&self, feed: &NormalizedFeed) -> IngestResult<(u64, usize)> {
        let pool = self.database.pool();
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| IngestError::store_write("begin transaction", e.to_string()))?;

        // Returning early drops `tx`, which rolls it back.
        info!("clear {} buckets", feed.buckets.len());
        let mut deleted = 0;
        for bucket in &feed.buckets {
            deleted += delete_bucket(&mut *tx, bucket)
                .await
                .map_err(|e| delete_failed(bucket, e))?;
        }

        info!("add epg ({} events)", feed.events.len());
        for event in &feed.events {
            insert_event(&mut *tx, event)
                .await
                .map_err(|e| insert_failed(event, e))?;
        }

        tx.commit()
            .await
            .map_err(|e| IngestError::store_write("commit", e.to_string()))?;

        debug!("Replaced {} rows with {} events", deleted, feed.events.len());
        Ok((deleted, feed.events.len()))
    }

    /// Every statement commits on its own. A failing insert leaves the
    /// emptied buckets holding only the events inserted before it.
    async fn replace_per_statement(&self, feed: &NormalizedFeed) -> IngestResult<(u64, usize)> {
        let pool = self.database.pool();

        info!("clear {} buckets", feed.buckets.len());
        let mut deleted = 0;
        for bucket in &feed.buckets {
            deleted += delete_bucket(&pool, bucket)
                .await
                .map_err(|e| delete_failed(bucket, e))?;
        }

        info!("add epg ({} events)", feed.events.len());
        let mut inserted = 0;
        for event in &feed.events {
            insert_event(&pool, event)
                .await
                .map_err(|e| insert_failed(event, e))?;
            inserted += 1;
        }

        debug!("Replaced {} rows with {} events", deleted, inserted);
        Ok((deleted, inserted))
    }
}
