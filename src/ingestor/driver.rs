use chrono::NaiveDate;
use chrono_tz::Tz;
use tracing::{error, info, warn};

use super::SourceIngestor;
use crate::database::Database;
use crate::errors::{IngestError, IngestResult};
use crate::models::*;
use crate::utils::time::{local_today, retention_cutoff};

/// Runs sources one after another and sweeps expired events at the end.
///
/// A failing source is logged and recorded in its report; the run moves on
/// to the next one.
pub struct SourceDriver<I: SourceIngestor> {
    database: Database,
    ingestor: I,
    timezone: Tz,
    retention_days: i64,
    sweep_enabled: bool,
}

impl<I: SourceIngestor> SourceDriver<I> {
    pub fn new(database: Database, ingestor: I, timezone: Tz, retention_days: i64) -> Self {
        Self {
            database,
            ingestor,
            timezone,
            retention_days,
            sweep_enabled: true,
        }
    }

    pub fn with_sweep(mut self, enabled: bool) -> Self {
        self.sweep_enabled = enabled;
        self
    }

    /// Every source not flagged hand-only, in name order.
    pub async fn run_scheduled(&self) -> IngestResult<RunSummary> {
        let sources = self.database.list_scheduled_epg_sources().await?;
        info!("Starting EPG run over {} sources", sources.len());
        self.run(&sources).await
    }

    /// Exactly the named source, hand-only or not.
    pub async fn run_named(&self, name: &str) -> IngestResult<RunSummary> {
        let source = self
            .database
            .get_epg_source_by_name(name)
            .await?
            .ok_or_else(|| IngestError::configuration(format!("no EPG source named '{}'", name)))?;

        if !source.is_scheduled() {
            info!("Loading hand-only source '{}' on request", source.name);
        }
        self.run(std::slice::from_ref(&source)).await
    }

    async fn run(&self, sources: &[EpgSource]) -> IngestResult<RunSummary> {
        let mut summary = RunSummary::default();

        for source in sources {
            summary.sources.push(self.ingest_one(source).await);
        }

        if self.sweep_enabled {
            summary.purged = self.sweep(local_today(&self.timezone)).await?;
        } else {
            info!("Retention sweep skipped");
        }

        let failed = summary.failed_sources();
        if failed > 0 {
            warn!(
                "EPG run finished: {} of {} sources failed",
                failed,
                summary.sources.len()
            );
        } else {
            info!("EPG run finished: {} sources loaded", summary.sources.len());
        }
        Ok(summary)
    }

    async fn ingest_one(&self, source: &EpgSource) -> SourceReport {
        info!("load {} ({})", source.name, source.parse_mode);

        match self.ingestor.ingest(source).await {
            Ok(report) => report,
            Err(e) => {
                error!("Failed to load EPG source '{}': {}", source.name, e);
                SourceReport {
                    source_id: source.id,
                    source_name: source.name.clone(),
                    error: Some(e.to_string()),
                    ..SourceReport::default()
                }
            }
        }
    }

    /// Delete events whose local date is older than `today` minus the retention window.
    pub async fn sweep(&self, today: NaiveDate) -> IngestResult<u64> {
        let cutoff = retention_cutoff(today, self.retention_days)?;
        let purged = self
            .database
            .purge_events_before(cutoff)
            .await
            .map_err(|e| IngestError::store_write("retention sweep", e.to_string()))?;

        info!("Purged {} events dated before {}", purged, cutoff);
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records the order sources are visited in and fails the ones named "bad".
    struct RecordingIngestor {
        visited: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SourceIngestor for RecordingIngestor {
        async fn ingest(&self, source: &EpgSource) -> IngestResult<SourceReport> {
            self.visited.lock().unwrap().push(source.name.clone());
            if source.name.starts_with("bad") {
                return Err(IngestError::feed_unreadable(&source.name, "boom"));
            }
            Ok(SourceReport {
                source_id: source.id,
                source_name: source.name.clone(),
                ..SourceReport::default()
            })
        }
    }

    async fn database() -> Database {
        let database = Database::new(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: Some(1),
        })
        .await
        .unwrap();
        database.migrate().await.unwrap();

        for (id, name, hand_only) in [(1, "zeta", 0), (2, "bad alpha", 0), (3, "beta", 0), (4, "manual", 1)] {
            sqlx::query(
                "INSERT INTO epg_sources (id, name, parse_mode, local_file, hand_only) VALUES (?, ?, 0, '', ?)",
            )
            .bind(id)
            .bind(name)
            .bind(hand_only)
            .execute(&database.pool())
            .await
            .unwrap();
        }
        database
    }

    fn driver(database: Database) -> SourceDriver<RecordingIngestor> {
        let ingestor = RecordingIngestor {
            visited: Mutex::new(Vec::new()),
        };
        SourceDriver::new(database, ingestor, chrono_tz::UTC, 8).with_sweep(false)
    }

    #[tokio::test]
    async fn test_scheduled_run_visits_sources_by_name_and_survives_failures() {
        let driver = driver(database().await);
        let summary = driver.run_scheduled().await.unwrap();

        let visited = driver.ingestor.visited.lock().unwrap().clone();
        assert_eq!(visited, vec!["bad alpha", "beta", "zeta"]);
        assert_eq!(summary.sources.len(), 3);
        assert_eq!(summary.failed_sources(), 1);
        assert!(summary.sources[0].error.as_deref().unwrap().contains("boom"));
        assert!(summary.sources[2].succeeded());
    }

    #[tokio::test]
    async fn test_named_run_includes_hand_only_sources() {
        let driver = driver(database().await);
        let summary = driver.run_named("manual").await.unwrap();

        assert_eq!(summary.sources.len(), 1);
        assert_eq!(summary.sources[0].source_id, 4);

        assert!(matches!(
            driver.run_named("missing").await,
            Err(IngestError::Configuration { .. })
        ));
    }

    #[tokio::test]
    async fn test_sweep_rejects_unbounded_retention_window() {
        let ingestor = RecordingIngestor {
            visited: Mutex::new(Vec::new()),
        };
        let driver = SourceDriver::new(database().await, ingestor, chrono_tz::UTC, i64::MAX);
        let today = NaiveDate::from_ymd_opt(2024, 1, 24).unwrap();

        assert!(matches!(
            driver.sweep(today).await,
            Err(IngestError::Configuration { .. })
        ));
    }
}
