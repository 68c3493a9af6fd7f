//! CleanupScheduler processor.
//!
//! The CleanupScheduler is responsible for:
//! - Waking up every `check_interval` and deciding whether a pass is due
//! - Deleting event rows older than the retention window, table by table
//! - Optionally deleting nodes that have not been seen for a while
//! - Recording when the last pass completed, for health reporting
//!
//! A failed pass leaves `last_run` untouched so the next wake-up retries it.

use crate::config::CleanupConfig;
use crate::entities::EventTable;
use crate::store::{RetentionStore, StoreError};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::{RwLock, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Shared handle to the completion time of the last successful live pass.
pub type LastRun = Arc<RwLock<Option<OffsetDateTime>>>;

#[derive(Debug, Error)]
pub enum CleanupError {
    #[error("failed to purge {target}: {source}")]
    Purge {
        target: &'static str,
        source: StoreError,
    },
}

/// What one pass deleted, or would delete in dry-run mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub dry_run: bool,
    /// Event rows per table. Only tables that were visited appear.
    pub tables: BTreeMap<EventTable, u64>,
    /// `event_receivers` rows that pointed at the purged events.
    pub receivers_deleted: u64,
    pub nodes_deleted: u64,
    /// Event rows plus nodes.
    pub total: u64,
}

pub struct CleanupScheduler {
    store: Arc<dyn RetentionStore>,
    config: CleanupConfig,
    last_run: LastRun,
}

impl CleanupScheduler {
    pub fn new(store: Arc<dyn RetentionStore>, config: CleanupConfig) -> Self {
        Self {
            store,
            config,
            last_run: Arc::new(RwLock::new(None)),
        }
    }

    /// Handle for observing when the last pass completed.
    pub fn last_run(&self) -> LastRun {
        Arc::clone(&self.last_run)
    }

    /// Run one pass against the current time.
    pub async fn run_once(&self, dry_run: bool) -> Result<CleanupReport, CleanupError> {
        self.run_once_at(OffsetDateTime::now_utc(), dry_run).await
    }

    /// Run one pass with cutoffs computed from `now`.
    ///
    /// Does not touch `last_run`; only scheduled live passes do.
    pub async fn run_once_at(
        &self,
        now: OffsetDateTime,
        dry_run: bool,
    ) -> Result<CleanupReport, CleanupError> {
        let mut report = CleanupReport {
            dry_run,
            ..Default::default()
        };

        if self.config.event_cleanup_enabled {
            let cutoff = now - time::Duration::days(i64::from(self.config.retention_days));
            for table in EventTable::ALL {
                let count = self
                    .store
                    .purge_events(table, cutoff, dry_run)
                    .await
                    .map_err(|source| CleanupError::Purge {
                        target: table.table_name(),
                        source,
                    })?;
                debug!(table = %table, events = count.events, receivers = count.receivers, dry_run, "Purged table");
                report.tables.insert(table, count.events);
                report.receivers_deleted += count.receivers;
            }
        }

        if self.config.node_cleanup_enabled {
            let cutoff = now - time::Duration::days(i64::from(self.config.node_inactivity_days));
            report.nodes_deleted = self
                .store
                .purge_inactive_nodes(cutoff, dry_run)
                .await
                .map_err(|source| CleanupError::Purge {
                    target: "nodes",
                    source,
                })?;
        }

        report.total = report.tables.values().sum::<u64>() + report.nodes_deleted;
        info!(
            dry_run,
            total = report.total,
            receivers = report.receivers_deleted,
            nodes = report.nodes_deleted,
            "Cleanup pass finished"
        );
        Ok(report)
    }

    /// Whether a scheduled pass should run at `now`.
    pub async fn is_due(&self, now: OffsetDateTime) -> bool {
        match *self.last_run.read().await {
            None => true,
            Some(last) => now - last >= self.config.interval,
        }
    }

    /// Run a live pass if one is due. Returns whether a pass succeeded.
    pub async fn tick(&self, now: OffsetDateTime) -> bool {
        if !self.is_due(now).await {
            return false;
        }
        match self.run_once_at(now, false).await {
            Ok(_) => {
                *self.last_run.write().await = Some(now);
                true
            }
            Err(e) => {
                error!(error = %e, "Cleanup pass failed, will retry on next check");
                false
            }
        }
    }

    /// Run the scheduler until shutdown.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            retention_days = self.config.retention_days,
            node_cleanup = self.config.node_cleanup_enabled,
            "CleanupScheduler started"
        );

        let period = self.config.check_interval.max(Duration::from_secs(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("CleanupScheduler received shutdown signal");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    self.tick(OffsetDateTime::now_utc()).await;
                }
            }
        }

        info!("CleanupScheduler shutdown complete");
    }
}
