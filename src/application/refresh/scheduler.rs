//! Background refresh of the stalest persisted records.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use futures_util::stream::{self, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{watch, Notify};
use tracing::{debug, info, warn};

use super::schedule::{next_wake, WeeklyAnchor};
use crate::application::resolver::PriceResolver;
use crate::domain::{PriceKey, RefreshCursor};
use crate::error::RefreshError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Idle,
    Running,
}

/// Outcome of one refresh run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub selected: usize,
    pub refreshed: usize,
    pub failed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub last_report: Option<RefreshReport>,
}

#[derive(Debug, Clone)]
pub struct RefreshSettings {
    /// Time between periodic runs.
    pub period: Duration,
    /// First periodic run when no run has been recorded yet.
    pub anchor: WeeklyAnchor,
    /// Records selected by a periodic run.
    pub max_items: usize,
    /// Records refreshed at once within a run.
    pub concurrency: usize,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            period: Duration::weeks(1),
            anchor: WeeklyAnchor::default(),
            max_items: 100,
            concurrency: 4,
        }
    }
}

/// Clears the running flag when a run ends.
struct RunSlot<'a>(&'a AtomicBool);

impl Drop for RunSlot<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Idle/Running state machine for stale-record refreshes.
///
/// Runs never overlap. A manual trigger during a run is rejected with
/// [`RefreshError::Busy`]; a periodic trigger during a run is skipped.
pub struct RefreshScheduler {
    resolver: Arc<PriceResolver>,
    settings: RefreshSettings,
    running: AtomicBool,
    last_report: Mutex<Option<RefreshReport>>,
    rescheduled: Notify,
}

impl RefreshScheduler {
    #[must_use]
    pub fn new(resolver: Arc<PriceResolver>, settings: RefreshSettings) -> Self {
        Self {
            resolver,
            settings,
            running: AtomicBool::new(false),
            last_report: Mutex::new(None),
            rescheduled: Notify::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> SchedulerState {
        if self.running.load(Ordering::Acquire) {
            SchedulerState::Running
        } else {
            SchedulerState::Idle
        }
    }

    fn try_begin(&self) -> Option<RunSlot<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunSlot(&self.running))
    }

    /// Refresh up to `max_items` of the stalest records now.
    ///
    /// # Errors
    /// Returns [`RefreshError::Busy`] if a run is already in progress.
    pub async fn trigger(&self, max_items: usize) -> Result<RefreshReport, RefreshError> {
        let Some(_slot) = self.try_begin() else {
            info!("Manual refresh rejected, run in progress");
            return Err(RefreshError::Busy);
        };
        let report = self.execute(max_items).await;
        self.rescheduled.notify_one();
        Ok(report)
    }

    async fn execute(&self, max_items: usize) -> RefreshReport {
        let guard = self.resolver.guard();
        let clock = self.resolver.clock();
        let started_at = clock.now();

        match guard.cursor().await {
            Ok(cursor) => debug!(
                last_run = ?cursor.map(|c| c.last_scheduler_run),
                max_items,
                "Refresh run starting"
            ),
            Err(e) => warn!(error = %e, "Refresh cursor unreadable"),
        }

        let selected = match guard.list_stalest(max_items).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Could not select stale records");
                Vec::new()
            }
        };

        let keys: Vec<PriceKey> = selected.iter().map(|record| record.key.clone()).collect();
        let outcomes: Vec<bool> = stream::iter(keys)
            .map(|key| async move {
                match self.resolver.refresh(&key).await {
                    Ok(_) => true,
                    Err(e) => {
                        warn!(item = %key, error = %e, "Refresh failed, will retry next run");
                        false
                    }
                }
            })
            .buffer_unordered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let refreshed = outcomes.iter().filter(|ok| **ok).count();
        let finished_at = clock.now();
        let cursor = RefreshCursor::after_run(finished_at, self.settings.period);
        if let Err(e) = guard.save_cursor(&cursor).await {
            warn!(error = %e, "Could not record refresh run");
        }

        let report = RefreshReport {
            selected: selected.len(),
            refreshed,
            failed: selected.len() - refreshed,
            started_at,
            finished_at,
        };
        info!(
            selected = report.selected,
            refreshed = report.refreshed,
            failed = report.failed,
            next_run = %cursor.next_scheduler_run,
            "Refresh run finished"
        );
        *self.last_report.lock() = Some(report.clone());
        report
    }

    pub async fn status(&self) -> SchedulerStatus {
        let cursor = match self.resolver.guard().cursor().await {
            Ok(cursor) => cursor,
            Err(e) => {
                warn!(error = %e, "Refresh cursor unreadable");
                None
            }
        };
        let now = self.resolver.clock().now();
        SchedulerStatus {
            state: self.state(),
            last_run: cursor.map(|c| c.last_scheduler_run),
            next_run: Some(next_wake(
                cursor.map(|c| c.next_scheduler_run),
                &self.settings.anchor,
                now,
            )),
            last_report: self.last_report.lock().clone(),
        }
    }

    /// Periodic loop. Wakes at the recorded next run, fires missed runs at
    /// once, and re-reads the cursor after any run.
    pub async fn run_forever(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut not_before: Option<DateTime<Utc>> = None;

        loop {
            let now = self.resolver.clock().now();
            let recorded = match self.resolver.guard().cursor().await {
                Ok(cursor) => cursor.map(|c| c.next_scheduler_run),
                Err(e) => {
                    warn!(error = %e, "Refresh cursor unreadable, using weekly anchor");
                    None
                }
            };
            let mut wake_at = next_wake(recorded, &self.settings.anchor, now);
            if let Some(floor) = not_before {
                wake_at = wake_at.max(floor);
            }
            let delay = (wake_at - now).to_std().unwrap_or(StdDuration::ZERO);
            if !delay.is_zero() {
                debug!(next_run = %wake_at, "Next periodic refresh scheduled");
            }

            tokio::select! {
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        debug!("Refresh loop stopping");
                        break;
                    }
                    continue;
                }
                () = self.rescheduled.notified() => continue,
                () = tokio::time::sleep(delay) => {}
            }

            match self.try_begin() {
                Some(_slot) => {
                    let report = self.execute(self.settings.max_items).await;
                    not_before = Some(report.finished_at + self.settings.period);
                }
                None => {
                    debug!("Refresh already running, skipping periodic trigger");
                    tokio::select! {
                        result = shutdown.changed() => {
                            if result.is_err() || *shutdown.borrow() {
                                break;
                            }
                        }
                        () = self.rescheduled.notified() => {}
                    }
                }
            }
        }
    }
}
