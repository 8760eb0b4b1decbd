//! The periodic scan that turns upcoming occurrences into capture tasks.
//!
//! Every `period` the [`Scheduler`] lists all reservations, computes each
//! one's next occurrence and, for those starting within `horizon`, claims the
//! reservation in the [`CaptureTracker`] and spawns a [`CaptureTask`].
//! One-time reservations that fired are deleted in a single batch after the
//! scan, never while the listing is being walked.
//!
//! Each occurrence is attempted at most once. A capture that fails before
//! its start time releases its [`CaptureTracker`] mark while the occurrence
//! is still inside the horizon; the last attempted occurrence per id keeps
//! the next scan from spawning it again.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::capture::{CaptureContext, CaptureOutcome, CaptureTask};
use crate::dedup::CaptureTracker;
use crate::error::StoreError;
use crate::occurrence::next_occurrence;
use crate::reservation::LogEntry;
use crate::store::{ActivityLog, ReservationStore};

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Time between two scans.
    pub period: Duration,
    /// Occurrences closer than this are captured now.
    pub horizon: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self { period: Duration::from_secs(60), horizon: Duration::from_secs(120) }
    }
}

/// One capture spawned by a tick.
#[derive(Debug)]
pub struct Triggered {
    pub reservation_id: String,
    pub occurrence: DateTime<FixedOffset>,
    pub handle: JoinHandle<CaptureOutcome>,
}

#[derive(Debug, Default)]
pub struct TickReport {
    pub triggered: Vec<Triggered>,
    /// One-time reservations deleted after the scan.
    pub removed: Vec<String>,
}

pub struct Scheduler<S> {
    store: Arc<S>,
    tracker: Arc<CaptureTracker>,
    capture: Arc<CaptureContext<S>>,
    settings: SchedulerSettings,
    /// Last occurrence spawned per reservation id.
    attempted: Mutex<HashMap<String, DateTime<FixedOffset>>>,
}

impl<S> Scheduler<S>
where
    S: ReservationStore + ActivityLog,
{
    /// `capture.log` is normally the same store as `store`; the clock used
    /// for scanning is `capture.clock`.
    pub fn new(
        store: Arc<S>,
        tracker: Arc<CaptureTracker>,
        capture: CaptureContext<S>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            store,
            tracker,
            capture: Arc::new(capture),
            settings,
            attempted: Mutex::new(HashMap::new()),
        }
    }

    pub fn tracker(&self) -> &Arc<CaptureTracker> {
        &self.tracker
    }

    /// Run one scan.
    ///
    /// A listing failure aborts the scan before anything is spawned. A failed
    /// batch delete is logged and does not fail the tick.
    pub async fn tick(&self) -> Result<TickReport, StoreError> {
        let reservations = self.store.list_reservations().await?;
        let now = self.capture.clock.now();
        let horizon = chrono::Duration::from_std(self.settings.horizon).unwrap_or(chrono::Duration::MAX);

        let mut report = TickReport::default();
        let mut fired_once = Vec::new();

        {
            let mut attempted = self.attempted.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let listed: HashSet<&str> = reservations.iter().map(|r| r.id.as_str()).collect();
            attempted.retain(|id, _| listed.contains(id.as_str()));

            for reservation in reservations {
                let occurrence = next_occurrence(&reservation, now);
                debug!(reservation_id = %reservation.id, %occurrence, "checking");
                if occurrence - now >= horizon {
                    continue;
                }
                if attempted.get(&reservation.id) == Some(&occurrence) {
                    debug!(reservation_id = %reservation.id, "occurrence already attempted");
                    // A one-time reservation is still listed only if its
                    // earlier delete failed.
                    if !reservation.recurring {
                        fired_once.push(reservation.id.clone());
                    }
                    continue;
                }
                let Some(guard) = self.tracker.try_guard(&reservation.id) else {
                    continue;
                };

                info!(reservation_id = %reservation.id, title = %reservation.title, %occurrence, "scheduling capture");
                if !reservation.recurring {
                    fired_once.push(reservation.id.clone());
                }
                attempted.insert(reservation.id.clone(), occurrence);
                let reservation_id = reservation.id.clone();
                let handle = CaptureTask::new(reservation, occurrence, Arc::clone(&self.capture)).spawn(guard);
                report.triggered.push(Triggered { reservation_id, occurrence, handle });
            }
        }

        if !fired_once.is_empty() {
            match self.store.delete_reservations(&fired_once).await {
                Ok(()) => report.removed = fired_once,
                Err(e) => {
                    error!(error = %e, ids = ?fired_once, "failed to delete fired one-time reservations");
                    let entry = LogEntry::new(self.capture.clock.now(), format!("Deletion error: {e}"));
                    if let Err(e) = self.store.append_log(entry).await {
                        error!(error = %e, "failed to append activity log entry");
                    }
                }
            }
        }

        Ok(report)
    }

    /// Spawn the scan loop. The first scan runs one `period` after start.
    pub fn start(self: Arc<Self>) -> SchedulerHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let period = self.settings.period;

        let join = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(period_secs = period.as_secs(), "scheduler started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        debug!(time = %self.capture.clock.now(), "ticker event");
                        match self.tick().await {
                            Ok(report) => {
                                if !report.triggered.is_empty() {
                                    info!(
                                        triggered = report.triggered.len(),
                                        removed = report.removed.len(),
                                        "scan complete"
                                    );
                                }
                            }
                            Err(e) => error!(error = %e, "scan failed; retrying on next tick"),
                        }
                    }
                    _ = stop_rx.changed() => break,
                }
            }
            info!("scheduler stopped");
        });

        SchedulerHandle { stop_tx, join }
    }
}

/// Owns the running scan loop. In-flight captures are not affected by
/// [`stop`](Self::stop).
#[derive(Debug)]
pub struct SchedulerHandle {
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.join.await {
            error!(error = %e, "scheduler loop did not exit cleanly");
        }
    }
}
