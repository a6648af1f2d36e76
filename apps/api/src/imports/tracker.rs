//! Import job tracker.
//!
//! Process-wide registry of import jobs with an explicit `start` / `stop`
//! lifecycle. While running it refreshes every pending or processing job from
//! the store at a fixed interval; a tick with no active job makes no store call.
//! Finished jobs stay visible for `FINISHED_RETENTION` so clients polling the
//! active list see the final state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::import_job::ImportJob;
use crate::store::RecipeStore;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// How long a finished job is kept after it was first seen finished.
pub const FINISHED_RETENTION: Duration = Duration::from_secs(3600);

struct TrackedJob {
    job: ImportJob,
    finished_at: Option<Instant>,
}

impl TrackedJob {
    fn new(job: ImportJob) -> Self {
        let finished_at = (!job.status.is_active()).then(Instant::now);
        Self { job, finished_at }
    }

    fn update(&mut self, job: ImportJob) {
        if !job.status.is_active() && self.finished_at.is_none() {
            self.finished_at = Some(Instant::now());
        }
        self.job = job;
    }
}

struct Inner {
    store: Arc<dyn RecipeStore>,
    interval: Duration,
    jobs: RwLock<HashMap<Uuid, TrackedJob>>,
    cancel: Mutex<Option<CancellationToken>>,
}

#[derive(Clone)]
pub struct ImportTracker {
    inner: Arc<Inner>,
}

impl ImportTracker {
    pub fn new(store: Arc<dyn RecipeStore>, interval: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                interval,
                jobs: RwLock::new(HashMap::new()),
                cancel: Mutex::new(None),
            }),
        }
    }

    pub async fn track(&self, job: ImportJob) {
        let mut jobs = self.inner.jobs.write().await;
        match jobs.get_mut(&job.id) {
            Some(tracked) => tracked.update(job),
            None => {
                jobs.insert(job.id, TrackedJob::new(job));
            }
        }
    }

    pub async fn get(&self, id: Uuid) -> Option<ImportJob> {
        self.inner.jobs.read().await.get(&id).map(|t| t.job.clone())
    }

    /// Every tracked job, newest first.
    pub async fn snapshot(&self) -> Vec<ImportJob> {
        let mut jobs: Vec<_> = self
            .inner
            .jobs
            .read()
            .await
            .values()
            .map(|t| t.job.clone())
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    pub async fn active_count(&self) -> usize {
        self.inner
            .jobs
            .read()
            .await
            .values()
            .filter(|t| t.job.status.is_active())
            .count()
    }

    /// Registers every active job found in the store and returns them. Called
    /// once at startup, before the jobs are resumed or failed.
    pub async fn seed(&self) -> Result<Vec<ImportJob>, AppError> {
        let active = self.inner.store.list_active_import_jobs().await?;
        for job in &active {
            self.track(job.clone()).await;
        }
        if !active.is_empty() {
            info!(
                "Tracking {} unfinished import job(s) from a previous run",
                active.len()
            );
        }
        Ok(active)
    }

    /// Reloads all active jobs from the store and drops expired finished ones.
    /// Returns how many jobs were reloaded.
    pub async fn refresh(&self) -> Result<usize, AppError> {
        let active: Vec<Uuid> = {
            let jobs = self.inner.jobs.read().await;
            jobs.values()
                .filter(|t| t.job.status.is_active())
                .map(|t| t.job.id)
                .collect()
        };

        for id in &active {
            self.refresh_job(*id).await?;
        }
        self.prune().await;
        Ok(active.len())
    }

    /// Reloads one job. A job that no longer exists is forgotten.
    pub async fn refresh_job(&self, id: Uuid) -> Result<(), AppError> {
        match self.inner.store.get_import_job(id).await? {
            Some(job) => self.track(job).await,
            None => {
                debug!("Import job {id} disappeared from the store");
                self.inner.jobs.write().await.remove(&id);
            }
        }
        Ok(())
    }

    async fn prune(&self) {
        self.inner.jobs.write().await.retain(|_, t| {
            t.finished_at
                .map_or(true, |at| at.elapsed() < FINISHED_RETENTION)
        });
    }

    /// Starts the polling loop. Returns `None` if it is already running.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        let mut slot = self.lock_cancel();
        if slot.is_some() {
            return None;
        }
        let cancel = CancellationToken::new();
        *slot = Some(cancel.clone());

        let tracker = self.clone();
        Some(tokio::spawn(async move { tracker.run(cancel).await }))
    }

    /// Stops the polling loop. Returns false if it was not running.
    pub fn stop(&self) -> bool {
        match self.lock_cancel().take() {
            Some(cancel) => {
                cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_cancel().is_some()
    }

    fn lock_cancel(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.inner
            .cancel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn run(&self, cancel: CancellationToken) {
        info!(
            interval_secs = self.inner.interval.as_secs(),
            "Import tracker started"
        );

        let mut interval = tokio::time::interval_at(
            Instant::now() + self.inner.interval,
            self.inner.interval,
        );
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Import tracker stopping");
                    break;
                }
                _ = interval.tick() => {
                    match self.refresh().await {
                        Ok(0) => {}
                        Ok(refreshed) => debug!(refreshed, "Import tracker refreshed active jobs"),
                        Err(e) => warn!(error = %e, "Import tracker refresh failed"),
                    }
                }
            }
        }
    }
}
