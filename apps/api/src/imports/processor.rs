//! Import processing: walks a job's templates in order, enhancing and saving
//! each one, and persists the counters after every item.

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::imports::enhance::enhance_template;
use crate::llm_client::ProviderChain;
use crate::models::card::{Card, CardTemplate};
use crate::models::import_job::{ImportStatus, JobProgress};
use crate::retry::{with_retry, RetryPolicy};
use crate::state::AppState;
use crate::store::RecipeStore;

/// Runs a pending job to completion and returns its terminal status.
///
/// Items are handled one at a time. A failing item is counted and logged and
/// never stops the remaining ones; any failure makes the job `failed`. A
/// progress write that still fails after its retries does not stop the run
/// either: the next write carries the missed counts, and the final counters
/// are always persisted before the terminal status.
pub async fn process_import_job(
    store: &dyn RecipeStore,
    llm: &ProviderChain,
    policy: &RetryPolicy,
    job_id: Uuid,
    preferred: Option<&str>,
) -> Result<ImportStatus, AppError> {
    let job = store
        .get_import_job(job_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Import job {job_id} not found")))?;

    store
        .set_import_status(job_id, ImportStatus::Pending, ImportStatus::Processing)
        .await?;
    info!(
        "Processing import job {job_id} '{}' ({} cards)",
        job.name, job.total_cards
    );

    let templates = job.raw_data.0;
    let mut progress = JobProgress::new(templates.len() as i32);
    let mut unsaved = false;

    for template in &templates {
        match import_one(store, llm, policy, job.user_id, template, preferred).await {
            Ok(card) => {
                debug!("Import job {job_id}: saved card {} '{}'", card.id, card.name);
                progress.record_success();
            }
            Err(message) => {
                warn!("Import job {job_id}: '{}' failed: {message}", template.name);
                progress.record_failure(&template.name, &message);
            }
        }
        unsaved = match with_retry(policy, || store.record_import_progress(job_id, &progress)).await
        {
            Ok(()) => false,
            Err(e) => {
                warn!(
                    "Import job {job_id}: progress write failed after {} of {} items: {e}",
                    progress.handled(),
                    progress.total
                );
                true
            }
        };
    }

    if unsaved {
        with_retry(policy, || store.record_import_progress(job_id, &progress)).await?;
    }

    let status = progress.terminal_status();
    store
        .set_import_status(job_id, ImportStatus::Processing, status)
        .await?;
    info!(
        "Import job {job_id} {status}: {} processed, {} failed",
        progress.processed, progress.failed
    );
    Ok(status)
}

/// Enhances and saves one template. The error is the line written to the job log.
async fn import_one(
    store: &dyn RecipeStore,
    llm: &ProviderChain,
    policy: &RetryPolicy,
    user_id: Uuid,
    template: &CardTemplate,
    preferred: Option<&str>,
) -> Result<Card, String> {
    template.validate()?;
    let enhanced = enhance_template(llm, template, preferred)
        .await
        .map_err(|e| e.to_string())?;
    enhanced.validate()?;
    with_retry(policy, || store.insert_card(user_id, &enhanced))
        .await
        .map_err(|e| e.user_message())
}

/// Moves a job that can no longer run to `failed`, counting every item it
/// did not get to. Pending jobs pass through `processing` first. Finished or
/// missing jobs are left alone.
pub async fn fail_unfinished_job(
    store: &dyn RecipeStore,
    policy: &RetryPolicy,
    job_id: Uuid,
    reason: &str,
) -> Result<(), AppError> {
    let Some(job) = store.get_import_job(job_id).await? else {
        return Ok(());
    };
    match job.status {
        ImportStatus::Pending => {
            with_retry(policy, || {
                store.set_import_status(job_id, ImportStatus::Pending, ImportStatus::Processing)
            })
            .await?
        }
        ImportStatus::Processing => {}
        ImportStatus::Completed | ImportStatus::Failed => return Ok(()),
    }

    let mut progress = JobProgress::from_job(&job);
    progress.abort(&job.name, reason);
    with_retry(policy, || store.record_import_progress(job_id, &progress)).await?;
    with_retry(policy, || {
        store.set_import_status(job_id, ImportStatus::Processing, ImportStatus::Failed)
    })
    .await?;
    info!(
        "Import job {job_id} failed: {} processed, {} failed ({reason})",
        progress.processed, progress.failed
    );
    Ok(())
}

/// Processes a job on its own task and refreshes the tracker when done.
pub fn spawn_import_job(state: AppState, job_id: Uuid, preferred: Option<String>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let outcome = process_import_job(
            state.store.as_ref(),
            &state.llm,
            &state.config.retry,
            job_id,
            preferred.as_deref(),
        )
        .await;

        match outcome {
            Ok(_) => {}
            // another run owns the job, or it is gone
            Err(e @ (AppError::Conflict(_) | AppError::NotFound(_))) => {
                warn!("Import job {job_id} not processed: {e}");
            }
            Err(e) => {
                error!("Import job {job_id} aborted: {e}");
                if let Err(e) = fail_unfinished_job(
                    state.store.as_ref(),
                    &state.config.retry,
                    job_id,
                    &e.user_message(),
                )
                .await
                {
                    warn!("Could not mark import job {job_id} failed: {e}");
                }
            }
        }

        if let Err(e) = state.tracker.refresh_job(job_id).await {
            warn!("Could not refresh import job {job_id}: {e}");
        }
    })
}

/// Resolves jobs left unfinished by a previous run: pending jobs are processed
/// again and jobs caught mid-run are failed. All of them are tracked. Returns
/// how many jobs were found.
pub async fn resume_unfinished_jobs(state: &AppState) -> Result<usize, AppError> {
    let jobs = state.tracker.seed().await?;
    let count = jobs.len();

    for job in jobs {
        if job.status == ImportStatus::Pending {
            info!("Resuming pending import job {} '{}'", job.id, job.name);
            spawn_import_job(state.clone(), job.id, None);
            continue;
        }

        warn!("Import job {} '{}' was interrupted by a restart", job.id, job.name);
        if let Err(e) = fail_unfinished_job(
            state.store.as_ref(),
            &state.config.retry,
            job.id,
            "interrupted by restart",
        )
        .await
        {
            warn!("Could not mark import job {} failed: {e}", job.id);
        }
        state.tracker.refresh_job(job.id).await?;
    }

    Ok(count)
}
