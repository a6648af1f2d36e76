use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

use crate::models::card::CardTemplate;

/// Lifecycle of a bulk import. Moves forward only:
/// `pending → processing → completed | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Error)]
#[error("unknown import status '{0}'")]
pub struct UnknownImportStatus(pub String);

impl ImportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ImportStatus::Pending => "pending",
            ImportStatus::Processing => "processing",
            ImportStatus::Completed => "completed",
            ImportStatus::Failed => "failed",
        }
    }

    /// Pending and processing jobs are still being worked on and get polled.
    pub fn is_active(self) -> bool {
        matches!(self, ImportStatus::Pending | ImportStatus::Processing)
    }

    pub fn can_transition_to(self, next: ImportStatus) -> bool {
        matches!(
            (self, next),
            (ImportStatus::Pending, ImportStatus::Processing)
                | (ImportStatus::Processing, ImportStatus::Completed)
                | (ImportStatus::Processing, ImportStatus::Failed)
        )
    }

    /// Terminal status for a finished run. A single failed item fails the job.
    pub fn terminal_for(failed_cards: i32) -> ImportStatus {
        if failed_cards == 0 {
            ImportStatus::Completed
        } else {
            ImportStatus::Failed
        }
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for ImportStatus {
    type Error = UnknownImportStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pending" => Ok(ImportStatus::Pending),
            "processing" => Ok(ImportStatus::Processing),
            "completed" => Ok(ImportStatus::Completed),
            "failed" => Ok(ImportStatus::Failed),
            _ => Err(UnknownImportStatus(value)),
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ImportJob {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub status: ImportStatus,
    pub total_cards: i32,
    pub processed_cards: i32,
    pub failed_cards: i32,
    pub error_log: Option<String>,
    pub raw_data: Json<Vec<CardTemplate>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImportJob {
    pub fn new(user_id: Uuid, name: &str, templates: Vec<CardTemplate>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.trim().to_string(),
            status: ImportStatus::Pending,
            total_cards: templates.len() as i32,
            processed_cards: 0,
            failed_cards: 0,
            error_log: None,
            raw_data: Json(templates),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn progress(&self) -> f64 {
        progress_fraction(self.processed_cards, self.failed_cards, self.total_cards)
    }

    pub fn apply_progress(&mut self, progress: &JobProgress) {
        self.processed_cards = progress.processed;
        self.failed_cards = progress.failed;
        self.error_log = progress.error_log();
    }
}

/// `(processed + failed) / total`, clamped to `[0, 1]`; 0 for an empty job.
pub fn progress_fraction(processed: i32, failed: i32, total: i32) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    let handled = processed.max(0) as f64 + failed.max(0) as f64;
    (handled / total as f64).clamp(0.0, 1.0)
}

/// Running counters for one processing pass.
/// Invariant: `processed + failed <= total`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobProgress {
    pub total: i32,
    pub processed: i32,
    pub failed: i32,
    pub error_lines: Vec<String>,
}

impl JobProgress {
    pub fn new(total: i32) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Resumes the counters and log already persisted on a job.
    pub fn from_job(job: &ImportJob) -> Self {
        Self {
            total: job.total_cards,
            processed: job.processed_cards,
            failed: job.failed_cards,
            error_lines: job
                .error_log
                .as_deref()
                .map(|log| log.lines().map(String::from).collect())
                .unwrap_or_default(),
        }
    }

    pub fn handled(&self) -> i32 {
        self.processed + self.failed
    }

    pub fn record_success(&mut self) {
        debug_assert!(self.handled() < self.total);
        self.processed += 1;
    }

    pub fn record_failure(&mut self, template_name: &str, message: &str) {
        debug_assert!(self.handled() < self.total);
        self.failed += 1;
        // one line per failed item
        let message = message.replace(['\r', '\n'], " ");
        self.error_lines.push(format!("{template_name}: {message}"));
    }

    /// Counts every item not yet handled as failed and explains the gap in
    /// a single log line.
    pub fn abort(&mut self, job_name: &str, reason: &str) {
        let handled = self.handled();
        self.failed += (self.total - handled).max(0);
        let reason = reason.replace(['\r', '\n'], " ");
        self.error_lines.push(format!(
            "{job_name}: aborted after {handled} of {} items: {reason}",
            self.total
        ));
    }

    pub fn error_log(&self) -> Option<String> {
        (!self.error_lines.is_empty()).then(|| self.error_lines.join("\n"))
    }

    pub fn fraction(&self) -> f64 {
        progress_fraction(self.processed, self.failed, self.total)
    }

    pub fn terminal_status(&self) -> ImportStatus {
        ImportStatus::terminal_for(self.failed)
    }
}
