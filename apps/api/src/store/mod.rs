//! Persistence boundary.
//!
//! `AppState` holds an `Arc<dyn RecipeStore>`. Production uses `PgStore`;
//! tests run against the in-memory store.

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::card::{Card, CardTemplate};
use crate::models::collection::Collection;
use crate::models::import_job::{ImportJob, ImportStatus, JobProgress};

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgStore;

#[async_trait]
pub trait RecipeStore: Send + Sync {
    // Cards

    async fn insert_card(&self, user_id: Uuid, template: &CardTemplate) -> Result<Card, AppError>;

    async fn get_card(&self, id: Uuid) -> Result<Option<Card>, AppError>;

    async fn list_cards(&self, user_id: Uuid) -> Result<Vec<Card>, AppError>;

    async fn update_card(&self, id: Uuid, template: &CardTemplate)
        -> Result<Option<Card>, AppError>;

    /// Returns false when no card had this id.
    async fn delete_card(&self, id: Uuid) -> Result<bool, AppError>;

    // Collections

    async fn create_collection(
        &self,
        user_id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> Result<Collection, AppError>;

    async fn list_collections(&self, user_id: Uuid) -> Result<Vec<Collection>, AppError>;

    async fn get_collection(&self, id: Uuid) -> Result<Option<Collection>, AppError>;

    /// Appends the card to the end of the collection. Adding twice is a no-op.
    async fn add_card_to_collection(&self, collection_id: Uuid, card_id: Uuid)
        -> Result<(), AppError>;

    /// Member cards in insertion order.
    async fn list_collection_cards(&self, collection_id: Uuid) -> Result<Vec<Card>, AppError>;

    // Import jobs

    async fn create_import_job(&self, job: &ImportJob) -> Result<(), AppError>;

    async fn get_import_job(&self, id: Uuid) -> Result<Option<ImportJob>, AppError>;

    /// Newest first.
    async fn list_import_jobs(&self, user_id: Uuid) -> Result<Vec<ImportJob>, AppError>;

    async fn list_active_import_jobs(&self) -> Result<Vec<ImportJob>, AppError>;

    /// Moves a job from `from` to `to`. Fails with `Conflict` if the transition
    /// is not allowed or the job is no longer in `from`.
    async fn set_import_status(
        &self,
        id: Uuid,
        from: ImportStatus,
        to: ImportStatus,
    ) -> Result<(), AppError>;

    async fn record_import_progress(&self, id: Uuid, progress: &JobProgress)
        -> Result<(), AppError>;
}

pub(crate) fn check_transition(from: ImportStatus, to: ImportStatus) -> Result<(), AppError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(AppError::Conflict(format!(
            "Import job cannot move from {from} to {to}"
        )))
    }
}
