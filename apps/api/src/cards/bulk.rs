//! Bulk save: every card is saved concurrently and retried on its own.
//! Outcomes are settled: one failure never aborts the others.

use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::card::{Card, CardTemplate};
use crate::retry::{with_retry_notify, RetryPolicy};
use crate::store::RecipeStore;

#[derive(Debug, Clone, Serialize)]
pub struct BulkFailure {
    /// Position in the submitted list.
    pub index: usize,
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkSaveReport {
    pub saved: Vec<Card>,
    pub failed: Vec<BulkFailure>,
}

pub async fn save_cards_settled(
    store: &dyn RecipeStore,
    user_id: Uuid,
    templates: &[CardTemplate],
    policy: &RetryPolicy,
) -> BulkSaveReport {
    let saves = templates.iter().map(|template| async move {
        // validation failures are final, never retried
        template.validate().map_err(AppError::Validation)?;
        with_retry_notify(
            policy,
            || store.insert_card(user_id, template),
            |attempt, err: &AppError| {
                warn!("Saving card '{}' failed on attempt {attempt}: {err}", template.name);
            },
        )
        .await
    });

    let outcomes = join_all(saves).await;

    let mut report = BulkSaveReport {
        saved: Vec::new(),
        failed: Vec::new(),
    };
    for (index, (template, outcome)) in templates.iter().zip(outcomes).enumerate() {
        match outcome {
            Ok(card) => report.saved.push(card),
            Err(err) => report.failed.push(BulkFailure {
                index,
                name: template.name.clone(),
                error: err.user_message(),
            }),
        }
    }

    info!(
        "Bulk save for user {user_id}: {} saved, {} failed",
        report.saved.len(),
        report.failed.len()
    );
    report
}
