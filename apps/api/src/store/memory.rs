//! In-memory `RecipeStore` for tests, with failure injection for card inserts
//! and import job writes.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{check_transition, RecipeStore};
use crate::errors::AppError;
use crate::models::card::{Card, CardTemplate};
use crate::models::collection::Collection;
use crate::models::import_job::{ImportJob, ImportStatus, JobProgress};

#[derive(Default)]
struct State {
    cards: Vec<Card>,
    collections: Vec<Collection>,
    memberships: HashMap<Uuid, Vec<Uuid>>,
    jobs: Vec<ImportJob>,
    /// Every progress snapshot written, per job, in order.
    progress_log: HashMap<Uuid, Vec<JobProgress>>,
    /// Card names whose insert always fails.
    rejected_names: HashSet<String>,
    /// Number of upcoming inserts that fail with a connection error.
    transient_failures: u32,
    insert_attempts: u32,
    /// Upcoming progress writes and status updates that fail with a connection error.
    progress_write_failures: u32,
    status_write_failures: u32,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_card_named(&self, name: &str) {
        self.state.lock().unwrap().rejected_names.insert(name.to_string());
    }

    pub fn fail_next_inserts(&self, count: u32) {
        self.state.lock().unwrap().transient_failures = count;
    }

    pub fn fail_next_progress_writes(&self, count: u32) {
        self.state.lock().unwrap().progress_write_failures = count;
    }

    pub fn fail_next_status_writes(&self, count: u32) {
        self.state.lock().unwrap().status_write_failures = count;
    }

    pub fn insert_attempts(&self) -> u32 {
        self.state.lock().unwrap().insert_attempts
    }

    pub fn progress_log(&self, job_id: Uuid) -> Vec<JobProgress> {
        self.state
            .lock()
            .unwrap()
            .progress_log
            .get(&job_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn card_names(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .cards
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }
}

#[async_trait]
impl RecipeStore for MemoryStore {
    async fn insert_card(&self, user_id: Uuid, template: &CardTemplate) -> Result<Card, AppError> {
        let mut state = self.state.lock().unwrap();
        state.insert_attempts += 1;
        if state.transient_failures > 0 {
            state.transient_failures -= 1;
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        if state.rejected_names.contains(template.name.trim()) {
            return Err(AppError::Database(sqlx::Error::Protocol(format!(
                "duplicate card name '{}'",
                template.name.trim()
            ))));
        }
        let card = Card::from_template(user_id, template);
        state.cards.push(card.clone());
        Ok(card)
    }

    async fn get_card(&self, id: Uuid) -> Result<Option<Card>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state.cards.iter().find(|c| c.id == id).cloned())
    }

    async fn list_cards(&self, user_id: Uuid) -> Result<Vec<Card>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .cards
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update_card(
        &self,
        id: Uuid,
        template: &CardTemplate,
    ) -> Result<Option<Card>, AppError> {
        let mut state = self.state.lock().unwrap();
        let Some(card) = state.cards.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        let mut updated = Card::from_template(card.user_id, template);
        updated.id = card.id;
        updated.created_at = card.created_at;
        *card = updated.clone();
        Ok(Some(updated))
    }

    async fn delete_card(&self, id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state.lock().unwrap();
        let before = state.cards.len();
        state.cards.retain(|c| c.id != id);
        for members in state.memberships.values_mut() {
            members.retain(|card_id| *card_id != id);
        }
        Ok(state.cards.len() < before)
    }

    async fn create_collection(
        &self,
        user_id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> Result<Collection, AppError> {
        let collection = Collection {
            id: Uuid::new_v4(),
            user_id,
            name: name.trim().to_string(),
            description: description.map(String::from),
            created_at: Utc::now(),
        };
        self.state
            .lock()
            .unwrap()
            .collections
            .push(collection.clone());
        Ok(collection)
    }

    async fn list_collections(&self, user_id: Uuid) -> Result<Vec<Collection>, AppError> {
        let state = self.state.lock().unwrap();
        let mut collections: Vec<_> = state
            .collections
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        collections.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(collections)
    }

    async fn get_collection(&self, id: Uuid) -> Result<Option<Collection>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state.collections.iter().find(|c| c.id == id).cloned())
    }

    async fn add_card_to_collection(
        &self,
        collection_id: Uuid,
        card_id: Uuid,
    ) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        let members = state.memberships.entry(collection_id).or_default();
        if !members.contains(&card_id) {
            members.push(card_id);
        }
        Ok(())
    }

    async fn list_collection_cards(&self, collection_id: Uuid) -> Result<Vec<Card>, AppError> {
        let state = self.state.lock().unwrap();
        let members = state
            .memberships
            .get(&collection_id)
            .cloned()
            .unwrap_or_default();
        Ok(members
            .iter()
            .filter_map(|id| state.cards.iter().find(|c| c.id == *id).cloned())
            .collect())
    }

    async fn create_import_job(&self, job: &ImportJob) -> Result<(), AppError> {
        self.state.lock().unwrap().jobs.push(job.clone());
        Ok(())
    }

    async fn get_import_job(&self, id: Uuid) -> Result<Option<ImportJob>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state.jobs.iter().find(|j| j.id == id).cloned())
    }

    async fn list_import_jobs(&self, user_id: Uuid) -> Result<Vec<ImportJob>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .jobs
            .iter()
            .rev()
            .filter(|j| j.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_active_import_jobs(&self) -> Result<Vec<ImportJob>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .jobs
            .iter()
            .filter(|j| j.status.is_active())
            .cloned()
            .collect())
    }

    async fn set_import_status(
        &self,
        id: Uuid,
        from: ImportStatus,
        to: ImportStatus,
    ) -> Result<(), AppError> {
        check_transition(from, to)?;
        let mut state = self.state.lock().unwrap();
        if state.status_write_failures > 0 {
            state.status_write_failures -= 1;
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        let job = state
            .jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Import job {id} not found")))?;
        if job.status != from {
            return Err(AppError::Conflict(format!(
                "Import job {id} is {}, expected {from}",
                job.status
            )));
        }
        job.status = to;
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn record_import_progress(
        &self,
        id: Uuid,
        progress: &JobProgress,
    ) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        if state.progress_write_failures > 0 {
            state.progress_write_failures -= 1;
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        let job = state
            .jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Import job {id} not found")))?;
        job.apply_progress(progress);
        job.updated_at = Utc::now();
        state
            .progress_log
            .entry(id)
            .or_default()
            .push(progress.clone());
        Ok(())
    }
}
