use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::{check_transition, RecipeStore};
use crate::errors::AppError;
use crate::models::card::{Card, CardTemplate};
use crate::models::collection::Collection;
use crate::models::import_job::{ImportJob, ImportStatus, JobProgress};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecipeStore for PgStore {
    async fn insert_card(&self, user_id: Uuid, template: &CardTemplate) -> Result<Card, AppError> {
        let card = sqlx::query_as::<_, Card>(
            r#"
            INSERT INTO cards
                (id, user_id, name, what_it_does, who_its_for, difficulty_level,
                 primary_llm_skill, target_departments, steps, example_prompts, tips,
                 prompt_template)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(template.name.trim())
        .bind(&template.what_it_does)
        .bind(&template.who_its_for)
        .bind(&template.difficulty_level)
        .bind(&template.primary_llm_skill)
        .bind(&template.target_departments)
        .bind(&template.steps)
        .bind(Json(&template.example_prompts))
        .bind(&template.tips)
        .bind(&template.prompt_template)
        .fetch_one(&self.pool)
        .await?;

        info!("Inserted card {} for user {user_id}", card.id);
        Ok(card)
    }

    async fn get_card(&self, id: Uuid) -> Result<Option<Card>, AppError> {
        Ok(sqlx::query_as::<_, Card>("SELECT * FROM cards WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_cards(&self, user_id: Uuid) -> Result<Vec<Card>, AppError> {
        Ok(sqlx::query_as::<_, Card>(
            "SELECT * FROM cards WHERE user_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn update_card(
        &self,
        id: Uuid,
        template: &CardTemplate,
    ) -> Result<Option<Card>, AppError> {
        Ok(sqlx::query_as::<_, Card>(
            r#"
            UPDATE cards SET
                name = $2, what_it_does = $3, who_its_for = $4, difficulty_level = $5,
                primary_llm_skill = $6, target_departments = $7, steps = $8,
                example_prompts = $9, tips = $10, prompt_template = $11,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(template.name.trim())
        .bind(&template.what_it_does)
        .bind(&template.who_its_for)
        .bind(&template.difficulty_level)
        .bind(&template.primary_llm_skill)
        .bind(&template.target_departments)
        .bind(&template.steps)
        .bind(Json(&template.example_prompts))
        .bind(&template.tips)
        .bind(&template.prompt_template)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_card(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM cards WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_collection(
        &self,
        user_id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> Result<Collection, AppError> {
        Ok(sqlx::query_as::<_, Collection>(
            r#"
            INSERT INTO collections (id, user_id, name, description)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(name.trim())
        .bind(description)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_collections(&self, user_id: Uuid) -> Result<Vec<Collection>, AppError> {
        Ok(sqlx::query_as::<_, Collection>(
            "SELECT * FROM collections WHERE user_id = $1 ORDER BY name ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_collection(&self, id: Uuid) -> Result<Option<Collection>, AppError> {
        Ok(
            sqlx::query_as::<_, Collection>("SELECT * FROM collections WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn add_card_to_collection(
        &self,
        collection_id: Uuid,
        card_id: Uuid,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO collection_cards (collection_id, card_id, position)
            SELECT $1, $2, COALESCE(MAX(position), -1) + 1
            FROM collection_cards
            WHERE collection_id = $1
            ON CONFLICT (collection_id, card_id) DO NOTHING
            "#,
        )
        .bind(collection_id)
        .bind(card_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_collection_cards(&self, collection_id: Uuid) -> Result<Vec<Card>, AppError> {
        Ok(sqlx::query_as::<_, Card>(
            r#"
            SELECT c.*
            FROM cards c
            JOIN collection_cards cc ON cc.card_id = c.id
            WHERE cc.collection_id = $1
            ORDER BY cc.position ASC
            "#,
        )
        .bind(collection_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn create_import_job(&self, job: &ImportJob) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO import_jobs
                (id, user_id, name, status, total_cards, processed_cards, failed_cards,
                 error_log, raw_data, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(job.id)
        .bind(job.user_id)
        .bind(&job.name)
        .bind(job.status.as_str())
        .bind(job.total_cards)
        .bind(job.processed_cards)
        .bind(job.failed_cards)
        .bind(&job.error_log)
        .bind(&job.raw_data)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await?;

        info!(
            "Created import job {} '{}' with {} cards",
            job.id, job.name, job.total_cards
        );
        Ok(())
    }

    async fn get_import_job(&self, id: Uuid) -> Result<Option<ImportJob>, AppError> {
        Ok(
            sqlx::query_as::<_, ImportJob>("SELECT * FROM import_jobs WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_import_jobs(&self, user_id: Uuid) -> Result<Vec<ImportJob>, AppError> {
        Ok(sqlx::query_as::<_, ImportJob>(
            "SELECT * FROM import_jobs WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_active_import_jobs(&self) -> Result<Vec<ImportJob>, AppError> {
        Ok(sqlx::query_as::<_, ImportJob>(
            "SELECT * FROM import_jobs WHERE status IN ('pending', 'processing') ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn set_import_status(
        &self,
        id: Uuid,
        from: ImportStatus,
        to: ImportStatus,
    ) -> Result<(), AppError> {
        check_transition(from, to)?;

        // Conditional on the current status so a status can never move backward.
        let result = sqlx::query(
            "UPDATE import_jobs SET status = $3, updated_at = NOW() WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get_import_job(id).await? {
                None => Err(AppError::NotFound(format!("Import job {id} not found"))),
                Some(job) => Err(AppError::Conflict(format!(
                    "Import job {id} is {}, expected {from}",
                    job.status
                ))),
            };
        }

        info!("Import job {id}: {from} -> {to}");
        Ok(())
    }

    async fn record_import_progress(
        &self,
        id: Uuid,
        progress: &JobProgress,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE import_jobs
            SET processed_cards = $2, failed_cards = $3, error_log = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(progress.processed)
        .bind(progress.failed)
        .bind(progress.error_log())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Import job {id} not found")));
        }
        Ok(())
    }
}
