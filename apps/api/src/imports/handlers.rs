//! Axum route handlers for the Imports API.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::cards::handlers::UserIdQuery;
use crate::errors::AppError;
use crate::imports::parser::parse_pasted_text;
use crate::imports::processor::spawn_import_job;
use crate::models::card::CardTemplate;
use crate::models::import_job::ImportJob;
use crate::state::AppState;

/// Cap on the number of cards in one import job.
pub const MAX_IMPORT_CARDS: usize = 100;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateImportRequest {
    pub user_id: Uuid,
    pub name: String,
    pub cards: Vec<CardTemplate>,
    /// AI provider to try first, e.g. "claude".
    #[serde(default)]
    pub provider: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ParseRequest {
    pub text: String,
    #[serde(default)]
    pub provider: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ParseResponse {
    pub cards: Vec<CardTemplate>,
    pub count: usize,
}

/// An import job row plus its progress fraction.
#[derive(Debug, Serialize)]
pub struct ImportJobView {
    #[serde(flatten)]
    pub job: ImportJob,
    pub progress: f64,
}

impl From<ImportJob> for ImportJobView {
    fn from(job: ImportJob) -> Self {
        Self {
            progress: job.progress(),
            job,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ActiveImportsQuery {
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ActiveImportsResponse {
    pub jobs: Vec<ImportJobView>,
    pub active: usize,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/imports
///
/// Persists a pending job and processes it in the background.
pub async fn handle_create_import(
    State(state): State<AppState>,
    Json(req): Json<CreateImportRequest>,
) -> Result<(StatusCode, Json<ImportJobView>), AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }
    if req.cards.is_empty() {
        return Err(AppError::Validation("cards cannot be empty".to_string()));
    }
    if req.cards.len() > MAX_IMPORT_CARDS {
        return Err(AppError::Validation(format!(
            "An import can hold at most {MAX_IMPORT_CARDS} cards"
        )));
    }

    let job = ImportJob::new(req.user_id, &req.name, req.cards);
    state.store.create_import_job(&job).await?;
    state.tracker.track(job.clone()).await;
    info!("Created import job {} with {} cards", job.id, job.total_cards);

    spawn_import_job(state.clone(), job.id, req.provider);

    Ok((StatusCode::ACCEPTED, Json(job.into())))
}

/// GET /api/v1/imports
pub async fn handle_list_imports(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<ImportJobView>>, AppError> {
    let jobs = state.store.list_import_jobs(params.user_id).await?;
    Ok(Json(jobs.into_iter().map(ImportJobView::from).collect()))
}

/// GET /api/v1/imports/active
///
/// The tracker's view: active jobs plus recently finished ones, limited to
/// one user when `user_id` is given.
pub async fn handle_active_imports(
    State(state): State<AppState>,
    Query(params): Query<ActiveImportsQuery>,
) -> Json<ActiveImportsResponse> {
    let mut jobs = state.tracker.snapshot().await;
    if let Some(user_id) = params.user_id {
        jobs.retain(|j| j.user_id == user_id);
    }
    let active = jobs.iter().filter(|j| j.status.is_active()).count();
    Json(ActiveImportsResponse {
        jobs: jobs.into_iter().map(ImportJobView::from).collect(),
        active,
    })
}

/// GET /api/v1/imports/:id
pub async fn handle_get_import(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ImportJobView>, AppError> {
    let job = state
        .store
        .get_import_job(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Import job {id} not found")))?;
    Ok(Json(job.into()))
}

/// POST /api/v1/imports/parse
///
/// Preview only: turns JSON or pasted text into templates without saving.
pub async fn handle_parse_import(
    State(state): State<AppState>,
    Json(req): Json<ParseRequest>,
) -> Result<Json<ParseResponse>, AppError> {
    let cards = parse_pasted_text(&req.text, &state.llm, req.provider.as_deref()).await?;
    Ok(Json(ParseResponse {
        count: cards.len(),
        cards,
    }))
}
