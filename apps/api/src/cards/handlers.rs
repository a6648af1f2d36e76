use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::cards::bulk::{save_cards_settled, BulkSaveReport};
use crate::cards::export::{
    card_to_markdown, cards_to_markdown, export_cards, export_filename, ExportFormat,
};
use crate::errors::AppError;
use crate::models::card::{Card, CardTemplate};
use crate::retry::with_retry;
use crate::state::AppState;

/// Cap on a single bulk save request.
pub const MAX_BULK_CARDS: usize = 100;

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Deserialize)]
pub struct ExportQuery {
    pub user_id: Uuid,
    #[serde(default)]
    pub format: ExportFormat,
}

#[derive(Deserialize)]
pub struct FormatQuery {
    #[serde(default)]
    pub format: ExportFormat,
}

#[derive(Debug, Deserialize)]
pub struct CreateCardRequest {
    pub user_id: Uuid,
    pub card: CardTemplate,
}

#[derive(Debug, Deserialize)]
pub struct BulkSaveRequest {
    pub user_id: Uuid,
    pub cards: Vec<CardTemplate>,
}

/// POST /api/v1/cards
pub async fn handle_create_card(
    State(state): State<AppState>,
    Json(req): Json<CreateCardRequest>,
) -> Result<(StatusCode, Json<Card>), AppError> {
    req.card.validate().map_err(AppError::Validation)?;
    let card = with_retry(&state.config.retry, || {
        state.store.insert_card(req.user_id, &req.card)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(card)))
}

/// GET /api/v1/cards
pub async fn handle_list_cards(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<Card>>, AppError> {
    Ok(Json(state.store.list_cards(params.user_id).await?))
}

/// GET /api/v1/cards/:id
pub async fn handle_get_card(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Card>, AppError> {
    Ok(Json(find_card(&state, id).await?))
}

/// PUT /api/v1/cards/:id
pub async fn handle_update_card(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(card): Json<CardTemplate>,
) -> Result<Json<Card>, AppError> {
    card.validate().map_err(AppError::Validation)?;
    let updated = with_retry(&state.config.retry, || state.store.update_card(id, &card))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Card {id} not found")))?;
    Ok(Json(updated))
}

/// DELETE /api/v1/cards/:id
pub async fn handle_delete_card(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.store.delete_card(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Card {id} not found")))
    }
}

/// POST /api/v1/cards/bulk
///
/// Saves every card independently and reports partial success.
pub async fn handle_bulk_save(
    State(state): State<AppState>,
    Json(req): Json<BulkSaveRequest>,
) -> Result<Json<BulkSaveReport>, AppError> {
    if req.cards.is_empty() {
        return Err(AppError::Validation("cards cannot be empty".to_string()));
    }
    if req.cards.len() > MAX_BULK_CARDS {
        return Err(AppError::Validation(format!(
            "At most {MAX_BULK_CARDS} cards can be saved at once"
        )));
    }
    let report = save_cards_settled(
        state.store.as_ref(),
        req.user_id,
        &req.cards,
        &state.config.retry,
    )
    .await;
    Ok(Json(report))
}

/// GET /api/v1/cards/export
pub async fn handle_export_cards(
    State(state): State<AppState>,
    Query(params): Query<ExportQuery>,
) -> Result<Response, AppError> {
    let cards = state.store.list_cards(params.user_id).await?;
    let filename = export_filename("recipe-cards", params.format);
    match params.format {
        ExportFormat::Json => Ok(attachment(&filename, Json(export_cards(cards)))),
        ExportFormat::Markdown => Ok(markdown_attachment(
            &filename,
            cards_to_markdown("Recipe Cards", &cards),
        )),
    }
}

/// GET /api/v1/cards/:id/export
pub async fn handle_export_card(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<FormatQuery>,
) -> Result<Response, AppError> {
    let card = find_card(&state, id).await?;
    let filename = export_filename(&card.name, params.format);
    match params.format {
        ExportFormat::Json => Ok(attachment(&filename, Json(export_cards(vec![card])))),
        ExportFormat::Markdown => Ok(markdown_attachment(&filename, card_to_markdown(&card))),
    }
}

async fn find_card(state: &AppState, id: Uuid) -> Result<Card, AppError> {
    state
        .store
        .get_card(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Card {id} not found")))
}

pub(crate) fn attachment(filename: &str, body: impl IntoResponse) -> Response {
    (
        [(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )],
        body,
    )
        .into_response()
}

pub(crate) fn markdown_attachment(filename: &str, markdown: String) -> Response {
    attachment(
        filename,
        ([(header::CONTENT_TYPE, "text/markdown; charset=utf-8")], markdown),
    )
}
