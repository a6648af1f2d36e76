//! Axum route handlers for the Collections API.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cards::export::{cards_to_markdown, export_collection, export_filename, ExportFormat};
use crate::cards::handlers::{attachment, markdown_attachment, FormatQuery, UserIdQuery};
use crate::collections::suggest::CollectionSuggestion;
use crate::errors::AppError;
use crate::models::card::{Card, CardTemplate};
use crate::models::collection::Collection;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateCollectionRequest {
    pub user_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddCardRequest {
    pub card_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CollectionDetailResponse {
    pub collection: Collection,
    pub cards: Vec<Card>,
}

#[derive(Debug, Serialize)]
pub struct SuggestResponse {
    pub suggestions: Vec<CollectionSuggestion>,
}

/// POST /api/v1/collections
pub async fn handle_create_collection(
    State(state): State<AppState>,
    Json(req): Json<CreateCollectionRequest>,
) -> Result<(StatusCode, Json<Collection>), AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }
    let description = req.description.as_deref().map(str::trim).filter(|d| !d.is_empty());
    let collection = state
        .store
        .create_collection(req.user_id, req.name.trim(), description)
        .await?;
    Ok((StatusCode::CREATED, Json(collection)))
}

/// GET /api/v1/collections
pub async fn handle_list_collections(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<Collection>>, AppError> {
    Ok(Json(state.store.list_collections(params.user_id).await?))
}

/// GET /api/v1/collections/:id
pub async fn handle_get_collection(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CollectionDetailResponse>, AppError> {
    let collection = find_collection(&state, id).await?;
    let cards = state.store.list_collection_cards(id).await?;
    Ok(Json(CollectionDetailResponse { collection, cards }))
}

/// POST /api/v1/collections/:id/cards
pub async fn handle_add_card(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddCardRequest>,
) -> Result<StatusCode, AppError> {
    let collection = find_collection(&state, id).await?;
    let card = state
        .store
        .get_card(req.card_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Card {} not found", req.card_id)))?;
    if card.user_id != collection.user_id {
        return Err(AppError::Validation(
            "Card and collection belong to different users".to_string(),
        ));
    }
    state.store.add_card_to_collection(id, card.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/collections/suggest
///
/// Ranks built-in collection categories for a card. Pure keyword scoring.
pub async fn handle_suggest(
    State(state): State<AppState>,
    Json(card): Json<CardTemplate>,
) -> Json<SuggestResponse> {
    Json(SuggestResponse {
        suggestions: state.suggestions.suggest_for(&card),
    })
}

/// GET /api/v1/collections/:id/export
pub async fn handle_export_collection(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<FormatQuery>,
) -> Result<Response, AppError> {
    let collection = find_collection(&state, id).await?;
    let cards = state.store.list_collection_cards(id).await?;
    let filename = export_filename(&collection.name, params.format);
    match params.format {
        ExportFormat::Json => Ok(attachment(
            &filename,
            Json(export_collection(collection, cards)),
        )),
        ExportFormat::Markdown => Ok(markdown_attachment(
            &filename,
            cards_to_markdown(&collection.name, &cards),
        )),
    }
}

async fn find_collection(state: &AppState, id: Uuid) -> Result<Collection, AppError> {
    state
        .store
        .get_collection(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Collection {id} not found")))
}
