//! Import parsing: turns uploaded JSON or pasted text into card templates.
//!
//! Accepted JSON shapes:
//! - a bare array of templates
//! - the bulk export envelope `{cards, exported_at, count, version}`
//! - the collection export envelope `{collection, cards, exported_at, version}`
//! - a single template object

use serde_json::Value;
use tracing::{debug, info};

use crate::errors::AppError;
use crate::imports::prompts::PARSE_TEXT_PROMPT_TEMPLATE;
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{extract_json_object, ProviderChain};
use crate::models::card::CardTemplate;

pub fn parse_import_json(text: &str) -> Result<Vec<CardTemplate>, AppError> {
    let value: Value = serde_json::from_str(text.trim())
        .map_err(|e| AppError::Validation(format!("Invalid JSON: {e}")))?;
    templates_from_value(value)
}

fn templates_from_value(value: Value) -> Result<Vec<CardTemplate>, AppError> {
    let cards = match value {
        Value::Array(items) => Value::Array(items),
        Value::Object(mut map) => match map.remove("cards") {
            Some(cards @ Value::Array(_)) => cards,
            Some(_) => {
                return Err(AppError::Validation(
                    "\"cards\" must be an array".to_string(),
                ))
            }
            None if map.contains_key("name") => Value::Array(vec![Value::Object(map)]),
            None => {
                return Err(AppError::Validation(
                    "Expected a list of cards, an export file, or a single card".to_string(),
                ))
            }
        },
        _ => {
            return Err(AppError::Validation(
                "Expected a JSON array or object".to_string(),
            ))
        }
    };

    let templates: Vec<CardTemplate> = serde_json::from_value(cards)
        .map_err(|e| AppError::Validation(format!("Invalid card data: {e}")))?;

    if templates.is_empty() {
        return Err(AppError::Validation("No cards found".to_string()));
    }
    if let Some(position) = templates.iter().position(|t| t.name.trim().is_empty()) {
        return Err(AppError::Validation(format!(
            "Card #{} has no name",
            position + 1
        )));
    }

    Ok(templates)
}

/// Parses pasted text. JSON is read directly; anything else is structured by
/// the AI provider chain.
pub async fn parse_pasted_text(
    text: &str,
    llm: &ProviderChain,
    preferred: Option<&str>,
) -> Result<Vec<CardTemplate>, AppError> {
    if text.trim().is_empty() {
        return Err(AppError::Validation("text cannot be empty".to_string()));
    }

    match parse_import_json(text) {
        Ok(templates) => return Ok(templates),
        Err(e) => debug!("Pasted text is not importable JSON ({e}), asking AI to structure it"),
    }

    let prompt = PARSE_TEXT_PROMPT_TEMPLATE.replace("{text}", text);
    let reply = llm.generate(&prompt, JSON_ONLY_SYSTEM, preferred).await?;

    let value = extract_json_object(&reply).ok_or_else(|| {
        AppError::UnprocessableEntity("AI response did not contain any cards".to_string())
    })?;
    let templates = templates_from_value(value).map_err(|e| match e {
        AppError::Validation(msg) => {
            AppError::UnprocessableEntity(format!("AI returned unusable cards: {msg}"))
        }
        other => other,
    })?;

    info!("Structured pasted text into {} card(s)", templates.len());
    Ok(templates)
}
