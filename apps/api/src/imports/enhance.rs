//! Enhancement: fills in the fields an imported template is missing.
//!
//! Fields the template already has always win over AI output. When the AI
//! reply carries no JSON object at all, template-derived defaults are used;
//! a JSON object that breaks the field contract fails the item.

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::imports::prompts::ENHANCE_PROMPT_TEMPLATE;
use crate::llm_client::prompts::{CARD_STYLE_INSTRUCTION, JSON_ONLY_SYSTEM};
use crate::llm_client::{extract_json_object, LlmError, ProviderChain};
use crate::models::card::{CardTemplate, ExamplePrompt};

#[derive(Debug, Error)]
pub enum EnhanceError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("AI returned a malformed card: {0}")]
    Malformed(String),
}

/// The JSON contract an enhancement reply must follow. Every field is optional;
/// wrong types are a contract violation.
#[derive(Debug, Default, Deserialize)]
pub struct EnhancedFields {
    pub what_it_does: Option<String>,
    pub who_its_for: Option<String>,
    pub difficulty_level: Option<String>,
    pub primary_llm_skill: Option<String>,
    pub steps: Option<Vec<String>>,
    pub example_prompts: Option<Vec<ExamplePrompt>>,
    pub tips: Option<Vec<String>>,
    pub prompt_template: Option<String>,
}

impl EnhancedFields {
    fn is_empty(&self) -> bool {
        self.what_it_does.is_none()
            && self.who_its_for.is_none()
            && self.difficulty_level.is_none()
            && self.primary_llm_skill.is_none()
            && self.steps.is_none()
            && self.example_prompts.is_none()
            && self.tips.is_none()
            && self.prompt_template.is_none()
    }
}

pub async fn enhance_template(
    llm: &ProviderChain,
    template: &CardTemplate,
    preferred: Option<&str>,
) -> Result<CardTemplate, EnhanceError> {
    let missing = template.missing_fields();
    if missing.is_empty() {
        debug!("Card '{}' is complete, skipping enhancement", template.name);
        return Ok(template.clone());
    }

    let template_json = serde_json::to_string_pretty(template).map_err(LlmError::from)?;
    let prompt = ENHANCE_PROMPT_TEMPLATE
        .replace("{template_json}", &template_json)
        .replace("{missing_fields}", &missing.join(", "));
    let system = format!("{JSON_ONLY_SYSTEM} {CARD_STYLE_INSTRUCTION}");

    let reply = llm.generate(&prompt, &system, preferred).await?;

    let enhanced = match extract_json_object(&reply) {
        Some(value) => {
            let fields: EnhancedFields = serde_json::from_value(value)
                .map_err(|e| EnhanceError::Malformed(e.to_string()))?;
            if fields.is_empty() {
                return Err(EnhanceError::Malformed(
                    "reply has none of the card fields".to_string(),
                ));
            }
            merge(template, fields)
        }
        None => {
            warn!(
                "AI reply for '{}' had no JSON object, using defaults",
                template.name
            );
            template.clone()
        }
    };

    Ok(merge(&enhanced, fallback_fields(template)))
}

/// Fills only the gaps in `template` from `fields`.
pub fn merge(template: &CardTemplate, fields: EnhancedFields) -> CardTemplate {
    let mut merged = template.clone();

    fill_text(&mut merged.what_it_does, fields.what_it_does);
    fill_text(&mut merged.who_its_for, fields.who_its_for);
    fill_text(
        &mut merged.difficulty_level,
        normalize_difficulty(fields.difficulty_level.as_deref()),
    );
    fill_text(&mut merged.primary_llm_skill, fields.primary_llm_skill);
    fill_text(&mut merged.prompt_template, fields.prompt_template);

    fill_list(&mut merged.steps, clean_lines(fields.steps));
    fill_list(&mut merged.tips, clean_lines(fields.tips));
    fill_list(
        &mut merged.example_prompts,
        fields.example_prompts.map(|examples| {
            examples
                .into_iter()
                .filter(|e| !e.prompt.trim().is_empty())
                .collect()
        }),
    );

    merged
}

fn fill_text(slot: &mut Option<String>, value: Option<String>) {
    let blank = slot.as_deref().map_or(true, |s| s.trim().is_empty());
    if blank {
        if let Some(value) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            *slot = Some(value);
        }
    }
}

fn fill_list<T>(slot: &mut Vec<T>, value: Option<Vec<T>>) {
    if slot.is_empty() {
        if let Some(value) = value {
            *slot = value;
        }
    }
}

fn clean_lines(lines: Option<Vec<String>>) -> Option<Vec<String>> {
    lines.map(|lines| {
        lines
            .into_iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect()
    })
}

/// Maps free-form difficulty labels onto `beginner | intermediate | advanced`.
pub fn normalize_difficulty(raw: Option<&str>) -> Option<String> {
    let level = match raw?.trim().to_lowercase().as_str() {
        "beginner" | "easy" | "basic" | "novice" => "beginner",
        "intermediate" | "medium" | "moderate" => "intermediate",
        "advanced" | "hard" | "expert" => "advanced",
        _ => return None,
    };
    Some(level.to_string())
}

/// Defaults derived from the card name, used for anything still missing.
fn fallback_fields(template: &CardTemplate) -> EnhancedFields {
    let name = template.name.trim();
    EnhancedFields {
        what_it_does: Some(format!("Uses an AI assistant to help with {name}.")),
        who_its_for: Some("Anyone who does this task regularly.".to_string()),
        difficulty_level: Some("beginner".to_string()),
        primary_llm_skill: None,
        steps: Some(vec![
            "Open your AI assistant.".to_string(),
            "Paste the prompt template and fill in the placeholders.".to_string(),
            "Review the answer and ask for revisions where needed.".to_string(),
        ]),
        example_prompts: Some(vec![ExamplePrompt {
            title: name.to_string(),
            prompt: format!("Help me with {name}. Here is my situation: [DESCRIBE YOUR TASK]"),
        }]),
        tips: Some(vec![
            "Give the assistant concrete context and examples.".to_string(),
            "Check facts and numbers before you share the result.".to_string(),
        ]),
        prompt_template: Some(format!(
            "You are an expert assistant. Help me with {name}.\n\nContext: [CONTEXT]\nGoal: [GOAL]"
        )),
    }
}
