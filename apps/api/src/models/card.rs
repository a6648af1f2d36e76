use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

pub const MAX_CARD_NAME_LEN: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamplePrompt {
    pub title: String,
    pub prompt: String,
}

/// A recipe card as submitted by a client or found in an import file.
/// Only `name` is required; missing fields are filled by enhancement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardTemplate {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub what_it_does: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub who_its_for: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_llm_skill: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub target_departments: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub steps: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub example_prompts: Vec<ExamplePrompt>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tips: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_template: Option<String>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

impl CardTemplate {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err("Card name is required".to_string());
        }
        if name.chars().count() > MAX_CARD_NAME_LEN {
            return Err(format!(
                "Card name '{}…' exceeds {MAX_CARD_NAME_LEN} characters",
                name.chars().take(40).collect::<String>()
            ));
        }
        if self
            .example_prompts
            .iter()
            .any(|p| p.prompt.trim().is_empty())
        {
            return Err(format!("Card '{name}' has an example prompt with no text"));
        }
        Ok(())
    }

    /// Structured fields the enhancement step has to fill in.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if is_blank(&self.what_it_does) {
            missing.push("what_it_does");
        }
        if is_blank(&self.who_its_for) {
            missing.push("who_its_for");
        }
        if self.steps.is_empty() {
            missing.push("steps");
        }
        if self.example_prompts.is_empty() {
            missing.push("example_prompts");
        }
        if self.tips.is_empty() {
            missing.push("tips");
        }
        if is_blank(&self.prompt_template) {
            missing.push("prompt_template");
        }
        missing
    }

    /// Every free-text field joined with spaces, for keyword matching.
    pub fn free_text(&self) -> String {
        let mut parts: Vec<&str> = vec![self.name.as_str()];
        parts.extend(
            [
                &self.what_it_does,
                &self.who_its_for,
                &self.primary_llm_skill,
                &self.prompt_template,
            ]
            .into_iter()
            .filter_map(|f| f.as_deref()),
        );
        parts.extend(self.target_departments.iter().map(String::as_str));
        parts.extend(self.steps.iter().map(String::as_str));
        parts.extend(self.tips.iter().map(String::as_str));
        for example in &self.example_prompts {
            parts.push(&example.title);
            parts.push(&example.prompt);
        }
        parts.join(" ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Card {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub what_it_does: Option<String>,
    pub who_its_for: Option<String>,
    pub difficulty_level: Option<String>,
    pub primary_llm_skill: Option<String>,
    pub target_departments: Vec<String>,
    pub steps: Vec<String>,
    pub example_prompts: Json<Vec<ExamplePrompt>>,
    pub tips: Vec<String>,
    pub prompt_template: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    pub fn from_template(user_id: Uuid, template: &CardTemplate) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: template.name.trim().to_string(),
            what_it_does: template.what_it_does.clone(),
            who_its_for: template.who_its_for.clone(),
            difficulty_level: template.difficulty_level.clone(),
            primary_llm_skill: template.primary_llm_skill.clone(),
            target_departments: template.target_departments.clone(),
            steps: template.steps.clone(),
            example_prompts: Json(template.example_prompts.clone()),
            tips: template.tips.clone(),
            prompt_template: template.prompt_template.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn to_template(&self) -> CardTemplate {
        CardTemplate {
            name: self.name.clone(),
            what_it_does: self.what_it_does.clone(),
            who_its_for: self.who_its_for.clone(),
            difficulty_level: self.difficulty_level.clone(),
            primary_llm_skill: self.primary_llm_skill.clone(),
            target_departments: self.target_departments.clone(),
            steps: self.steps.clone(),
            example_prompts: self.example_prompts.0.clone(),
            tips: self.tips.clone(),
            prompt_template: self.prompt_template.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_requires_name_field() {
        let err = serde_json::from_str::<CardTemplate>(r#"{"steps": []}"#).unwrap_err();
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn test_template_null_lists_become_empty() {
        let t: CardTemplate =
            serde_json::from_str(r#"{"name": "Summarize", "steps": null, "tips": null}"#).unwrap();
        assert!(t.steps.is_empty());
        assert!(t.tips.is_empty());
    }

    #[test]
    fn test_validate_rejects_blank_name() {
        assert!(CardTemplate::named("   ").validate().is_err());
        assert!(CardTemplate::named("Draft an email").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_long_name() {
        assert!(CardTemplate::named("x".repeat(MAX_CARD_NAME_LEN + 1))
            .validate()
            .is_err());
    }

    #[test]
    fn test_missing_fields_for_bare_template() {
        let missing = CardTemplate::named("Brainstorm").missing_fields();
        assert_eq!(
            missing,
            vec![
                "what_it_does",
                "who_its_for",
                "steps",
                "example_prompts",
                "tips",
                "prompt_template"
            ]
        );
    }

    #[test]
    fn test_card_template_roundtrip_preserves_fields() {
        let template = CardTemplate {
            name: "Literature review".into(),
            what_it_does: Some("Finds sources".into()),
            steps: vec!["Search".into(), "Summarize".into()],
            example_prompts: vec![ExamplePrompt {
                title: "Start".into(),
                prompt: "Find papers on [TOPIC]".into(),
            }],
            ..CardTemplate::default()
        };
        let card = Card::from_template(Uuid::new_v4(), &template);
        assert_eq!(card.to_template(), template);
    }

    #[test]
    fn test_free_text_includes_lists() {
        let template = CardTemplate {
            name: "A".into(),
            tips: vec!["cite sources".into()],
            ..CardTemplate::default()
        };
        assert!(template.free_text().contains("cite sources"));
    }
}
