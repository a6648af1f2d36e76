//! Card export: JSON envelopes and Markdown.
//!
//! Both envelopes are accepted verbatim by `imports::parser::parse_import_json`.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::card::Card;
use crate::models::collection::Collection;

pub const EXPORT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Markdown,
}

#[derive(Debug, Clone, Serialize)]
pub struct CardsExport {
    pub cards: Vec<Card>,
    pub exported_at: DateTime<Utc>,
    pub count: usize,
    pub version: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectionExport {
    pub collection: Collection,
    pub cards: Vec<Card>,
    pub exported_at: DateTime<Utc>,
    pub version: &'static str,
}

pub fn export_cards(cards: Vec<Card>) -> CardsExport {
    CardsExport {
        count: cards.len(),
        cards,
        exported_at: Utc::now(),
        version: EXPORT_VERSION,
    }
}

pub fn export_collection(collection: Collection, cards: Vec<Card>) -> CollectionExport {
    CollectionExport {
        collection,
        cards,
        exported_at: Utc::now(),
        version: EXPORT_VERSION,
    }
}

/// File name for a download, e.g. `literature-review.md`.
pub fn export_filename(name: &str, format: ExportFormat) -> String {
    let slug: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let slug = slug
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    let slug = if slug.is_empty() { "cards".to_string() } else { slug };
    match format {
        ExportFormat::Json => format!("{slug}.json"),
        ExportFormat::Markdown => format!("{slug}.md"),
    }
}

pub fn card_to_markdown(card: &Card) -> String {
    let mut md = format!("# {}\n\n", card.name);

    if let Some(what) = card.what_it_does.as_deref().filter(|s| !s.is_empty()) {
        md.push_str(what);
        md.push_str("\n\n");
    }

    let details = [
        ("Who it's for", card.who_its_for.as_deref()),
        ("Difficulty", card.difficulty_level.as_deref()),
        ("Primary LLM skill", card.primary_llm_skill.as_deref()),
    ];
    for (label, value) in details {
        if let Some(value) = value.filter(|s| !s.is_empty()) {
            let _ = writeln!(md, "- **{label}:** {value}");
        }
    }
    if !card.target_departments.is_empty() {
        let _ = writeln!(md, "- **Departments:** {}", card.target_departments.join(", "));
    }
    if !md.ends_with("\n\n") {
        md.push('\n');
    }

    if !card.steps.is_empty() {
        md.push_str("## Steps\n\n");
        for (i, step) in card.steps.iter().enumerate() {
            let _ = writeln!(md, "{}. {step}", i + 1);
        }
        md.push('\n');
    }

    if !card.example_prompts.0.is_empty() {
        md.push_str("## Example Prompts\n\n");
        for example in &card.example_prompts.0 {
            let _ = write!(md, "### {}\n\n```\n{}\n```\n\n", example.title, example.prompt);
        }
    }

    if !card.tips.is_empty() {
        md.push_str("## Tips\n\n");
        for tip in &card.tips {
            let _ = writeln!(md, "- {tip}");
        }
        md.push('\n');
    }

    if let Some(template) = card.prompt_template.as_deref().filter(|s| !s.is_empty()) {
        let _ = write!(md, "## Prompt Template\n\n```\n{template}\n```\n");
    }

    md.trim_end().to_string() + "\n"
}

pub fn cards_to_markdown(title: &str, cards: &[Card]) -> String {
    let mut md = format!("# {title}\n\n_{} cards exported {}_\n", cards.len(), Utc::now().format("%Y-%m-%d"));
    for card in cards {
        md.push_str("\n---\n\n");
        // demote card headings one level under the document title; fenced
        // prompt text is copied as is
        let mut in_fence = false;
        for line in card_to_markdown(card).lines() {
            if line.starts_with("```") {
                in_fence = !in_fence;
            } else if !in_fence && line.starts_with('#') {
                md.push('#');
            }
            md.push_str(line);
            md.push('\n');
        }
    }
    md
}
