//! Collection suggestions: keyword-bucket scoring of a card's free text.
//!
//! Pure and deterministic. The bucket table is data (`buckets.json`, or a file
//! named by `SUGGESTION_TABLE_PATH`), not code.
//!
//! confidence = min(cap, matches × weight + base); zero-match buckets are dropped.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::card::CardTemplate;

pub const BUILTIN_TABLE: &str = include_str!("buckets.json");

#[derive(Debug, Clone, Deserialize)]
pub struct SuggestionBucket {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub keywords: Vec<String>,
    pub weight: f64,
    pub base: f64,
    pub cap: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SuggestionTable {
    buckets: Vec<SuggestionBucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionSuggestion {
    pub name: String,
    pub description: String,
    pub confidence: f64,
    pub matched_keywords: Vec<String>,
}

impl SuggestionTable {
    /// Loads the table from `path`, or the embedded default when `None`.
    pub fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read suggestion table '{path}'"))?;
                Self::from_json(&raw).with_context(|| format!("Invalid suggestion table '{path}'"))
            }
            None => Self::from_json(BUILTIN_TABLE).context("Invalid built-in suggestion table"),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let mut table: SuggestionTable = serde_json::from_str(raw)?;
        for bucket in &mut table.buckets {
            if bucket.weight < 0.0 || bucket.base < 0.0 || !(0.0..=1.0).contains(&bucket.cap) {
                bail!("Bucket '{}' has out-of-range weight/base/cap", bucket.name);
            }
            bucket.keywords = bucket
                .keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect();
        }
        Ok(table)
    }

    pub fn bucket_names(&self) -> Vec<&str> {
        self.buckets.iter().map(|b| b.name.as_str()).collect()
    }

    /// Scores `text` against every bucket, highest confidence first.
    pub fn suggest(&self, text: &str) -> Vec<CollectionSuggestion> {
        let text = text.to_lowercase();

        let mut suggestions: Vec<CollectionSuggestion> = self
            .buckets
            .iter()
            .filter_map(|bucket| {
                let matched: Vec<String> = bucket
                    .keywords
                    .iter()
                    .filter(|k| text.contains(k.as_str()))
                    .cloned()
                    .collect();
                if matched.is_empty() {
                    return None;
                }
                let confidence =
                    (matched.len() as f64 * bucket.weight + bucket.base).min(bucket.cap);
                Some(CollectionSuggestion {
                    name: bucket.name.clone(),
                    description: bucket.description.clone(),
                    confidence,
                    matched_keywords: matched,
                })
            })
            .collect();

        // stable: ties keep table order
        suggestions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        suggestions
    }

    pub fn suggest_for(&self, template: &CardTemplate) -> Vec<CollectionSuggestion> {
        self.suggest(&template.free_text())
    }
}
