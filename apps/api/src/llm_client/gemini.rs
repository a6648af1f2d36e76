//! Google Gemini `generateContent` provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{LlmError, TextProvider};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const MODEL: &str = "gemini-2.0-flash";
const PROVIDER: &str = "gemini";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    system_instruction: GeminiContent<'a>,
    contents: Vec<GeminiContent<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GeminiResponse {
    /// Concatenated text of the first candidate.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}

#[derive(Clone)]
pub struct GeminiProvider {
    client: Client,
    api_key: Option<String>,
}

impl GeminiProvider {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
        }
    }
}

#[async_trait]
impl TextProvider for GeminiProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn generate(&self, prompt: &str, system: &str) -> Result<String, LlmError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LlmError::MissingCredentials {
                provider: PROVIDER.to_string(),
            })?;

        let request_body = GeminiRequest {
            system_instruction: GeminiContent {
                parts: vec![GeminiPart { text: system }],
            },
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(format!("{GEMINI_API_BASE}/{MODEL}:generateContent"))
            .query(&[("key", api_key)])
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GeminiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GeminiResponse = response.json().await?;
        parsed.text().ok_or_else(|| LlmError::EmptyContent {
            provider: PROVIDER.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_fails_without_network() {
        let err = GeminiProvider::new(None)
            .generate("hi", "sys")
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::MissingCredentials { .. }));
    }

    #[test]
    fn test_response_text_joins_parts() {
        let raw = r#"{"candidates": [{"content": {"parts": [{"text": "{\"a\":"}, {"text": "1}"}]}}]}"#;
        let parsed: GeminiResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.text().as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn test_response_without_candidates_is_empty() {
        let parsed: GeminiResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(parsed.text().is_none());
    }

    #[test]
    fn test_request_uses_camel_case_system_instruction() {
        let body = GeminiRequest {
            system_instruction: GeminiContent {
                parts: vec![GeminiPart { text: "s" }],
            },
            contents: vec![],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("systemInstruction").is_some());
    }
}
