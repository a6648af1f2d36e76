/// LLM Client: the single point of entry for all text-generation calls.
///
/// ARCHITECTURAL RULE: No other module may call an AI provider API directly.
/// All LLM interactions MUST go through `ProviderChain`.
///
/// Providers are tried in order (Gemini first, Claude as fallback). There is no
/// retry inside the chain: a failing provider hands over to the next one.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

pub mod claude;
pub mod gemini;
pub mod prompts;
#[cfg(test)]
pub mod testing;

pub use claude::ClaudeProvider;
pub use gemini::GeminiProvider;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} API error (status {status}): {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{provider} returned empty content")]
    EmptyContent { provider: String },

    #[error("{provider} API key is not configured")]
    MissingCredentials { provider: String },

    #[error("{provider} request timeout after {seconds}s")]
    Timeout { provider: String, seconds: u64 },

    #[error("No AI providers are configured")]
    NoProviders,

    #[error("All AI providers failed: {}", .failures.join("; "))]
    AllProvidersFailed { failures: Vec<String> },
}

/// A text-generation backend. Implementations return the raw generated text;
/// JSON extraction happens in the caller.
#[async_trait]
pub trait TextProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str, system: &str) -> Result<String, LlmError>;
}

/// Ordered list of providers with a uniform error interface.
#[derive(Clone)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn TextProvider>>,
    timeout: Duration,
}

impl ProviderChain {
    pub fn new(providers: Vec<Arc<dyn TextProvider>>, timeout: Duration) -> Self {
        Self { providers, timeout }
    }

    /// Gemini first, Claude as fallback.
    pub fn from_keys(
        gemini_api_key: Option<String>,
        anthropic_api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self::new(
            vec![
                Arc::new(GeminiProvider::new(gemini_api_key)),
                Arc::new(ClaudeProvider::new(anthropic_api_key)),
            ],
            timeout,
        )
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Generates text with the first provider that succeeds. `preferred`, when it
    /// names a known provider, is tried first; the rest keep their order.
    pub async fn generate(
        &self,
        prompt: &str,
        system: &str,
        preferred: Option<&str>,
    ) -> Result<String, LlmError> {
        if self.providers.is_empty() {
            return Err(LlmError::NoProviders);
        }

        let mut failures = Vec::new();

        for provider in self.ordered(preferred) {
            let name = provider.name().to_string();
            let outcome = tokio::time::timeout(self.timeout, provider.generate(prompt, system))
                .await
                .unwrap_or_else(|_| {
                    Err(LlmError::Timeout {
                        provider: name.clone(),
                        seconds: self.timeout.as_secs(),
                    })
                });

            match outcome {
                Ok(text) => {
                    debug!("{name} generated {} chars", text.len());
                    return Ok(text);
                }
                Err(e) => {
                    warn!("AI provider {name} failed: {e}");
                    failures.push(format!("{name}: {e}"));
                }
            }
        }

        Err(LlmError::AllProvidersFailed { failures })
    }

    fn ordered(&self, preferred: Option<&str>) -> Vec<&Arc<dyn TextProvider>> {
        let mut ordered: Vec<_> = self.providers.iter().collect();
        if let Some(preferred) = preferred {
            // stable sort keeps the remaining providers in configured order
            ordered.sort_by_key(|p| !p.name().eq_ignore_ascii_case(preferred));
        }
        ordered
    }
}

/// Returns the first brace-matched substring of `text` that parses as a JSON
/// object. Braces inside string literals are ignored.
pub fn extract_json_object(text: &str) -> Option<serde_json::Value> {
    let bytes = text.as_bytes();
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = matching_brace(bytes, start) {
            if let Ok(value @ serde_json::Value::Object(_)) =
                serde_json::from_str::<serde_json::Value>(&text[start..=end])
            {
                return Some(value);
            }
        }
        search_from = start + 1;
    }

    None
}

/// Index of the `}` closing the `{` at `start`, or `None` if unbalanced.
fn matching_brace(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}
