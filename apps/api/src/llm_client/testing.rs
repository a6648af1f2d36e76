//! Scriptable provider for tests outside this module.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{LlmError, ProviderChain, TextProvider};

type Responder = Box<dyn Fn(&str) -> Result<String, String> + Send + Sync>;

pub struct StubProvider {
    name: &'static str,
    respond: Responder,
    calls: AtomicU32,
}

impl StubProvider {
    /// Answers each prompt with `respond(prompt)`; `Err` becomes an API error.
    pub fn new(
        name: &'static str,
        respond: impl Fn(&str) -> Result<String, String> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            respond: Box::new(respond),
            calls: AtomicU32::new(0),
        })
    }

    pub fn replying(name: &'static str, reply: &'static str) -> Arc<Self> {
        Self::new(name, move |_| Ok(reply.to_string()))
    }

    pub fn failing(name: &'static str) -> Arc<Self> {
        Self::new(name, |_| Err("service unavailable".to_string()))
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextProvider for StubProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn generate(&self, prompt: &str, _system: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.respond)(prompt).map_err(|message| LlmError::Api {
            provider: self.name.to_string(),
            status: 503,
            message,
        })
    }
}

pub fn chain_of(providers: Vec<Arc<StubProvider>>) -> ProviderChain {
    ProviderChain::new(
        providers
            .into_iter()
            .map(|p| p as Arc<dyn TextProvider>)
            .collect(),
        Duration::from_secs(5),
    )
}
