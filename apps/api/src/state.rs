use std::sync::Arc;

use crate::collections::suggest::SuggestionTable;
use crate::config::Config;
use crate::imports::tracker::ImportTracker;
use crate::llm_client::ProviderChain;
use crate::store::RecipeStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Pluggable persistence. Default: `PgStore`.
    pub store: Arc<dyn RecipeStore>,
    /// AI providers in fallback order.
    pub llm: ProviderChain,
    pub config: Config,
    /// Process-wide registry of import jobs, polled while any job is active.
    pub tracker: ImportTracker,
    pub suggestions: Arc<SuggestionTable>,
}
