// Shared prompt constants.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// System prompt that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Appended to prompts whose output is stored as a recipe card.
pub const CARD_STYLE_INSTRUCTION: &str = "\
    Write for busy professionals. Keep every step a single imperative sentence. \
    Example prompts must be copy-paste ready and use [BRACKETED] placeholders \
    for anything the user has to fill in.";
