// LLM prompt constants for the Imports module.
// Reuses cross-cutting fragments from llm_client::prompts.

/// Enhancement prompt. Replace `{template_json}` and `{missing_fields}` before sending.
pub const ENHANCE_PROMPT_TEMPLATE: &str = r#"Complete the following recipe card. A recipe card teaches a professional how to get one job done with an AI assistant.

Card as provided (JSON):
{template_json}

Fields to fill in: {missing_fields}

Return a JSON object with this EXACT schema (no extra fields):
{
  "what_it_does": "One or two sentences describing the outcome.",
  "who_its_for": "The roles or teams that benefit most.",
  "difficulty_level": "beginner | intermediate | advanced",
  "primary_llm_skill": "e.g. Summarization, Drafting, Analysis",
  "steps": ["Step one.", "Step two.", "Step three."],
  "example_prompts": [
    {"title": "Short label", "prompt": "A complete prompt with [PLACEHOLDERS]."}
  ],
  "tips": ["A practical tip."],
  "prompt_template": "A reusable prompt with [PLACEHOLDERS]."
}

Rules:
- Keep anything the card already says; only fill what is missing.
- 3 to 6 steps, 1 to 3 example prompts, 2 to 4 tips.
"#;

/// Pasted-text parsing prompt. Replace `{text}` before sending.
pub const PARSE_TEXT_PROMPT_TEMPLATE: &str = r#"The text below describes one or more recipe cards, possibly as notes, a list, or a document. Extract every card.

Return a JSON object with this EXACT schema (no extra fields):
{
  "cards": [
    {
      "name": "Card title (required)",
      "what_it_does": "optional",
      "who_its_for": "optional",
      "steps": ["optional"],
      "tips": ["optional"]
    }
  ]
}

Omit fields the text does not mention. Do not invent cards.

Text:
{text}
"#;
