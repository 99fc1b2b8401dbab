// Prompt text for the career analysis call.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::llm_client::prompts::json_system;
use crate::models::cards::CardKind;

const ANALYSIS_PERSONA: &str = "You are an experienced career counsellor for early-career \
    software professionals. You analyse self-reported profile data and give concrete, \
    encouraging and realistic guidance.";

/// Replace `{profile_json}` before sending.
const ANALYSIS_PROMPT_TEMPLATE: &str = r#"Analyse the user's career profile below. Each key is a profile card; a null card was never filled in, so do not guess its content.

PROFILE:
{profile_json}

Return a JSON object with this EXACT shape:
{
  "summary": "Two or three sentences on where the user stands today.",
  "categories": [
    {
      "name": "Technical Skills",
      "description": "What this area covers for this user.",
      "strengths": ["..."],
      "development_areas": ["..."],
      "recommendations": ["Concrete next step", "..."],
      "motivation": "One encouraging sentence.",
      "example": "A short example of applying the recommendations.",
      "resources": ["Course, book or community", "..."]
    }
  ]
}

Rules:
- Cover these categories when the data allows: Technical Skills, Learning Path, Career Goals, Project Portfolio, Networking, Personal Brand.
- Base every statement on the profile. Skip a category rather than invent data for it.
- Recommendations must be actionable within the next 12 months.
- Write in a professional, analytical and supportive tone."#;

pub fn analysis_system() -> String {
    json_system(ANALYSIS_PERSONA)
}

/// Embeds every card, keyed by card id, as pretty-printed JSON.
pub fn build_analysis_prompt(cards: &BTreeMap<CardKind, Option<Value>>) -> String {
    let profile: Map<String, Value> = cards
        .iter()
        .map(|(kind, card)| (kind.doc_id().to_string(), card.clone().unwrap_or(Value::Null)))
        .collect();
    let profile_json =
        serde_json::to_string_pretty(&profile).unwrap_or_else(|_| "{}".to_string());
    ANALYSIS_PROMPT_TEMPLATE.replace("{profile_json}", &profile_json)
}
