// Shared prompt fragments. Each service that calls the LLM keeps its own
// prompts.rs alongside it; only cross-cutting pieces live here.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Joins a persona with the JSON-only rules into one system prompt.
pub fn json_system(persona: &str) -> String {
    format!("{persona}\n\n{JSON_ONLY_SYSTEM}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_system_keeps_persona_first() {
        let system = json_system("You are a career counsellor.");
        assert!(system.starts_with("You are a career counsellor."));
        assert!(system.ends_with(JSON_ONLY_SYSTEM));
    }
}
