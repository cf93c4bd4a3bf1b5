//! Scrubs credentials out of collaborator error messages before they are
//! returned to clients.

const SECRET_VARS: [&str; 6] = [
    "GOLDEN_RULE_EMBED_API_KEY",
    "GOLDEN_RULE_LLM_API_KEY",
    "OPENAI_API_KEY",
    "JINA_API_KEY",
    "GEMINI_API_KEY",
    "AZURE_OPENAI_API_KEY",
];

pub fn sanitize_sensitive(input: &str) -> String {
    let mut out = input.to_string();
    for name in SECRET_VARS {
        if let Ok(secret) = std::env::var(name) {
            let secret = secret.trim();
            if !secret.is_empty() {
                out = out.replace(secret, "[REDACTED]");
            }
        }
    }
    for marker in ["key=", "api_key=", "apikey="] {
        out = redact_query_param(&out, marker);
    }
    out
}

/// Replaces the value after every `marker` up to the next `&`, whitespace
/// or quote.
fn redact_query_param(input: &str, marker: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find(marker) {
        let value_start = pos + marker.len();
        out.push_str(rest.get(..value_start).unwrap_or_default());
        let tail = rest.get(value_start..).unwrap_or_default();
        let value_len = tail
            .find(|c: char| c == '&' || c == '"' || c == '\'' || c.is_whitespace())
            .unwrap_or(tail.len());
        if value_len > 0 {
            out.push_str("[REDACTED]");
        }
        rest = tail.get(value_len..).unwrap_or_default();
    }
    out.push_str(rest);
    out
}
