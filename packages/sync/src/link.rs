// ABOUTME: Identity linker embedding and extracting the opportunity reference token
// ABOUTME: The token in a project description is the sole source of truth for the link

use std::sync::OnceLock;

use regex::Regex;

/// Token ids are word characters and hyphens only; anything else ends the
/// match before the closing bracket.
fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\[TwentyOpportunityId: ([\w-]+)\]").unwrap_or_else(|e| {
            // The pattern is a compile-time constant; this cannot fail.
            unreachable!("invalid link token pattern: {e}")
        })
    })
}

/// Append the opportunity reference trailer to a (possibly empty) project
/// description, trimming surrounding whitespace first.
pub fn embed_opportunity_id(description: &str, opportunity_id: &str) -> String {
    format!(
        "{}\n\n[TwentyOpportunityId: {}]",
        description.trim(),
        opportunity_id
    )
}

/// Scan a project description for the embedded opportunity id. Returns the
/// first match, mirroring `embed_opportunity_id` (round-trip law).
pub fn extract_opportunity_id(description: &str) -> Option<String> {
    token_pattern()
        .captures(description)
        .map(|captures| captures[1].to_string())
}
