use crate::error::Result;
use crate::parser::ParsedAnalysis;
use async_trait::async_trait;

const STYLE_SUFFIX: &str =
    "dreamlike surreal art style, ethereal atmosphere, soft mystical lighting, high detail, cinematic composition";

const FALLBACK_STYLE_SUFFIX: &str =
    "surreal dreamlike art style, ethereal mystical atmosphere, soft lighting, high detail, cinematic composition";

/// Produces an illustration for a record and returns its URL.
#[async_trait]
pub trait MediaGenerator: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &'static str;

    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Generator used when no image backend is configured. Always yields an
/// empty URL.
pub struct NoMediaGenerator;

#[async_trait]
impl MediaGenerator for NoMediaGenerator {
    fn name(&self) -> &'static str {
        "None"
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        Ok(String::new())
    }
}

/// Image prompt for a parsed analysis. Uses the reply's visual description
/// when present, otherwise the narrative (or the user's own text).
pub fn visual_prompt(parsed: &ParsedAnalysis, original_input: &str) -> String {
    let visual = parsed.visual.trim();
    if visual.is_empty() {
        format!(
            "Dream visualization: {}, {FALLBACK_STYLE_SUFFIX}",
            parsed.narrative_or(original_input).trim()
        )
    } else {
        format!("{visual}, {STYLE_SUFFIX}")
    }
}
