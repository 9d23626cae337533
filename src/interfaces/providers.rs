use async_trait::async_trait;

use crate::error::Result;

/// Boundary to the external text-generation service. Treated as opaque,
/// possibly slow, possibly failing; callers get the completion text or an
/// `Upstream` error, nothing else.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate_text(&self, prompt: &str, system_prompt: &str) -> Result<String>;
}
