//! Generation service interface: classification, code generation and
//! conversational completion. Implementations must surface failures as
//! [`ProviderError`]s so callers can recover; they must never panic the
//! session.

use async_trait::async_trait;

use super::types::ProviderResult;
use crate::session::Turn;

#[async_trait]
#[mockall::automock]
pub trait GenerationProvider: Send + Sync {
    /// Decides whether `message` is asking for code to be generated.
    async fn classify(&self, message: &str) -> ProviderResult<bool>;

    /// Generates code in `language` for the given task. The returned string
    /// is plain source, with any fenced-code markers stripped.
    async fn generate(&self, prompt: &str, language: &str) -> ProviderResult<String>;

    /// Produces a conversational reply for the full ordered history.
    async fn chat(&self, history: &[Turn]) -> ProviderResult<String>;

    fn name(&self) -> &str;
}

/// Drops a leading and a trailing fence line the model may have wrapped the
/// code in, mirroring how chat models tend to answer "code only" prompts.
pub fn strip_code_fences(content: &str) -> String {
    let mut lines: Vec<&str> = content.lines().collect();
    if lines.first().is_some_and(|line| line.contains("```")) {
        lines.remove(0);
    }
    if lines.last().is_some_and(|line| line.contains("```")) {
        lines.pop();
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_strip_fences_with_language_tag() {
        let wrapped = "```c\nint main(){return 0;}\n```";
        assert_eq!(strip_code_fences(wrapped), "int main(){return 0;}");
    }

    #[test]
    fn test_strip_fences_without_fences() {
        let plain = "int main(){return 0;}";
        assert_eq!(strip_code_fences(plain), plain);
    }

    #[test]
    fn test_strip_fences_leading_only() {
        let partial = "```\nprintf(\"hi\");";
        assert_eq!(strip_code_fences(partial), "printf(\"hi\");");
    }

    #[test]
    fn test_strip_fences_preserves_interior_lines() {
        let wrapped = "```c\nline one\n\nline three\n```";
        assert_eq!(strip_code_fences(wrapped), "line one\n\nline three");
    }
}
