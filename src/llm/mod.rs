pub mod client;
pub mod providers;

use async_trait::async_trait;
use regex::Regex;
use std::error::Error;
use std::fmt;
use std::sync::LazyLock;

#[derive(Debug)]
pub enum LlmError {
    ConnectionError(String),
    ResponseError(String),
    ConfigError(String),
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::ConnectionError(msg) => write!(f, "LLM connection error: {}", msg),
            LlmError::ResponseError(msg) => write!(f, "LLM response error: {}", msg),
            LlmError::ConfigError(msg) => write!(f, "LLM configuration error: {}", msg),
        }
    }
}

impl Error for LlmError {}

/// A candidate SQL statement plus the model's explanation of it.
///
/// Untrusted until it has passed the safety validator.
#[derive(Debug, Clone)]
pub struct GeneratedSql {
    pub sql: String,
    pub explanation: String,
}

/// A strategy for turning a question into SQL scoped to one user.
///
/// Implementations are stateless adapters over the chat client; the
/// pipeline and comparator depend only on this trait.
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    async fn generate_sql(
        &self,
        question: &str,
        user_id: &str,
        schema: &str,
    ) -> Result<GeneratedSql, LlmError>;

    /// Discriminator used in logs and comparison payloads.
    fn name(&self) -> &'static str;
}

static SQL_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bSQL\s*:").unwrap());
static EXPLANATION_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bEXPLANATION\s*:").unwrap());

/// Splits a model response into SQL and explanation segments.
///
/// The prompt asks for `SQL:` and `EXPLANATION:` labeled sections, but models
/// drift: the SQL may arrive fenced, the labels may be missing entirely. When
/// no usable structure is found the whole trimmed response is treated as SQL
/// with a generic explanation, so a sloppy response never turns into a crash.
/// The validator decides whether the result is actually executable.
pub fn parse_generation_response(content: &str) -> GeneratedSql {
    if let Some(label) = SQL_LABEL_RE.find(content) {
        let after_label = &content[label.end()..];
        let (sql_part, explanation) = match EXPLANATION_LABEL_RE.find(after_label) {
            Some(expl) => (
                &after_label[..expl.start()],
                after_label[expl.end()..].trim().to_string(),
            ),
            None => (after_label, String::new()),
        };

        let sql = strip_code_fences(sql_part);
        if !sql.is_empty() {
            let explanation = if explanation.is_empty() {
                "Generated SQL query for the question.".to_string()
            } else {
                explanation
            };
            return GeneratedSql { sql, explanation };
        }
    }

    // No labels; a fenced block alone is still usable
    let fenced = strip_code_fences(content);
    GeneratedSql {
        sql: fenced,
        explanation: "Generated SQL query for the question.".to_string(),
    }
}

fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();

    if let Some(start) = trimmed.find("```sql") {
        let after = &trimmed[start + 6..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
        return after.trim().to_string();
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
        return after.trim().to_string();
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_labeled_sections() {
        let content = "SQL: SELECT 1\nEXPLANATION: Counts one thing.";
        let parsed = parse_generation_response(content);
        assert_eq!(parsed.sql, "SELECT 1");
        assert_eq!(parsed.explanation, "Counts one thing.");
    }

    #[test]
    fn strips_markdown_fences_inside_sql_section() {
        let content = "SQL:\n```sql\nSELECT COUNT(*) FROM \"File\"\n```\nEXPLANATION: File count.";
        let parsed = parse_generation_response(content);
        assert_eq!(parsed.sql, "SELECT COUNT(*) FROM \"File\"");
        assert_eq!(parsed.explanation, "File count.");
    }

    #[test]
    fn labels_are_case_insensitive() {
        let content = "sql: SELECT 2\nexplanation: Two.";
        let parsed = parse_generation_response(content);
        assert_eq!(parsed.sql, "SELECT 2");
        assert_eq!(parsed.explanation, "Two.");
    }

    #[test]
    fn fenced_block_without_labels() {
        let content = "Here you go:\n```sql\nSELECT 3\n```";
        let parsed = parse_generation_response(content);
        assert_eq!(parsed.sql, "SELECT 3");
    }

    #[test]
    fn unlabeled_response_falls_back_to_whole_text() {
        let content = "  SELECT * FROM \"Email\"  ";
        let parsed = parse_generation_response(content);
        assert_eq!(parsed.sql, "SELECT * FROM \"Email\"");
        assert_eq!(parsed.explanation, "Generated SQL query for the question.");
    }

    #[test]
    fn missing_explanation_gets_generic_text() {
        let parsed = parse_generation_response("SQL: SELECT 4");
        assert_eq!(parsed.sql, "SELECT 4");
        assert!(!parsed.explanation.is_empty());
    }
}
