use crate::llm::client::{ChatClient, ChatMessage};
use crate::llm::{parse_generation_response, GeneratedSql, LlmError, SqlGenerator};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Prompt-chain generation: a reusable template rendered with the request
/// values, piped through a cheaper model tier at temperature zero, then
/// through the shared response parser. Satisfies the same contract as the
/// direct variant; the comparator treats the two as interchangeable.
pub struct ChainGenerator {
    chat: Arc<ChatClient>,
    model: String,
    template: PromptTemplate,
}

/// Minimal placeholder template; `{name}` markers are substituted at render
/// time so the template itself stays a reusable constant.
struct PromptTemplate {
    system: &'static str,
    user: &'static str,
}

impl PromptTemplate {
    fn render(&self, values: &[(&str, &str)]) -> (String, String) {
        let mut system = self.system.to_string();
        let mut user = self.user.to_string();
        for (name, value) in values {
            let marker = format!("{{{}}}", name);
            system = system.replace(&marker, value);
            user = user.replace(&marker, value);
        }
        (system, user)
    }
}

const SQL_CHAIN_TEMPLATE: PromptTemplate = PromptTemplate {
    system: r#"You are a SQL generation assistant for a DuckDB database of a user's aggregated files, emails and Trello cards.
Rules, in priority order:
1. Output exactly one SELECT statement. No mutating or administrative verbs of any kind.
2. Every table holding per-user data must be filtered with "user_id" = '{user_id}'.
3. Quote identifiers; they are case sensitive.
4. Add LIMIT 1000 or less.
Respond with a line starting `SQL:` followed by a line starting `EXPLANATION:`."#,
    user: r#"Database schema:
{schema}

Question: {question}"#,
};

impl ChainGenerator {
    pub fn new(chat: Arc<ChatClient>, model: String) -> Self {
        Self {
            chat,
            model,
            template: SQL_CHAIN_TEMPLATE,
        }
    }
}

#[async_trait]
impl SqlGenerator for ChainGenerator {
    async fn generate_sql(
        &self,
        question: &str,
        user_id: &str,
        schema: &str,
    ) -> Result<GeneratedSql, LlmError> {
        let (system, user) = self.template.render(&[
            ("user_id", user_id),
            ("schema", schema),
            ("question", question),
        ]);
        debug!(model = %self.model, "Rendered chain generation template");

        let content = self
            .chat
            .chat(
                &self.model,
                0.0,
                vec![ChatMessage::system(system), ChatMessage::user(user)],
            )
            .await?;

        Ok(parse_generation_response(&content))
    }

    fn name(&self) -> &'static str {
        "langchain"
    }
}
