use crate::llm::client::{ChatClient, ChatMessage};
use crate::llm::{parse_generation_response, GeneratedSql, LlmError, SqlGenerator};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Single-call generation: one prompt, one completion, low temperature so the
/// same question keeps producing the same SQL.
pub struct DirectGenerator {
    chat: Arc<ChatClient>,
    model: String,
}

impl DirectGenerator {
    pub fn new(chat: Arc<ChatClient>, model: String) -> Self {
        Self { chat, model }
    }

    fn prepare_prompt(&self, question: &str, user_id: &str, schema: &str) -> String {
        format!(
            r#"### Instructions:
Your task is to convert a question into a single SQL query for DuckDB, given a database schema.
Adhere to these rules:
- **Only generate SELECT statements.** Never use INSERT, UPDATE, DELETE, DROP or any other mutating verb.
- **Always filter user-scoped tables by the caller's user id**: add `"user_id" = '{user_id}'` to every table that has a user_id column.
- **Identifiers are case sensitive** - quote table and column names exactly as they appear in the schema.
- **Cap result rows** with a LIMIT clause of at most 1000.
- **Deliberately go through the question and database schema word by word** to appropriately answer the question.

### Input:
Generate a SQL query that answers the question `{question}`.
This query will run on a DuckDB database whose schema is:

{schema}

### Response format:
SQL: <the query>
EXPLANATION: <one or two sentences describing what the query does>
"#,
        )
    }
}

#[async_trait]
impl SqlGenerator for DirectGenerator {
    async fn generate_sql(
        &self,
        question: &str,
        user_id: &str,
        schema: &str,
    ) -> Result<GeneratedSql, LlmError> {
        let prompt = self.prepare_prompt(question, user_id, schema);
        debug!(prompt_len = prompt.len(), "Prepared direct generation prompt");

        let content = self
            .chat
            .chat(&self.model, 0.1, vec![ChatMessage::user(prompt)])
            .await?;

        Ok(parse_generation_response(&content))
    }

    fn name(&self) -> &'static str {
        "direct"
    }
}
