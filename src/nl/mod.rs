pub mod comparator;
pub mod executor;
pub mod schema_context;
pub mod synthesizer;
pub mod validator;

use crate::error::AppError;
use crate::llm::{LlmError, SqlGenerator};
use crate::nl::executor::QueryExecutor;
use crate::nl::synthesizer::ResponseSynthesizer;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of one full question-to-answer run. Created once per request,
/// never mutated; retained only in the analytics log.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub question: String,
    pub answer: String,
    pub sql: String,
    pub explanation: String,
    pub result_count: usize,
    pub warnings: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Wires generation, validation, execution and synthesis into one strictly
/// sequential flow. Stateless across requests; the only shared resources are
/// the connection pool and the chat client held by the stages.
pub struct QueryPipeline {
    generator: Arc<dyn SqlGenerator>,
    executor: Arc<QueryExecutor>,
    synthesizer: Arc<ResponseSynthesizer>,
}

impl QueryPipeline {
    pub fn new(
        generator: Arc<dyn SqlGenerator>,
        executor: Arc<QueryExecutor>,
        synthesizer: Arc<ResponseSynthesizer>,
    ) -> Self {
        Self {
            generator,
            executor,
            synthesizer,
        }
    }

    pub fn method(&self) -> &'static str {
        self.generator.name()
    }

    /// Runs the pipeline for one question scoped to one user.
    ///
    /// A validation rejection stops the flow before execution; every stage
    /// failure keeps its classified kind so the HTTP layer maps the status
    /// from the error alone.
    pub async fn process(&self, question: &str, user_id: &str) -> Result<QueryOutcome, AppError> {
        let generated = self
            .generator
            .generate_sql(question, user_id, schema_context::schema_text())
            .await
            .map_err(classify_llm_error)?;

        info!(method = self.generator.name(), sql = %generated.sql, "SQL generated");

        let validation = validator::validate(&generated.sql, user_id);
        if !validation.is_valid {
            warn!(errors = ?validation.errors, "Generated SQL rejected");
            return Err(AppError::validation_with_details(
                "Generated SQL failed safety validation",
                validation.errors,
            ));
        }

        // is_valid guarantees the sanitized statement is present
        let sanitized = validation
            .sanitized_sql
            .ok_or_else(|| AppError::Internal("valid result without sanitized SQL".to_string()))?;

        let rows = self.executor.execute(&sanitized).await?;

        let answer = self
            .synthesizer
            .generate_response(question, &sanitized, &rows, &generated.explanation)
            .await
            .map_err(classify_llm_error)?;

        let outcome = QueryOutcome {
            question: question.to_string(),
            answer,
            sql: sanitized,
            explanation: generated.explanation,
            result_count: rows.len(),
            warnings: validation.warnings,
            timestamp: Utc::now(),
        };

        // Analytics is best-effort by construction: a structured event that
        // can never fail the request.
        info!(
            method = self.generator.name(),
            question = %outcome.question,
            sql = %outcome.sql,
            result_count = outcome.result_count,
            "Pipeline outcome"
        );

        Ok(outcome)
    }
}

fn classify_llm_error(err: LlmError) -> AppError {
    match err {
        LlmError::ConnectionError(msg) | LlmError::ResponseError(msg) => {
            AppError::external("OpenAI", msg)
        }
        LlmError::ConfigError(msg) => AppError::Internal(msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_transport_failures_classify_as_service_errors() {
        let err = classify_llm_error(LlmError::ConnectionError("timed out".to_string()));
        assert_eq!(err.code(), "SERVICE_ERROR");

        let err = classify_llm_error(LlmError::ResponseError("bad status".to_string()));
        assert_eq!(err.code(), "SERVICE_ERROR");

        let err = classify_llm_error(LlmError::ConfigError("no backend".to_string()));
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }
}
