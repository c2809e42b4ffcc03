use axum::{
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::error::AppError;
use crate::nl::QueryOutcome;
use crate::web::envelope::ApiResponse;
use crate::web::state::{AppState, LlmStack};

/// Questions longer than this are rejected before any model call.
const MAX_QUESTION_LENGTH: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: Option<String>,
}

/// Identity is resolved by the auth layer in front of this service and
/// forwarded in a header; this subsystem never sees credentials.
fn require_user(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .ok_or_else(|| AppError::Authentication("missing user identity".to_string()))
}

fn validate_question(raw: Option<&str>) -> Result<String, AppError> {
    let question = raw.unwrap_or_default().trim().to_string();
    if question.is_empty() {
        return Err(AppError::validation("Question is required"));
    }
    if question.chars().count() > MAX_QUESTION_LENGTH {
        return Err(AppError::validation(format!(
            "Question exceeds maximum length of {} characters",
            MAX_QUESTION_LENGTH
        )));
    }
    Ok(question)
}

fn require_llm(state: &AppState) -> Result<&LlmStack, AppError> {
    state
        .llm
        .as_ref()
        .ok_or_else(|| AppError::Authentication("OpenAI API key is not configured".to_string()))
}

fn outcome_payload(outcome: &QueryOutcome, method: Option<&str>) -> serde_json::Value {
    let mut payload = json!({
        "question": outcome.question,
        "answer": outcome.answer,
        "sql": {
            "query": outcome.sql,
            "explanation": outcome.explanation,
            "resultCount": outcome.result_count,
        },
        "warnings": outcome.warnings,
        "timestamp": outcome.timestamp.to_rfc3339(),
    });
    if let Some(method) = method {
        payload["method"] = json!(method);
    }
    payload
}

/// POST /api/nl-to-sql
pub async fn ask(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<AskRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = require_user(&headers)?;
    let question = validate_question(payload.question.as_deref())?;
    let llm = require_llm(&state)?;

    info!(question = %question, "NL question received");
    let outcome = llm.direct.process(&question, &user_id).await?;

    Ok(ApiResponse::success(outcome_payload(&outcome, None)))
}

/// POST /api/nl-to-sql/langchain
pub async fn ask_langchain(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<AskRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = require_user(&headers)?;
    let question = validate_question(payload.question.as_deref())?;
    let llm = require_llm(&state)?;

    info!(question = %question, "NL question received (chain variant)");
    let outcome = llm.chain.process(&question, &user_id).await?;

    Ok(ApiResponse::success(outcome_payload(
        &outcome,
        Some(llm.chain.method()),
    )))
}

/// POST /api/nl-to-sql/compare
///
/// Diagnostic: runs both variants against the same question and reports
/// divergence. A failed arm shows up in the report instead of failing the
/// request.
pub async fn compare(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<AskRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = require_user(&headers)?;
    let question = validate_question(payload.question.as_deref())?;
    let llm = require_llm(&state)?;

    let report = llm.comparator.compare(&question, &user_id).await;
    let data = serde_json::to_value(&report)
        .map_err(|e| AppError::Internal(format!("failed to serialize comparison: {}", e)))?;

    Ok(ApiResponse::success(data))
}

/// GET /api/nl-to-sql/health
///
/// Probes connectivity for real: a round-trip query against the store and an
/// authenticated models listing against the model provider. Configuration
/// presence alone is not health.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = state.executor.ping().await;
    let openai = match &state.llm {
        Some(llm) => llm.chat.probe().await,
        None => false,
    };
    let services = state.llm.is_some();
    let healthy = database && openai && services;
    let uptime = (chrono::Utc::now() - state.startup_time).num_seconds();

    ApiResponse::success(json!({
        "healthy": healthy,
        "checks": {
            "openai": openai,
            "database": database,
            "services": services,
        },
        "uptimeSeconds": uptime,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn question_boundaries() {
        assert!(validate_question(None).is_err());
        assert!(validate_question(Some("")).is_err());
        assert!(validate_question(Some("   ")).is_err());

        let exactly_max = "q".repeat(MAX_QUESTION_LENGTH);
        assert_eq!(validate_question(Some(&exactly_max)).unwrap(), exactly_max);

        let too_long = "q".repeat(MAX_QUESTION_LENGTH + 1);
        let err = validate_question(Some(&too_long)).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn question_is_trimmed_before_length_check() {
        let padded = format!("  {}  ", "q".repeat(MAX_QUESTION_LENGTH));
        assert!(validate_question(Some(&padded)).is_ok());
    }

    #[test]
    fn user_identity_comes_from_the_forwarded_header() {
        let mut headers = HeaderMap::new();
        assert!(require_user(&headers).is_err());

        headers.insert("x-user-id", HeaderValue::from_static("user-123"));
        assert_eq!(require_user(&headers).unwrap(), "user-123");

        headers.insert("x-user-id", HeaderValue::from_static("   "));
        assert!(require_user(&headers).is_err());
    }

    #[test]
    fn payload_carries_method_discriminator_only_when_asked() {
        let outcome = QueryOutcome {
            question: "q".to_string(),
            answer: "a".to_string(),
            sql: "SELECT 1 LIMIT 1".to_string(),
            explanation: "e".to_string(),
            result_count: 1,
            warnings: vec!["w".to_string()],
            timestamp: chrono::Utc::now(),
        };

        let plain = outcome_payload(&outcome, None);
        assert!(plain.get("method").is_none());
        assert_eq!(plain["sql"]["resultCount"], json!(1));
        assert_eq!(plain["warnings"], json!(["w"]));

        let tagged = outcome_payload(&outcome, Some("langchain"));
        assert_eq!(tagged["method"], json!("langchain"));
    }
}
