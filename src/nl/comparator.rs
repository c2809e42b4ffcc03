use crate::nl::{QueryOutcome, QueryPipeline};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

/// Outcome of one comparison arm. Partial failures are captured, not
/// propagated; the arm that worked still reports in full.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmOutcome {
    pub method: &'static str,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ArmOutcome {
    fn from_result(method: &'static str, result: &Result<QueryOutcome, String>) -> Self {
        match result {
            Ok(outcome) => Self {
                method,
                success: true,
                answer: Some(outcome.answer.clone()),
                sql: Some(outcome.sql.clone()),
                result_count: Some(outcome.result_count),
                error: None,
            },
            Err(message) => Self {
                method,
                success: false,
                answer: None,
                sql: None,
                result_count: None,
                error: Some(message.clone()),
            },
        }
    }
}

/// Diagnostic summary of running both generation strategies on one question.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    pub question: String,
    pub both_successful: bool,
    pub original_success: bool,
    pub langchain_success: bool,
    /// None unless both arms produced SQL.
    pub sql_matches: Option<bool>,
    /// None unless both arms produced rows.
    pub result_count_matches: Option<bool>,
    pub original: ArmOutcome,
    pub langchain: ArmOutcome,
    pub timestamp: chrono::DateTime<Utc>,
}

/// Runs the single-call and chain pipelines side by side and reports their
/// divergence. Purely diagnostic; never gates the production path.
pub struct PipelineComparator {
    direct: Arc<QueryPipeline>,
    chain: Arc<QueryPipeline>,
}

impl PipelineComparator {
    pub fn new(direct: Arc<QueryPipeline>, chain: Arc<QueryPipeline>) -> Self {
        Self { direct, chain }
    }

    /// Both arms run as independently spawned tasks; a failure (or panic) in
    /// one never cancels or blocks the other.
    pub async fn compare(&self, question: &str, user_id: &str) -> ComparisonReport {
        let direct_task = {
            let pipeline = Arc::clone(&self.direct);
            let question = question.to_string();
            let user_id = user_id.to_string();
            tokio::spawn(async move { pipeline.process(&question, &user_id).await })
        };
        let chain_task = {
            let pipeline = Arc::clone(&self.chain);
            let question = question.to_string();
            let user_id = user_id.to_string();
            tokio::spawn(async move { pipeline.process(&question, &user_id).await })
        };

        let (direct_joined, chain_joined) = tokio::join!(direct_task, chain_task);

        let direct_result = flatten_join(direct_joined);
        let chain_result = flatten_join(chain_joined);

        if let Err(e) = &direct_result {
            error!(method = "direct", error = %e, "Comparison arm failed");
        }
        if let Err(e) = &chain_result {
            error!(method = "langchain", error = %e, "Comparison arm failed");
        }

        let report = build_report(question, &direct_result, &chain_result);
        info!(
            both_successful = report.both_successful,
            sql_matches = ?report.sql_matches,
            "Pipeline comparison finished"
        );
        report
    }
}

fn flatten_join(
    joined: Result<Result<QueryOutcome, crate::error::AppError>, tokio::task::JoinError>,
) -> Result<QueryOutcome, String> {
    match joined {
        Ok(Ok(outcome)) => Ok(outcome),
        Ok(Err(err)) => Err(err.to_string()),
        Err(join_err) => Err(format!("task panicked: {}", join_err)),
    }
}

fn build_report(
    question: &str,
    direct: &Result<QueryOutcome, String>,
    chain: &Result<QueryOutcome, String>,
) -> ComparisonReport {
    let original = ArmOutcome::from_result("direct", direct);
    let langchain = ArmOutcome::from_result("langchain", chain);

    let sql_matches = match (&original.sql, &langchain.sql) {
        (Some(a), Some(b)) => Some(normalize_sql(a) == normalize_sql(b)),
        _ => None,
    };
    let result_count_matches = match (original.result_count, langchain.result_count) {
        (Some(a), Some(b)) => Some(a == b),
        _ => None,
    };

    ComparisonReport {
        question: question.to_string(),
        both_successful: original.success && langchain.success,
        original_success: original.success,
        langchain_success: langchain.success,
        sql_matches,
        result_count_matches,
        original,
        langchain,
        timestamp: Utc::now(),
    }
}

/// Case and whitespace do not make two statements different queries.
fn normalize_sql(sql: &str) -> String {
    sql.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
