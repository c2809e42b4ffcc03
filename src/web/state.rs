use crate::config::AppConfig;
use crate::db::pool::DuckDbConnectionManager;
use crate::llm::client::ChatClient;
use crate::llm::providers::chain::ChainGenerator;
use crate::llm::providers::direct::DirectGenerator;
use crate::llm::LlmError;
use crate::nl::comparator::PipelineComparator;
use crate::nl::executor::QueryExecutor;
use crate::nl::synthesizer::ResponseSynthesizer;
use crate::nl::QueryPipeline;
use r2d2::Pool;
use std::sync::Arc;

/// The fully wired NL stack. Only present when a model API key is
/// configured; its absence turns into a 401 at request time rather than a
/// startup failure.
pub struct LlmStack {
    pub chat: Arc<ChatClient>,
    pub direct: Arc<QueryPipeline>,
    pub chain: Arc<QueryPipeline>,
    pub comparator: PipelineComparator,
}

/// Shared application state for the web server.
pub struct AppState {
    pub executor: Arc<QueryExecutor>,
    pub llm: Option<LlmStack>,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(
        config: &AppConfig,
        db_pool: Pool<DuckDbConnectionManager>,
    ) -> Result<Self, LlmError> {
        let executor = Arc::new(QueryExecutor::new(db_pool));

        let llm = match &config.llm.api_key {
            Some(api_key) => {
                let chat = Arc::new(ChatClient::new(
                    config.llm.api_url.clone(),
                    api_key.clone(),
                )?);

                let synthesizer = Arc::new(ResponseSynthesizer::new(
                    Arc::clone(&chat),
                    config.llm.model.clone(),
                ));

                let direct = Arc::new(QueryPipeline::new(
                    Arc::new(DirectGenerator::new(
                        Arc::clone(&chat),
                        config.llm.model.clone(),
                    )),
                    Arc::clone(&executor),
                    Arc::clone(&synthesizer),
                ));

                let chain = Arc::new(QueryPipeline::new(
                    Arc::new(ChainGenerator::new(
                        Arc::clone(&chat),
                        config.llm.chain_model.clone(),
                    )),
                    Arc::clone(&executor),
                    Arc::clone(&synthesizer),
                ));

                let comparator =
                    PipelineComparator::new(Arc::clone(&direct), Arc::clone(&chain));

                Some(LlmStack {
                    chat,
                    direct,
                    chain,
                    comparator,
                })
            }
            None => None,
        };

        Ok(Self {
            executor,
            llm,
            startup_time: chrono::Utc::now(),
        })
    }
}
