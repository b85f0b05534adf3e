//! Question answering pipeline
//!
//! link entities → select fields → extract facts per (entity, type) →
//! rank → assemble prompt → generate. A failed extraction only removes that
//! pair's contribution; the only error surfaced to callers is a linker
//! failure (or an expired deadline with `answer_within`).

use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::graph::GraphStore;
use crate::inference::{GenerationTransport, ResilientInferenceClient, RetryPolicy};
use crate::knowledge::{
    Fact, FactRanker, FieldSelector, GraphFactExtractor, PromptAssembler, RankLimits,
};
use crate::linking::EntityLinker;
use crate::metrics;
use crate::schema::KnowledgeSchema;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Returned when the question mentions no known entity
pub const NO_ENTITY_ANSWER: &str = "抱歉，我在知识库中没有找到对应的实体，无法回答。";

/// Shown in place of an answer when generation ran out of attempts
pub const GENERATION_APOLOGY: &str = "抱歉，生成答案时出现错误。请稍后重试。";

/// How a question was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    Generated,
    NoEntityFound,
    GenerationUnavailable,
}

impl AnswerOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerOutcome::Generated => "generated",
            AnswerOutcome::NoEntityFound => "no_entity_found",
            AnswerOutcome::GenerationUnavailable => "generation_unavailable",
        }
    }
}

/// Result of one question
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    /// Generated text, the no-entity sentinel, or "" when generation failed
    pub text: String,
    pub outcome: AnswerOutcome,
    /// Ranked facts the prompt was built from
    pub evidence: Vec<Fact>,
    /// Prompt sent to the generation service, if one was sent
    pub prompt: Option<String>,
}

impl Answer {
    fn no_entity() -> Self {
        Self {
            text: NO_ENTITY_ANSWER.to_string(),
            outcome: AnswerOutcome::NoEntityFound,
            evidence: Vec::new(),
            prompt: None,
        }
    }

    /// Text to present to a user; never empty
    pub fn display_text(&self) -> &str {
        match self.outcome {
            AnswerOutcome::GenerationUnavailable => GENERATION_APOLOGY,
            _ => &self.text,
        }
    }
}

/// Composes linking, retrieval, ranking, prompting and generation
pub struct RetrievalOrchestrator {
    linker: Arc<dyn EntityLinker>,
    selector: FieldSelector,
    extractor: GraphFactExtractor,
    ranker: FactRanker,
    assembler: PromptAssembler,
    client: ResilientInferenceClient,
    depth: u32,
    max_tokens: u32,
    concurrency: usize,
}

impl RetrievalOrchestrator {
    pub fn new(
        config: &AppConfig,
        schema: Arc<KnowledgeSchema>,
        linker: Arc<dyn EntityLinker>,
        store: Arc<dyn GraphStore>,
        transport: Arc<dyn GenerationTransport>,
    ) -> Self {
        let profile = config.retrieval.profile;
        let priority_predicates = if profile.priority_filter() {
            schema.priority_predicates.clone()
        } else {
            BTreeSet::new()
        };
        let limits = RankLimits {
            max_total: config.retrieval.max_total_facts,
            max_per_batch: config.retrieval.max_direct_facts,
        };

        info!(
            profile = ?profile,
            max_total = limits.max_total,
            max_per_batch = limits.max_per_batch,
            depth = config.graph.depth,
            "Retrieval pipeline configured"
        );

        Self {
            linker,
            selector: FieldSelector::new(schema.clone()),
            extractor: GraphFactExtractor::new(store, schema, profile),
            ranker: FactRanker::new(priority_predicates, limits),
            assembler: PromptAssembler::new(config.retrieval.prompt_max_items),
            client: ResilientInferenceClient::new(transport, RetryPolicy::from(&config.generation)),
            depth: config.graph.depth.max(1),
            max_tokens: config.generation.max_tokens,
            concurrency: config.retrieval.extraction_concurrency.max(1),
        }
    }

    /// Answer one question
    #[instrument(skip(self, question), fields(question_id = %Uuid::new_v4()))]
    pub async fn answer(&self, question: &str) -> Result<Answer> {
        let entities = self.linker.link(question).await?;
        if entities.is_empty() {
            info!("No entity found in question");
            metrics::record_question(AnswerOutcome::NoEntityFound.as_str());
            return Ok(Answer::no_entity());
        }

        let pairs: Vec<(String, String)> = entities
            .iter()
            .flat_map(|e| e.types.iter().map(move |t| (e.name.clone(), t.clone())))
            .collect();
        info!(entities = entities.len(), pairs = pairs.len(), "Linked entities");

        let candidates: Vec<Fact> = stream::iter(pairs)
            .map(|(name, entity_type)| async move { self.extract_pair(&name, &entity_type).await })
            .buffered(self.concurrency)
            .concat()
            .await;

        let candidate_count = candidates.len();
        let evidence = self.ranker.rank(candidates);
        metrics::record_evidence(candidate_count, evidence.len());
        info!(candidates = candidate_count, kept = evidence.len(), "Evidence selected");

        let prompt = self.assembler.assemble(question, &evidence);
        let result = self
            .client
            .chat(&prompt, Value::Array(Vec::new()), self.max_tokens)
            .await;

        let outcome = if result.succeeded() {
            AnswerOutcome::Generated
        } else {
            AnswerOutcome::GenerationUnavailable
        };
        metrics::record_question(outcome.as_str());
        info!(outcome = outcome.as_str(), attempts = result.attempts, "Question answered");

        Ok(Answer {
            text: result.text,
            outcome,
            evidence,
            prompt: Some(prompt),
        })
    }

    /// Answer one question, abandoning all in-flight work after `deadline`
    pub async fn answer_within(&self, question: &str, deadline: Duration) -> Result<Answer> {
        tokio::time::timeout(deadline, self.answer(question))
            .await
            .map_err(|_| {
                warn!(deadline_ms = deadline.as_millis() as u64, "Question deadline exceeded");
                AppError::Timeout {
                    timeout_ms: deadline.as_millis() as u64,
                }
            })?
    }

    /// Facts for one pair; a failure is logged and contributes nothing
    async fn extract_pair(&self, name: &str, entity_type: &str) -> Vec<Fact> {
        let fields = self.selector.select_fields(entity_type);
        match self.extractor.extract(name, entity_type, &fields, self.depth).await {
            Ok(facts) => facts,
            Err(e) => {
                warn!(entity = %name, entity_type = %entity_type, error = %e, "Skipping entity after graph failure");
                Vec::new()
            }
        }
    }
}
