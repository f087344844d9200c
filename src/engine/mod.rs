//! Equity query engine: message in, reply text out.
//!
//! extract → parse → evaluate → parse results → render, once per query
//! substring. Substrings of one message are evaluated concurrently, at most
//! `max_concurrent_queries` at a time, and joined back in the order they
//! were written.

pub mod evaluator;
pub mod extractor;
pub mod parser;
pub mod renderer;
pub mod results;

use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::calculator::Calculator;
use crate::types::{EvaluationOutcome, QueryError};
use evaluator::{EquityEvaluator, EvaluatorConfig};

/// Cheap to clone; all clones share one evaluator and one query limit.
#[derive(Clone)]
pub struct EquityEngine {
    evaluator: Arc<EquityEvaluator>,
    permits: Arc<Semaphore>,
}

impl EquityEngine {
    pub fn new(calculator: Arc<dyn Calculator>, config: EvaluatorConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_queries.max(1)));
        Self {
            evaluator: Arc::new(EquityEvaluator::new(calculator, config)),
            permits,
        }
    }

    /// Answer a raw message body. Never fails: every error becomes text.
    pub async fn handle(&self, body: &str) -> String {
        let substrings = extractor::extract(body);
        debug!(count = substrings.len(), "Extracted query substrings");

        let tasks = substrings.into_iter().map(|substring| {
            let engine = self.clone();
            tokio::spawn(async move {
                // Held until the query is rendered.
                let Ok(_permit) = engine.permits.clone().acquire_owned().await else {
                    return renderer::render_error(&QueryError::process("query limiter closed"));
                };
                engine.answer(&substring).await
            })
        });

        let replies: Vec<String> = join_all(tasks)
            .await
            .into_iter()
            .map(|joined| {
                joined.unwrap_or_else(|e| {
                    warn!(error = %e, "Query task aborted");
                    renderer::render_error(&QueryError::process(e.to_string()))
                })
            })
            .collect();

        renderer::join_replies(&replies)
    }

    /// Whether any substring of `body` is a structurally valid query.
    pub fn contains_request(body: &str) -> bool {
        extractor::extract(body)
            .iter()
            .any(|s| parser::parse(s).is_valid())
    }

    /// Reply to a single query substring.
    async fn answer(&self, substring: &str) -> String {
        match self.compute(substring).await {
            Ok(reply) => reply,
            Err(e) => {
                if let QueryError::ProcessError { reason } = &e {
                    warn!(query = substring, reason = %reason, "Query failed in calculator");
                } else {
                    debug!(query = substring, kind = e.kind(), "Query rejected");
                }
                renderer::render_error(&e)
            }
        }
    }

    async fn compute(&self, substring: &str) -> Result<String, QueryError> {
        let mut query = parser::parse(substring);
        if let Some(e) = query.error() {
            return Err(e.clone());
        }

        let raw_output = match self.evaluator.evaluate(&mut query).await {
            EvaluationOutcome::Success { raw_output, .. } => raw_output,
            EvaluationOutcome::Failure(kind) => return Err(kind.into()),
        };

        let results = results::parse_results(&raw_output)?;
        info!(
            query = %query,
            monte_carlo = query.monte_carlo_escalated,
            rows = results.len(),
            "Equity computed"
        );

        Ok(renderer::render_table(
            &results,
            query.monte_carlo_escalated,
            self.evaluator.config().stage1_time_budget_secs,
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
