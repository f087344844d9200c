//! Two-stage equity evaluation.
//!
//! Stage 1 asks the calculator for an exact answer under a short budget.
//! If it reports that enumeration ran out of time, stage 2 re-runs the
//! same query with Monte Carlo sampling and a longer budget. Stage 2 output
//! is always final.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::calculator::{
    Calculator, Invocation, RawRun, RunStatus, DEFAULT_CONFLICT_EXIT_CODE,
    DEFAULT_MAX_CONCURRENT_QUERIES, DEFAULT_MC_ERROR_MARGIN,
};
use crate::engine::results::parse_status;
use crate::types::{EvaluationOutcome, FailureKind, ParsedQuery, QueryError};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Budgets and codes for the two-stage protocol.
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// Exact enumeration budget in seconds.
    pub stage1_time_budget_secs: f64,
    /// Monte Carlo budget in seconds. Must exceed the stage 1 budget.
    pub stage2_time_budget_secs: f64,
    pub mc_error_margin: f64,
    pub conflict_exit_code: i32,
    /// Queries of one message allowed to run the calculator at once.
    pub max_concurrent_queries: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            stage1_time_budget_secs: 3.0,
            stage2_time_budget_secs: 5.0,
            mc_error_margin: DEFAULT_MC_ERROR_MARGIN,
            conflict_exit_code: DEFAULT_CONFLICT_EXIT_CODE,
            max_concurrent_queries: DEFAULT_MAX_CONCURRENT_QUERIES,
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

/// Where the protocol currently is. `EscalatedMonteCarlo` can only move to
/// `Done`, so a query escalates at most once.
#[derive(Debug)]
enum Stage {
    Direct,
    EscalatedMonteCarlo,
    Done(EvaluationOutcome),
}

pub struct EquityEvaluator {
    calculator: Arc<dyn Calculator>,
    config: EvaluatorConfig,
}

impl EquityEvaluator {
    pub fn new(calculator: Arc<dyn Calculator>, config: EvaluatorConfig) -> Self {
        Self { calculator, config }
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Drive the calculator for a valid query.
    ///
    /// Sets `query.monte_carlo_escalated` when stage 2 runs.
    pub async fn evaluate(&self, query: &mut ParsedQuery) -> EvaluationOutcome {
        if !query.is_valid() {
            return EvaluationOutcome::Failure(FailureKind::ProcessError {
                reason: "query was not validated".to_string(),
            });
        }

        let mut stage = Stage::Direct;
        loop {
            stage = match stage {
                Stage::Direct => {
                    let invocation = Invocation::for_query(query)
                        .with_time_budget(self.config.stage1_time_budget_secs);
                    match self.run_stage(&invocation, "direct").await {
                        Err(failure) => Stage::Done(EvaluationOutcome::Failure(failure)),
                        Ok(run) => match parse_status(&run.stdout) {
                            Ok(RunStatus::BudgetExceeded) => {
                                info!(
                                    query = %query,
                                    budget_secs = self.config.stage1_time_budget_secs,
                                    "Exact enumeration exceeded budget, escalating to Monte Carlo"
                                );
                                Stage::EscalatedMonteCarlo
                            }
                            Ok(_) => Stage::Done(EvaluationOutcome::Success {
                                raw_output: run.stdout,
                                used_monte_carlo: false,
                            }),
                            Err(e) => Stage::Done(EvaluationOutcome::Failure(unreadable_output(e))),
                        },
                    }
                }
                Stage::EscalatedMonteCarlo => {
                    query.monte_carlo_escalated = true;
                    let invocation = Invocation::for_query(query)
                        .with_time_budget(self.config.stage2_time_budget_secs)
                        .with_monte_carlo(self.config.mc_error_margin);
                    let outcome = match self.run_stage(&invocation, "monte_carlo").await {
                        Ok(run) => EvaluationOutcome::Success {
                            raw_output: run.stdout,
                            used_monte_carlo: true,
                        },
                        Err(failure) => EvaluationOutcome::Failure(failure),
                    };
                    Stage::Done(outcome)
                }
                Stage::Done(outcome) => return outcome,
            };
        }
    }

    /// Run one invocation and map its exit code.
    async fn run_stage(&self, invocation: &Invocation, stage: &str) -> Result<RawRun, FailureKind> {
        let run = self.calculator.run(invocation).await.map_err(|e| {
            warn!(stage, error = %e, "Calculator invocation failed");
            FailureKind::ProcessError {
                reason: e.to_string(),
            }
        })?;

        debug!(stage, exit_code = ?run.exit_code, "Calculator stage complete");
        self.classify_exit(run)
    }

    fn classify_exit(&self, run: RawRun) -> Result<RawRun, FailureKind> {
        match run.exit_code {
            Some(0) => Ok(run),
            Some(code) if code == self.config.conflict_exit_code => Err(FailureKind::RangeConflict),
            Some(code) => {
                let detail = run.error_fragment();
                debug!(code, detail = ?detail, "Calculator rejected a range");
                Err(FailureKind::InvalidRange { detail })
            }
            None => Err(FailureKind::ProcessError {
                reason: "calculator terminated by signal".to_string(),
            }),
        }
    }
}

fn unreadable_output(error: QueryError) -> FailureKind {
    match error {
        QueryError::ProcessError { reason } => FailureKind::ProcessError { reason },
        other => FailureKind::ProcessError {
            reason: other.kind().to_string(),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
