//! External equity calculator integration.
//!
//! Defines the `Calculator` trait and the invocation/run types shared by
//! the evaluator and the `holdem-eval` process adapter.
//!
//! CLI contract: 2–6 positional ranges, `-b`/`-d` for board and dead
//! cards, `--mc` + `-e` for Monte Carlo, `-t` for the time budget and
//! `--format` for machine-readable output. Exit code 8 is a card
//! conflict; any other non-zero exit is an invalid range.

pub mod build;
pub mod holdem;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::types::{OptionKind, ParsedQuery};

/// Time budget used when a caller does not pick one.
pub const DEFAULT_TIME_BUDGET_SECS: f64 = 15.0;

/// Default Monte Carlo error margin passed with `-e`.
pub const DEFAULT_MC_ERROR_MARGIN: f64 = 1e-4;

/// Exit code the calculator uses for overlapping cards.
pub const DEFAULT_CONFLICT_EXIT_CODE: i32 = 8;

/// Calculator processes one message may have running at once.
pub const DEFAULT_MAX_CONCURRENT_QUERIES: usize = 4;

// ---------------------------------------------------------------------------
// Status line
// ---------------------------------------------------------------------------

/// Code on the first line of calculator stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Exact enumeration finished inside the budget.
    Exact,
    /// Exact enumeration ran out of time; no results follow.
    BudgetExceeded,
    /// Results come from Monte Carlo sampling.
    MonteCarlo,
}

impl RunStatus {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(RunStatus::Exact),
            1 => Some(RunStatus::BudgetExceeded),
            2 => Some(RunStatus::MonteCarlo),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Invocation
// ---------------------------------------------------------------------------

/// Everything needed to run the calculator once.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub ranges: Vec<String>,
    pub options: BTreeMap<OptionKind, String>,
    pub monte_carlo: bool,
    pub error_margin: f64,
    pub time_budget_secs: f64,
}

impl Invocation {
    /// Exact-mode invocation with the default time budget.
    pub fn new(ranges: Vec<String>, options: BTreeMap<OptionKind, String>) -> Self {
        Self {
            ranges,
            options,
            monte_carlo: false,
            error_margin: DEFAULT_MC_ERROR_MARGIN,
            time_budget_secs: DEFAULT_TIME_BUDGET_SECS,
        }
    }

    pub fn for_query(query: &ParsedQuery) -> Self {
        Self::new(query.ranges.clone(), query.options.clone())
    }

    pub fn with_time_budget(mut self, secs: f64) -> Self {
        self.time_budget_secs = secs;
        self
    }

    pub fn with_monte_carlo(mut self, error_margin: f64) -> Self {
        self.monte_carlo = true;
        self.error_margin = error_margin;
        self
    }

    /// Argument vector, flags first and ranges last.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "--format".to_string(),
            "-t".to_string(),
            self.time_budget_secs.to_string(),
        ];
        if self.monte_carlo {
            args.push("--mc".to_string());
            args.push("-e".to_string());
            args.push(self.error_margin.to_string());
        }
        for (kind, cards) in &self.options {
            args.push(kind.flag().to_string());
            args.push(cards.clone());
        }
        args.extend(self.ranges.iter().cloned());
        args
    }
}

// ---------------------------------------------------------------------------
// Run result
// ---------------------------------------------------------------------------

/// Captured result of one calculator process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRun {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl RawRun {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Human-readable tail of stderr: the clause after the last `:`.
    pub fn error_fragment(&self) -> Option<String> {
        let line = self.stderr.trim().lines().last()?;
        let fragment = match line.rfind(':') {
            Some(idx) => &line[idx + 1..],
            None => line,
        };
        let fragment = fragment.trim();
        if fragment.is_empty() {
            None
        } else {
            Some(fragment.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Calculator trait
// ---------------------------------------------------------------------------

/// Abstraction over the equity calculator.
///
/// `Err` means the process could not be run at all. A process that ran and
/// exited non-zero is still `Ok` with the exit code in the `RawRun`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Calculator: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<RawRun>;

    /// Name for logging.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
