//! Shared types for the equity bot.
//!
//! These types form the data model used across the engine, the calculator
//! adapter, the platform client and the seen store. They are kept free of
//! I/O so every module can depend on them without circular references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Query options
// ---------------------------------------------------------------------------

/// Kind of option a query may carry alongside its ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OptionKind {
    Board,
    Dead,
}

impl OptionKind {
    /// Normalise an option key as typed by a user (`board`, `b`, `dead`, `d`).
    pub fn from_key(key: &str) -> Option<Self> {
        match key.to_lowercase().as_str() {
            "board" | "b" => Some(OptionKind::Board),
            "dead" | "d" => Some(OptionKind::Dead),
            _ => None,
        }
    }

    /// The calculator flag that carries this option.
    pub fn flag(&self) -> &'static str {
        match self {
            OptionKind::Board => "-b",
            OptionKind::Dead => "-d",
        }
    }
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionKind::Board => write!(f, "board"),
            OptionKind::Dead => write!(f, "dead"),
        }
    }
}

// ---------------------------------------------------------------------------
// Parsed query
// ---------------------------------------------------------------------------

/// Minimum number of ranges the calculator compares.
pub const MIN_RANGES: usize = 2;
/// Maximum number of ranges the calculator compares.
pub const MAX_RANGES: usize = 6;

/// Lifecycle of a parsed query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryState {
    Unvalidated,
    Valid,
    /// Terminal. Carries the first structural violation found.
    Rejected(QueryError),
}

/// One equity request after tokenisation and validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuery {
    /// Lower-cased range tokens in the order they were written.
    pub ranges: Vec<String>,
    pub options: BTreeMap<OptionKind, String>,
    /// Set by the evaluator once it falls back to Monte Carlo.
    pub monte_carlo_escalated: bool,
    pub state: QueryState,
}

impl ParsedQuery {
    pub fn new() -> Self {
        Self {
            ranges: Vec::new(),
            options: BTreeMap::new(),
            monte_carlo_escalated: false,
            state: QueryState::Unvalidated,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.state == QueryState::Valid
    }

    /// The rejection reason, if the query was rejected.
    pub fn error(&self) -> Option<&QueryError> {
        match &self.state {
            QueryState::Rejected(e) => Some(e),
            _ => None,
        }
    }

    pub fn board(&self) -> Option<&str> {
        self.options.get(&OptionKind::Board).map(String::as_str)
    }

    pub fn dead(&self) -> Option<&str> {
        self.options.get(&OptionKind::Dead).map(String::as_str)
    }

    /// Move the query into the rejected state. Rejection is permanent:
    /// a query already rejected keeps its first error.
    pub fn reject(&mut self, error: QueryError) {
        if !matches!(self.state, QueryState::Rejected(_)) {
            self.state = QueryState::Rejected(error);
        }
    }
}

impl Default for ParsedQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ParsedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ranges.join(" vs "))?;
        for (kind, cards) in &self.options {
            write!(f, " [{kind}: {cards}]")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Why an evaluation did not produce usable output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Calculator rejected a range; carries its stderr fragment when present.
    InvalidRange { detail: Option<String> },
    RangeConflict,
    /// Invocation failed or produced output we could not read.
    ProcessError { reason: String },
}

/// Result of driving the calculator for one query.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationOutcome {
    Success {
        raw_output: String,
        used_monte_carlo: bool,
    },
    Failure(FailureKind),
}

/// One (range, equity) row as reported by the calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityResult {
    pub range_label: String,
    /// Fraction in [0, 1].
    pub equity: f64,
}

impl EquityResult {
    pub fn new(range_label: impl Into<String>, equity: f64) -> Self {
        Self {
            range_label: range_label.into(),
            equity,
        }
    }
}

impl fmt::Display for EquityResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:.2}%", self.range_label, self.equity * 100.0)
    }
}

// ---------------------------------------------------------------------------
// Query errors
// ---------------------------------------------------------------------------

/// Everything that can stop a single query from producing a table.
///
/// The `Display` text is exactly what gets posted back to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("Error: cannot parse option: viable options are \"board\" (or 'b') and \"dead\" (or 'd')")]
    InvalidOption,

    #[error("Error: need at least 2 ranges to run analysis")]
    RangeUnderflow,

    #[error("Error: can only process up to 6 ranges")]
    RangeOverflow,

    #[error("Error: invalid range{}", .detail.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
    InvalidRange { detail: Option<String> },

    #[error("Error: range conflict: 2 ranges (or board/dead cards) contain the same card")]
    RangeConflict,

    #[error("Error: the equity calculator could not process this request")]
    ProcessError { reason: String },
}

impl QueryError {
    pub fn process(reason: impl Into<String>) -> Self {
        QueryError::ProcessError {
            reason: reason.into(),
        }
    }

    /// Short machine-friendly name used in logs and stats.
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::InvalidOption => "invalid_option",
            QueryError::RangeUnderflow => "range_underflow",
            QueryError::RangeOverflow => "range_overflow",
            QueryError::InvalidRange { .. } => "invalid_range",
            QueryError::RangeConflict => "range_conflict",
            QueryError::ProcessError { .. } => "process_error",
        }
    }
}

impl From<FailureKind> for QueryError {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::InvalidRange { detail } => QueryError::InvalidRange { detail },
            FailureKind::RangeConflict => QueryError::RangeConflict,
            FailureKind::ProcessError { reason } => QueryError::ProcessError { reason },
        }
    }
}

// ---------------------------------------------------------------------------
// Inbox
// ---------------------------------------------------------------------------

/// What kind of thing an inbox item (or seen-store row) refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PostKind {
    Post,
    Comment,
    Message,
}

impl PostKind {
    /// Single-character code stored in the seen table.
    pub fn code(&self) -> &'static str {
        match self {
            PostKind::Post => "P",
            PostKind::Comment => "C",
            PostKind::Message => "M",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "P" => Some(PostKind::Post),
            "C" => Some(PostKind::Comment),
            "M" => Some(PostKind::Message),
            _ => None,
        }
    }

    /// Map a Reddit "thing" kind prefix (`t1`, `t3`, `t4`).
    pub fn from_thing_kind(kind: &str) -> Option<Self> {
        match kind {
            "t1" => Some(PostKind::Comment),
            "t3" => Some(PostKind::Post),
            "t4" => Some(PostKind::Message),
            _ => None,
        }
    }
}

impl fmt::Display for PostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostKind::Post => write!(f, "post"),
            PostKind::Comment => write!(f, "comment"),
            PostKind::Message => write!(f, "message"),
        }
    }
}

/// A mention or private message waiting for an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboxItem {
    /// Short id (`abc123`), the key in the seen store.
    pub id: String,
    /// Full name (`t1_abc123`), what the platform wants for replies.
    pub fullname: String,
    pub author: Option<String>,
    pub body: String,
    pub kind: PostKind,
}

// ---------------------------------------------------------------------------
// Running totals
// ---------------------------------------------------------------------------

/// Counters exposed on the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotStats {
    pub cycle_count: u64,
    pub items_fetched: u64,
    pub replies_posted: u64,
    pub items_skipped: u64,
    pub items_failed: u64,
    pub start_time: DateTime<Utc>,
    pub last_cycle: Option<DateTime<Utc>>,
}

impl BotStats {
    pub fn new() -> Self {
        Self {
            cycle_count: 0,
            items_fetched: 0,
            replies_posted: 0,
            items_skipped: 0,
            items_failed: 0,
            start_time: Utc::now(),
            last_cycle: None,
        }
    }

    /// Fold one cycle's report into the running totals.
    pub fn record_cycle(&mut self, report: &CycleReport) {
        self.cycle_count += 1;
        self.items_fetched += report.fetched as u64;
        self.replies_posted += report.replied as u64;
        self.items_skipped += report.skipped as u64;
        self.items_failed += report.failed as u64;
        self.last_cycle = Some(report.timestamp);
    }

    pub fn uptime(&self) -> chrono::Duration {
        Utc::now() - self.start_time
    }
}

impl Default for BotStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary of a single poll cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub timestamp: DateTime<Utc>,
    pub fetched: usize,
    pub replied: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl CycleReport {
    pub fn empty() -> Self {
        Self {
            timestamp: Utc::now(),
            fetched: 0,
            replied: 0,
            skipped: 0,
            failed: 0,
        }
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fetched={} replied={} skipped={} failed={}",
            self.fetched, self.replied, self.skipped, self.failed,
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Infrastructure errors outside the per-query taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("Platform error ({platform}): {message}")]
    Platform { platform: String, message: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Calculator error: {0}")]
    Calculator(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
