//! Calculator output parsing.
//!
//! Expected stdout:
//!
//! ```text
//! 0
//! ***
//! AA: 85.00%
//! KK: 15.00%
//!
//! ```
//!
//! The first line is the status code. The `***` separator is optional;
//! without it the results block starts right after the status line. The
//! block ends at the first blank line.

use crate::calculator::RunStatus;
use crate::types::{EquityResult, QueryError};

/// Line that separates the status line (and any preamble) from results.
pub const RESULTS_SEPARATOR: &str = "***";

/// Read the status code from the first line of output.
pub fn parse_status(output: &str) -> Result<RunStatus, QueryError> {
    let first = output
        .lines()
        .next()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .ok_or_else(|| QueryError::process("calculator produced no output"))?;

    let code: i64 = first
        .parse()
        .map_err(|_| QueryError::process(format!("unreadable status line: {first:?}")))?;

    RunStatus::from_code(code)
        .ok_or_else(|| QueryError::process(format!("unknown status code {code}")))
}

/// Parse the results block into (range, equity) rows in output order.
pub fn parse_results(output: &str) -> Result<Vec<EquityResult>, QueryError> {
    parse_status(output)?;

    let lines: Vec<&str> = output.lines().skip(1).collect();
    let block_start = lines
        .iter()
        .position(|l| l.trim() == RESULTS_SEPARATOR)
        .map(|idx| idx + 1)
        .unwrap_or(0);

    let results = lines[block_start..]
        .iter()
        .map(|l| l.trim())
        .take_while(|l| !l.is_empty())
        .map(parse_line)
        .collect::<Result<Vec<_>, _>>()?;

    if results.is_empty() {
        return Err(QueryError::process("calculator output has no results block"));
    }
    Ok(results)
}

fn parse_line(line: &str) -> Result<EquityResult, QueryError> {
    let (label, value) = line
        .split_once(':')
        .ok_or_else(|| QueryError::process(format!("result line without separator: {line:?}")))?;

    let label = label.trim().to_lowercase();
    if label.is_empty() {
        return Err(QueryError::process(format!("result line without label: {line:?}")));
    }

    let value = value.trim();
    let value = value.strip_suffix('%').unwrap_or(value).trim();
    let pct: f64 = value
        .parse()
        .map_err(|_| QueryError::process(format!("non-numeric equity {value:?} for {label}")))?;

    let equity = pct / 100.0;
    if !(0.0..=1.0).contains(&equity) {
        return Err(QueryError::process(format!("equity out of range for {label}: {pct}%")));
    }

    Ok(EquityResult::new(label, equity))
}
