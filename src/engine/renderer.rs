//! Reply rendering (Reddit-flavoured markdown).

use crate::types::{EquityResult, QueryError};

/// Placed between the replies to separate queries of one message.
pub const REPLY_SEPARATOR: &str = "\n\n***\n\n";

const TABLE_HEADER: &str = "Range|Equity\n:--|--:\n";

/// Render a results table, with the Monte Carlo note when escalation ran.
pub fn render_table(
    results: &[EquityResult],
    monte_carlo_escalated: bool,
    stage1_budget_secs: f64,
) -> String {
    let mut reply = String::from(TABLE_HEADER);
    for r in results {
        reply.push_str(&r.range_label);
        reply.push('|');
        reply.push_str(&format_equity(r.equity));
        reply.push('\n');
    }
    if monte_carlo_escalated {
        reply.push_str(&format!(
            "\n**Note:** Monte Carlo simulation used (exact calculation exceeded {} seconds)",
            stage1_budget_secs
        ));
    }
    reply
}

/// The fixed message for a failed query.
pub fn render_error(error: &QueryError) -> String {
    error.to_string()
}

/// Join per-query replies in extraction order.
pub fn join_replies(replies: &[String]) -> String {
    replies.join(REPLY_SEPARATOR)
}

/// Equity as a fraction, at most 4 decimals, no trailing zeros.
pub fn format_equity(equity: f64) -> String {
    let s = format!("{equity:.4}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() || s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}
