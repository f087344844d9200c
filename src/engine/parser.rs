//! Query parsing.
//!
//! Each whitespace-separated token is classified on its own; anything with
//! a `:` is an option, anything else is a range. The first bad option
//! rejects the whole query and nothing after it is looked at.

use crate::engine::extractor::is_mention;
use crate::types::{OptionKind, ParsedQuery, QueryError, QueryState, MAX_RANGES, MIN_RANGES};

/// Separator between an option key and its value.
pub const OPTION_SEPARATOR: char = ':';

/// Classification of a single token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Range(String),
    Option(OptionKind, String),
    Mention,
    Invalid,
}

/// Classify one whitespace-free token.
///
/// Ranges come back lower-cased. Option values keep the user's casing.
pub fn classify(token: &str) -> Token {
    if is_mention(token) {
        return Token::Mention;
    }
    if !token.contains(OPTION_SEPARATOR) {
        return Token::Range(token.to_lowercase());
    }

    let mut parts = token.split(OPTION_SEPARATOR);
    let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
        return Token::Invalid;
    };
    match OptionKind::from_key(key) {
        Some(kind) if !value.is_empty() => Token::Option(kind, value.to_string()),
        _ => Token::Invalid,
    }
}

/// Parse a query substring into a validated or rejected query.
pub fn parse(substring: &str) -> ParsedQuery {
    let mut query = ParsedQuery::new();

    for word in substring.split_whitespace() {
        match classify(word) {
            Token::Mention => continue,
            Token::Range(range) => query.ranges.push(range),
            Token::Option(kind, cards) => {
                if query.options.contains_key(&kind) {
                    query.reject(QueryError::InvalidOption);
                    return query;
                }
                query.options.insert(kind, cards);
            }
            Token::Invalid => {
                query.reject(QueryError::InvalidOption);
                return query;
            }
        }
    }

    if query.ranges.len() < MIN_RANGES {
        query.reject(QueryError::RangeUnderflow);
    } else if query.ranges.len() > MAX_RANGES {
        query.reject(QueryError::RangeOverflow);
    } else {
        query.state = QueryState::Valid;
    }
    query
}
