//! Request extraction.
//!
//! A message asks for one equity query per `{...}` span. When it has no
//! braces at all, the whole body (minus self-mentions) is the query.

/// Marker that identifies a platform user mention (`u/equity_bot`, `/u/x`).
pub const MENTION_MARKER: &str = "u/";

/// Whether a whitespace-free token is a user mention.
pub fn is_mention(token: &str) -> bool {
    token.to_lowercase().contains(MENTION_MARKER)
}

/// Remove mention tokens and collapse whitespace to single spaces.
pub fn strip_mentions(body: &str) -> String {
    body.split_whitespace()
        .filter(|t| !is_mention(t))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a message body into query substrings, left to right.
///
/// Always returns at least one substring. An opening brace with no
/// closing brace runs to the end of the message.
pub fn extract(body: &str) -> Vec<String> {
    let mut queries = Vec::new();
    let mut cursor = 0;

    while let Some(offset) = body[cursor..].find('{') {
        let open = cursor + offset;
        let start = open + 1;
        match body[start..].find('}') {
            Some(len) => {
                queries.push(body[start..start + len].to_string());
                cursor = start + len + 1;
            }
            None => {
                queries.push(body[start..].to_string());
                cursor = body.len();
            }
        }
    }

    if queries.is_empty() {
        queries.push(strip_mentions(body));
    }
    queries
}
