//! Mention and hashtag handling for post/comment text.

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

use crate::models::UserSnippet;
use crate::store::{Store, StoreError};

static MENTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"@[A-Za-z0-9_]+").unwrap());

// Composer rule: a post must carry a hashtag unless it has media attached.
static HASHTAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"#[a-z0-9_]+").unwrap());

/// A run of text, either literal or an `@mention` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    /// Username without the leading `@`.
    Mention(String),
}

/// Split free text into alternating literal/mention segments, in order.
pub fn split_mentions(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last = 0;

    for m in MENTION_RE.find_iter(text) {
        if m.start() > last {
            segments.push(Segment::Text(text[last..m.start()].to_string()));
        }
        segments.push(Segment::Mention(text[m.start() + 1..m.end()].to_string()));
        last = m.end();
    }
    if last < text.len() {
        segments.push(Segment::Text(text[last..].to_string()));
    }

    segments
}

pub fn contains_hashtag(text: &str) -> bool {
    HASHTAG_RE.is_match(text)
}

/// Exact-match username lookup for turning a mention into a profile link.
/// No fuzzy matching; an unknown username is a plain NotFound.
pub fn resolve_mention(store: &Arc<Store>, username: &str) -> Result<UserSnippet, StoreError> {
    let user = store.get_user_by_username(username)?;
    Ok(UserSnippet::from(&user))
}
