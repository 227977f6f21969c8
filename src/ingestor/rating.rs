//! Minimum-age rating resolution
//!
//! Feeds disagree on where the age rating lives. The stages below are tried
//! in order and the first hit wins:
//!
//! 1. an explicit `<parental>` field (`16+` or `16`)
//! 2. a bracketed `(16+)` / `[16+]` marker inside the title, which is then
//!    removed from the title
//! 3. a `<rating>` element, either plain text or with a `<value>` child
//!
//! The title is only ever changed when stage 2 produced the rating.

use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

use super::xmltv_parser::{FeedNode, FieldValue};

fn title_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"[(\[]{1,2}(\d{1,2})\+[)\]]{1,2}").expect("title rating pattern is valid")
    })
}

fn age_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d{1,2})\+").expect("age pattern is valid"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRating {
    pub min_age: Option<i32>,
    /// The programme title, with the rating marker removed when stage 2 matched.
    pub title: Option<String>,
}

pub fn resolve_rating(node: &FeedNode) -> ResolvedRating {
    let title = node.text("title").map(str::to_string);

    if let Some(age) = from_parental_field(node) {
        return ResolvedRating {
            min_age: Some(age),
            title,
        };
    }

    if let Some((age, stripped)) = title.as_deref().and_then(extract_from_title) {
        return ResolvedRating {
            min_age: Some(age),
            title: Some(stripped),
        };
    }

    ResolvedRating {
        min_age: from_rating_node(node),
        title,
    }
}

/// Stage 1: explicit parental field with any `+` stripped.
pub fn from_parental_field(node: &FeedNode) -> Option<i32> {
    let raw = node.text("parental")?;
    let digits = raw.replace('+', "");
    let digits = digits.trim();
    if digits.is_empty() {
        return None;
    }

    match digits.parse::<u8>() {
        Ok(age) => Some(i32::from(age)),
        Err(_) => {
            debug!("Ignoring non-numeric parental rating '{}'", raw);
            None
        }
    }
}

/// Stage 2: first `(N+)`-style marker in the title.
///
/// Returns the age and the title with that marker removed.
pub fn extract_from_title(title: &str) -> Option<(i32, String)> {
    let caps = title_pattern().captures(title)?;
    let marker = caps.get(0)?;
    let age: i32 = caps.get(1)?.as_str().parse().ok()?;

    let mut stripped = String::with_capacity(title.len());
    stripped.push_str(&title[..marker.start()]);
    stripped.push_str(&title[marker.end()..]);

    Some((age, stripped.trim().to_string()))
}

/// Stage 3: `N+` inside a rating element or its value child.
pub fn from_rating_node(node: &FeedNode) -> Option<i32> {
    let text = match node.field("rating")? {
        FieldValue::Scalar(text) => text.as_str(),
        FieldValue::Structured(children) => children.get("value")?.as_scalar()?,
        FieldValue::Repeated(_) => return None,
    };

    age_pattern()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
