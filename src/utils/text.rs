//! Text cleanup applied to every stored string column

/// Fold line breaks into spaces, trim, and cap at `max_chars` characters.
///
/// Blank input becomes `None` so it is stored as NULL rather than `''`.
pub fn clean_text(value: Option<&str>, max_chars: usize) -> Option<String> {
    let folded: String = value?
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();

    let trimmed = folded.trim();
    if trimmed.is_empty() {
        return None;
    }

    Some(trimmed.chars().take(max_chars).collect())
}
