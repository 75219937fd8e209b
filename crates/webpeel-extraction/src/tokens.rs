//! Token estimation and budget truncation.

/// Conservative character-based token estimate: `ceil(len / 4)`.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Truncate `content` so its estimate fits `max_tokens`, appending a
/// single notice line. Returns the input unchanged when already within
/// budget.
///
/// The cut lands on a character boundary and keeps the first heading
/// intact when one leads the document.
pub fn truncate_to_tokens(content: &str, max_tokens: usize) -> String {
    if estimate_tokens(content) <= max_tokens {
        return content.to_string();
    }

    let budget_chars = max_tokens.saturating_mul(4);
    let mut cut = budget_chars.min(content.len());
    while cut > 0 && !content.is_char_boundary(cut) {
        cut -= 1;
    }

    // Never slice through the leading heading line.
    if let Some(first_line_end) = content.find('\n') {
        if content.starts_with('#') && cut < first_line_end {
            cut = 0;
        }
    }

    let mut out = content[..cut].trim_end().to_string();
    if !out.is_empty() {
        out.push('\n');
    }
    out.push_str(&format!("[Content truncated to ~{} tokens]", max_tokens));
    out
}
