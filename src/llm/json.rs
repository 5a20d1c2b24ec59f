//! JSON extraction from free-form completion text.
//!
//! Models wrap JSON in code fences or chatter around it; this finds the
//! first complete object and ignores the rest.

/// Remove a surrounding ```` ```json ```` / ```` ``` ```` fence, if any.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let after_fence = &trimmed[start + 3..];
    // Skip an info string such as `json` up to the end of the fence line.
    let body_start = after_fence.find('\n').map_or(after_fence.len(), |i| i + 1);
    let info = after_fence[..body_start].trim();
    let body = if info.is_empty() || info.chars().all(|c| c.is_ascii_alphanumeric()) {
        &after_fence[body_start..]
    } else {
        after_fence
    };
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// Extract the first JSON object in `response` that parses.
pub fn extract_json_object(response: &str) -> Option<String> {
    let text = strip_code_fences(response);
    for (start, _) in text.match_indices('{') {
        let Some(candidate) = balanced_object(&text[start..]) else {
            continue;
        };
        if serde_json::from_str::<serde_json::Value>(candidate).is_ok() {
            return Some(candidate.to_string());
        }
    }
    None
}

/// The prefix of `text` (which starts at `{`) up to its matching `}`.
///
/// Braces inside JSON string literals, including escaped quotes, are ignored.
fn balanced_object(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[..=idx]);
                }
            }
            _ => {}
        }
    }
    None
}
