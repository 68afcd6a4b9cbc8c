/// Truncate a string to at most `max_bytes` bytes without splitting a
/// character.
pub fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let cut = s
        .char_indices()
        .map(|(i, _)| i)
        .take_while(|&i| i <= max_bytes)
        .last()
        .unwrap_or(0);
    &s[..cut]
}

/// Unwrap a markdown code fence around a model response.
///
/// Models fence JSON output despite being told not to, sometimes with a
/// language tag on the opening fence and prose after the closing one. The
/// opening fence line is dropped whole; everything from the closing fence
/// onward is cut.
pub fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    let body = match body.find("```") {
        Some(pos) => &body[..pos],
        None => body,
    };
    body.trim()
}
