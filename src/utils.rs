//! Utility functions and helpers.

/// Returns `true` when the string is empty or only whitespace.
pub fn is_blank(input: &str) -> bool {
    input.trim().is_empty()
}

/// Maps blank optional text to `None`, keeping the original text otherwise.
pub fn non_blank(input: Option<&str>) -> Option<String> {
    input.filter(|s| !is_blank(s)).map(str::to_string)
}

/// Truncates text to a maximum length in characters, adding ellipsis if needed.
pub fn truncate_text(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        text.to_string()
    } else {
        let mut truncated = text.chars().take(max_length).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

/// Joins a base URL and an endpoint path without doubling slashes.
pub fn join_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}
