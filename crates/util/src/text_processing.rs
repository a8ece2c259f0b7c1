//! # Text Processing Utilities
//!
//! Helpers for preparing remote response text and request metadata before it
//! reaches a log line: secret redaction and whitespace-collapsing previews.

use once_cell::sync::Lazy;
use regex::Regex;

/// Redacts values that look like secrets in a string.
///
/// Key names are preserved so the surrounding context stays readable; only
/// the value is replaced with `[REDACTED]`.
///
/// # Example
/// ```rust
/// use prefect_mcp_util::redact_sensitive;
///
/// let redacted = redact_sensitive("PREFECT_API_KEY=pnu_abc123");
/// assert_eq!(redacted, "PREFECT_API_KEY=[REDACTED]");
///
/// let redacted = redact_sensitive("Authorization: Bearer secret123");
/// assert_eq!(redacted, "Authorization: [REDACTED]");
/// ```
pub fn redact_sensitive(input: &str) -> String {
    redact_sensitive_with(input, "[REDACTED]")
}

/// Redacts sensitive-looking values, using a custom replacement token.
pub fn redact_sensitive_with(input: &str, replacement: &str) -> String {
    let mut redacted = input.to_string();

    for pattern in get_redact_patterns().iter() {
        redacted = pattern
            .replace_all(&redacted, |captures: &regex::Captures| {
                let prefix = captures.get(1).map(|m| m.as_str()).unwrap_or("");
                let suffix = captures.get(3).map(|m| m.as_str()).unwrap_or("");
                format!("{}{}{}", prefix, replacement, suffix)
            })
            .to_string();
    }

    redacted
}

/// Collapse whitespace and cap `text` at roughly `limit` bytes for log output.
///
/// Empty or whitespace-only input renders as `<empty>`.
pub fn truncate_preview(text: &str, limit: usize) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let mut preview = String::new();
    for ch in trimmed.chars() {
        if preview.len() >= limit {
            preview.push_str("...");
            break;
        }
        match ch {
            '\n' | '\r' | '\t' => {
                if !preview.ends_with(' ') {
                    preview.push(' ');
                }
            }
            _ => preview.push(ch),
        }
    }
    preview
}

/// Returns compiled regex patterns for detecting sensitive information.
///
/// Every pattern captures `(prefix)(value)(suffix)`; only the value is replaced.
pub fn get_redact_patterns() -> &'static Vec<Regex> {
    static REDACT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(build_redact_patterns);

    &REDACT_PATTERNS
}

fn build_redact_patterns() -> Vec<Regex> {
    let sources = [
        // Prefect Cloud API keys
        r"()(pnu_[A-Za-z0-9]{16,})()",
        r"(?i)(authorization:\s+)([^\s,}]+(?:\s+[^\s,}]+)?)()",
        r"(?i)((?:^|\b)Bearer\s+)([A-Za-z0-9\-._~+/]+=*)()",
        r"(?i)([A-Z0-9_]*(?:API_KEY|TOKEN|SECRET|PASSWORD)=)([^\s]+)()",
        r#"(?i)("(?:api_?key|token|secret|password|client_?secret)"\s*:\s*")([^"]*)(")"#,
    ];
    sources.iter().filter_map(|source| Regex::new(source).ok()).collect()
}
