//! URL helpers for building backend endpoints
//!
//! Endpoint overrides come from user configuration and environment variables,
//! so base URLs show up with and without trailing slashes.

/// Strip trailing slashes from a configured base URL.
///
/// ```
/// use obsidian::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("http://127.0.0.1:1234/v1/"), "http://127.0.0.1:1234/v1");
/// assert_eq!(normalize_base_url("https://api.deepseek.com/v1"), "https://api.deepseek.com/v1");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Join a base URL and an endpoint path with exactly one slash between them.
///
/// ```
/// use obsidian::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("https://api.deepseek.com/v1/", "/chat/completions"),
///     "https://api.deepseek.com/v1/chat/completions"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{normalized_base}/{endpoint}")
}
