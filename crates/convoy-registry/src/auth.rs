//! Registry authentication
//!
//! Tokens are checked in this order:
//! 1. `NPM_TOKEN` environment variable
//! 2. `//<registry host>/:_authToken=` in `~/.npmrc`

use tracing::debug;

/// Load a token for `registry_url` from the environment or `~/.npmrc`
pub(crate) fn load_token(registry_url: &str) -> Option<String> {
    if let Ok(token) = std::env::var("NPM_TOKEN") {
        if !token.is_empty() {
            debug!("Loaded NPM token from NPM_TOKEN environment variable");
            return Some(token);
        }
    }

    let npmrc_path = dirs::home_dir()?.join(".npmrc");
    let content = std::fs::read_to_string(&npmrc_path).ok()?;
    let token = token_from_npmrc(&content, registry_url);
    if token.is_some() {
        debug!(path = %npmrc_path.display(), "Loaded NPM token from ~/.npmrc");
    } else {
        debug!("No NPM token found in environment or ~/.npmrc");
    }
    token
}

/// Find the `_authToken` line for `registry_url` in `.npmrc` content
///
/// `${VAR}` values are read from the environment.
pub fn token_from_npmrc(content: &str, registry_url: &str) -> Option<String> {
    let host = registry_url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');
    let key = format!("//{host}/:_authToken=");

    content
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix(&key))
        .map(str::trim)
        .and_then(|value| match value.strip_prefix("${").and_then(|v| v.strip_suffix('}')) {
            Some(var) => std::env::var(var).ok(),
            None => Some(value.to_string()),
        })
        .filter(|token| !token.is_empty())
}

/// Package name as it appears in registry URLs (`@scope/pkg` -> `@scope%2fpkg`)
pub fn escape_name(name: &str) -> String {
    match name.strip_prefix('@') {
        Some(scoped) => format!("@{}", scoped.replace('/', "%2f")),
        None => name.to_string(),
    }
}
