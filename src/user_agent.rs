//! Shared User-Agent strings for resolver traffic and generated client links.
//!
//! Share hosts gate downloads on a browser-looking agent, so the resolver client
//! and the download-metadata default use the same desktop browser string.

/// Desktop browser User-Agent used when neither the resolver nor the config supplies one.
pub const DEFAULT_BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Returns the User-Agent for resolver HTTP traffic, honoring a configured override.
///
/// Blank overrides fall back to [`DEFAULT_BROWSER_USER_AGENT`].
#[must_use]
pub fn resolver_user_agent(configured: Option<&str>) -> String {
    configured
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_BROWSER_USER_AGENT)
        .to_string()
}
