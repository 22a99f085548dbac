//! Shared helpers for provider patterns: static regex compilation, `KEY`/`PWD`
//! capture extraction and standard-URL template expansion.

use regex::Regex;

use crate::model::ShareLinkInfo;

use super::ShareMatch;

/// Named capture group holding the share key.
pub const KEY_GROUP: &str = "KEY";
/// Optional named capture group holding the share password.
pub const PWD_GROUP: &str = "PWD";

/// Compiles a regex at static init; panics on invalid pattern.
pub fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// Returns true when `regex` declares the named group `KEY`.
#[must_use]
pub fn has_key_group(regex: &Regex) -> bool {
    regex.capture_names().flatten().any(|name| name == KEY_GROUP)
}

/// Matches `url` against `regex` and extracts the share key and optional password.
///
/// Returns `None` when the pattern does not match or `KEY` captured nothing.
#[must_use]
pub fn capture_share_match(regex: &Regex, url: &str) -> Option<ShareMatch> {
    let captures = regex.captures(url)?;
    let share_key = captures
        .name(KEY_GROUP)
        .map(|m| m.as_str().trim())
        .filter(|key| !key.is_empty())?
        .to_string();
    let password = captures
        .name(PWD_GROUP)
        .map(|m| m.as_str().trim().to_string())
        .filter(|pwd| !pwd.is_empty());
    Some(ShareMatch {
        share_key,
        password,
    })
}

/// Replaces `{shareKey}` and `{pwd}` in a standard-URL template.
#[must_use]
pub fn expand_standard_url(template: &str, share_key: &str, password: Option<&str>) -> String {
    template
        .replace("{shareKey}", share_key)
        .replace("{pwd}", password.unwrap_or_default())
}

/// Builds the canonical [`ShareLinkInfo`] for an identified share link.
///
/// The share key is percent-encoded before it is stored or substituted; without
/// a template the standard URL is the share URL itself.
#[must_use]
pub fn build_share_link(
    parser_type: &str,
    provider_name: &str,
    share_url: &str,
    template: Option<&str>,
    share: &ShareMatch,
) -> ShareLinkInfo {
    let share_key = urlencoding::encode(&share.share_key).into_owned();
    let password = share.password.as_deref();
    let standard_url = template.map_or_else(
        || share_url.to_string(),
        |template| expand_standard_url(template, &share_key, password),
    );
    ShareLinkInfo::new(parser_type, share_url)
        .with_share_key(share_key)
        .with_password(password)
        .with_standard_url(standard_url)
        .with_provider_name(provider_name)
}

/// Builds the canonical link when only the share key is known.
///
/// The share URL is the expanded template, or the encoded key itself when the
/// provider has no template.
#[must_use]
pub fn build_share_link_from_key(
    parser_type: &str,
    provider_name: &str,
    template: Option<&str>,
    share: &ShareMatch,
) -> ShareLinkInfo {
    let share_key = urlencoding::encode(&share.share_key).into_owned();
    let share_url = template.map_or_else(
        || share_key.clone(),
        |template| expand_standard_url(template, &share_key, share.password.as_deref()),
    );
    build_share_link(parser_type, provider_name, &share_url, template, share)
}

/// Normalizes a host string: trim, strip leading "www.", trailing '.', and lowercases.
#[must_use]
pub fn canonical_host(host: &str) -> String {
    let host = host.trim().to_ascii_lowercase();
    host.trim_start_matches("www.").trim_end_matches('.').to_string()
}
