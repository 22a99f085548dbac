//! Script header parsing.
//!
//! A script starts with a block such as:
//!
//! ```text
//! // ==UserScript==
//! // @type        demo
//! // @displayName Demo Drive
//! // @match       https://demo\.example/s/(?P<KEY>\w+)
//! // ==/UserScript==
//! ```
//!
//! Keys are case-insensitive; `@key: value` is accepted as well.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use super::SandboxError;
use crate::resolver::{KEY_GROUP, compile_static_regex};

static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"(?s)//\s*==UserScript==(.*?)//\s*==/UserScript==")
});

static ENTRY_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?m)^\s*//\s*@([A-Za-z][\w-]*)\s*:?[ \t]*(.*?)\s*$"));

/// Parsed header entries, keys lower-cased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptMetadata {
    entries: BTreeMap<String, String>,
}

impl ScriptMetadata {
    /// Parses the header block and checks the required keys.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Metadata`] when the block is missing, a required
    /// key is absent, or `@match` has no `KEY` group.
    pub fn parse(source: &str) -> Result<Self, SandboxError> {
        let block = BLOCK_RE
            .captures(source)
            .and_then(|captures| captures.get(1))
            .ok_or_else(|| SandboxError::metadata("no // ==UserScript== ... // ==/UserScript== block"))?;

        let mut entries = BTreeMap::new();
        for captures in ENTRY_RE.captures_iter(block.as_str()) {
            let (Some(key), Some(value)) = (captures.get(1), captures.get(2)) else {
                continue;
            };
            let value = value.as_str().trim();
            if value.is_empty() {
                continue;
            }
            entries
                .entry(key.as_str().to_ascii_lowercase())
                .or_insert_with(|| value.to_string());
        }

        let metadata = Self { entries };
        metadata.require("type")?;
        metadata.require("displayname")?;
        let pattern = metadata
            .match_pattern()
            .ok_or_else(|| SandboxError::metadata("missing required @match"))?;
        if !pattern.contains(KEY_GROUP) {
            return Err(SandboxError::metadata(format!(
                "@match '{pattern}' does not capture a KEY group"
            )));
        }
        Ok(metadata)
    }

    fn require(&self, key: &str) -> Result<&str, SandboxError> {
        self.get(key)
            .ok_or_else(|| SandboxError::metadata(format!("missing required @{key}")))
    }

    /// Value of a header key (case-insensitive).
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    #[must_use]
    pub fn parser_type(&self) -> &str {
        self.get("type").unwrap_or_default()
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        self.get("displayname").unwrap_or_default()
    }

    /// `@match`, falling back to `@matchPattern`.
    #[must_use]
    pub fn match_pattern(&self) -> Option<&str> {
        self.get("match").or_else(|| self.get("matchpattern"))
    }

    #[must_use]
    pub fn standard_url_template(&self) -> Option<&str> {
        self.get("standardurl")
    }

    #[must_use]
    pub fn provider_domain(&self) -> Option<&str> {
        self.get("domain")
    }

    #[must_use]
    pub fn into_entries(self) -> BTreeMap<String, String> {
        self.entries
    }
}
