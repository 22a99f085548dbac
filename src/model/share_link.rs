use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A share link identified against one provider.
///
/// Everything except the parameter bag is fixed at construction. The bag only
/// grows: resolvers and scripts add entries, nothing removes them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareLinkInfo {
    share_key: String,
    #[serde(rename = "type")]
    parser_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    share_password: Option<String>,
    share_url: String,
    standard_url: String,
    #[serde(default)]
    provider_name: String,
    #[serde(default)]
    other_param: Map<String, Value>,
}

impl ShareLinkInfo {
    /// Starts a link for `parser_type` (stored lower-case) seen at `share_url`.
    #[must_use]
    pub fn new(parser_type: impl Into<String>, share_url: impl Into<String>) -> Self {
        let share_url = share_url.into();
        Self {
            parser_type: parser_type.into().trim().to_lowercase(),
            standard_url: share_url.clone(),
            share_url,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_share_key(mut self, share_key: impl Into<String>) -> Self {
        self.share_key = share_key.into();
        self
    }

    /// Sets the share password; blank values are treated as absent.
    #[must_use]
    pub fn with_password(mut self, password: Option<&str>) -> Self {
        self.share_password = password
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToString::to_string);
        self
    }

    #[must_use]
    pub fn with_standard_url(mut self, standard_url: impl Into<String>) -> Self {
        self.standard_url = standard_url.into();
        self
    }

    #[must_use]
    pub fn with_provider_name(mut self, provider_name: impl Into<String>) -> Self {
        self.provider_name = provider_name.into();
        self
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert_param(key, value);
        self
    }

    #[must_use]
    pub fn share_key(&self) -> &str {
        &self.share_key
    }

    #[must_use]
    pub fn parser_type(&self) -> &str {
        &self.parser_type
    }

    #[must_use]
    pub fn share_password(&self) -> Option<&str> {
        self.share_password.as_deref()
    }

    #[must_use]
    pub fn share_url(&self) -> &str {
        &self.share_url
    }

    #[must_use]
    pub fn standard_url(&self) -> &str {
        &self.standard_url
    }

    #[must_use]
    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    /// Cache identity of this link: `"{type}:{share_key}"`.
    #[must_use]
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.parser_type, self.share_key)
    }

    #[must_use]
    pub fn other_params(&self) -> &Map<String, Value> {
        &self.other_param
    }

    #[must_use]
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.other_param.get(key)
    }

    /// Returns the parameter as a string slice when it holds a JSON string.
    #[must_use]
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.other_param.get(key).and_then(Value::as_str)
    }

    /// Inserts or replaces one parameter. Existing keys are never removed.
    pub fn insert_param(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.other_param.insert(key.into(), value.into());
    }

    /// Merges a batch of parameters, keeping their order of arrival.
    pub fn merge_params(&mut self, params: Map<String, Value>) {
        for (key, value) in params {
            self.other_param.insert(key, value);
        }
    }
}
